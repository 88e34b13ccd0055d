//! # Combinatorics
//!
//! Lazy enumeration of fixed-size subsets.
//!
//! The enumeration advances a lexicographic index vector ("next
//! combination") instead of recursing, so it:
//!
//! 1. Produces one combination at a time (the full space is never built)
//! 2. Is restartable via [`IndexCombinations::reset`]
//! 3. Can resume from any index tuple via [`IndexCombinations::resume_from`]
//!
//! ```text
//! n = 4, k = 2:  [0,1] [0,2] [0,3] [1,2] [1,3] [2,3]
//! ```

/// Number of `k`-subsets of `n` items, without enumerating them.
///
/// Uses the iterative product form over `min(k, n - k)` terms so no factorial
/// is ever formed. Saturates at `u64::MAX`.
#[must_use]
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        // Exact at every step: result * (n - i) is divisible by (i + 1)
        result = result * (n - i) as u128 / (i + 1) as u128;
        if result > u128::from(u64::MAX) {
            return u64::MAX;
        }
    }
    u64::try_from(result).unwrap_or(u64::MAX)
}

/// Enumeration progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cursor {
    /// Nothing emitted yet.
    Fresh,
    /// `indices` holds the last emitted combination.
    Running,
    /// Exhausted.
    Done,
}

/// Lazy iterator over index tuples `i0 < i1 < ... < ik-1` drawn from `0..n`.
#[derive(Clone, Debug)]
pub struct IndexCombinations {
    n: usize,
    k: usize,
    indices: Vec<usize>,
    cursor: Cursor,
}

impl IndexCombinations {
    /// Creates an iterator over all `k`-subsets of `0..n`.
    #[must_use]
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            k,
            indices: (0..k).collect(),
            cursor: if k > n { Cursor::Done } else { Cursor::Fresh },
        }
    }

    /// Resumes enumeration so the next item is `start` itself.
    ///
    /// Returns `None` if `start` is not a strictly increasing tuple of
    /// length `k` within `0..n`.
    #[must_use]
    pub fn resume_from(n: usize, start: &[usize]) -> Option<Self> {
        let k = start.len();
        let increasing = start.windows(2).all(|w| w[0] < w[1]);
        let in_range = start.last().map_or(true, |&last| last < n);
        if !increasing || !in_range {
            return None;
        }
        Some(Self {
            n,
            k,
            indices: start.to_vec(),
            cursor: Cursor::Fresh,
        })
    }

    /// Restarts from the first combination.
    pub fn reset(&mut self) {
        self.indices = (0..self.k).collect();
        self.cursor = if self.k > self.n {
            Cursor::Done
        } else {
            Cursor::Fresh
        };
    }

    /// Total number of combinations in the full enumeration.
    #[must_use]
    pub fn total(&self) -> u64 {
        binomial(self.n, self.k)
    }

    /// Advances `indices` to the next tuple in lexicographic order.
    fn advance(&mut self) -> bool {
        let (n, k) = (self.n, self.k);
        // Rightmost position that can still move right
        let Some(i) = (0..k).rev().find(|&i| self.indices[i] < n - k + i) else {
            return false;
        };
        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        true
    }
}

impl Iterator for IndexCombinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor {
            Cursor::Done => None,
            Cursor::Fresh => {
                self.cursor = Cursor::Running;
                Some(self.indices.clone())
            }
            Cursor::Running => {
                if self.advance() {
                    Some(self.indices.clone())
                } else {
                    self.cursor = Cursor::Done;
                    None
                }
            }
        }
    }
}

/// Lazy iterator over `k`-subsets of a slice, in index order.
#[derive(Clone, Debug)]
pub struct Combinations<'a, T> {
    items: &'a [T],
    indices: IndexCombinations,
}

impl<'a, T> Combinations<'a, T> {
    /// Restarts from the first combination.
    pub fn reset(&mut self) {
        self.indices.reset();
    }

    /// Total number of combinations in the full enumeration.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.indices.total()
    }
}

impl<'a, T> Iterator for Combinations<'a, T> {
    type Item = Vec<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        let items = self.items;
        self.indices
            .next()
            .map(|idx| idx.into_iter().map(|i| &items[i]).collect())
    }
}

/// Every `k`-sized subset of `items`, lazily, without duplicate subsets.
///
/// `k == 0` yields exactly one empty combination; `k > items.len()` yields
/// nothing.
#[must_use]
pub fn combinations<T>(items: &[T], k: usize) -> Combinations<'_, T> {
    Combinations {
        items,
        indices: IndexCombinations::new(items.len(), k),
    }
}

/// [`combinations`] restricted to subsets accepted by `predicate`.
pub fn filtered_combinations<'a, T, P>(
    items: &'a [T],
    k: usize,
    predicate: P,
) -> impl Iterator<Item = Vec<&'a T>> + 'a
where
    P: Fn(&[&'a T]) -> bool + 'a,
{
    combinations(items, k).filter(move |combo| predicate(combo))
}

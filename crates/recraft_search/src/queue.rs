//! # Bounded Priority Queue
//!
//! Keeps only the best `max_size` elements seen, always sorted.
//!
//! ```text
//!   index:  0      1      2     ...  max_size-1
//!          best ─────────────────────> worst
//! ```
//!
//! Insertion is a binary search plus an array shift. Equal elements keep
//! insertion order, so ties are broken by arrival. Once full, an element is
//! accepted only if it is strictly better than the current worst, which is
//! then dropped. Memory is bounded by `max_size` regardless of how many
//! candidates are offered.

use std::cmp::Ordering;
use std::fmt;

use crate::flow::ScoredTransition;

/// Comparator: `Less` means the first argument is better.
pub type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Something with a numeric score (higher is better).
pub trait Scored {
    /// The score.
    fn score(&self) -> f64;
}

impl Scored for ScoredTransition {
    fn score(&self) -> f64 {
        self.score
    }
}

/// A capacity-bounded, always-sorted collection.
pub struct BoundedPriorityQueue<T> {
    items: Vec<T>,
    max_size: usize,
    compare: Comparator<T>,
}

impl<T> BoundedPriorityQueue<T> {
    /// Creates a queue ordered by `compare` (`Less` = better).
    #[must_use]
    pub fn new(
        max_size: usize,
        compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        Self {
            items: Vec::with_capacity(max_size.min(1024)),
            max_size,
            compare: Box::new(compare),
        }
    }

    /// Offers an element. Returns whether it was kept.
    pub fn add(&mut self, item: T) -> bool {
        if self.max_size == 0 {
            return false;
        }
        if self.is_full() {
            let Some(worst) = self.items.last() else {
                return false;
            };
            if (self.compare)(&item, worst) != Ordering::Less {
                return false;
            }
            self.items.pop();
        }
        let compare = &self.compare;
        let pos = self
            .items
            .partition_point(|existing| compare(existing, &item) != Ordering::Greater);
        self.items.insert(pos, item);
        true
    }

    /// Number of elements held.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the queue is at capacity.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_size
    }

    /// Capacity.
    #[inline]
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Best element.
    #[must_use]
    pub fn best(&self) -> Option<&T> {
        self.items.first()
    }

    /// Worst element held.
    #[must_use]
    pub fn worst(&self) -> Option<&T> {
        self.items.last()
    }

    /// Elements, best first.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterates best first.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Consumes the queue, best first.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    /// Drops every element.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Scored> BoundedPriorityQueue<T> {
    /// Queue ordered by descending score.
    #[must_use]
    pub fn by_score(max_size: usize) -> Self {
        Self::new(max_size, |a: &T, b: &T| b.score().total_cmp(&a.score()))
    }

    /// Score an element must beat to be kept: the worst score once full,
    /// negative infinity before.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        match self.items.last() {
            Some(worst) if self.is_full() => worst.score(),
            _ => f64::NEG_INFINITY,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for BoundedPriorityQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedPriorityQueue")
            .field("max_size", &self.max_size)
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl<'a, T> IntoIterator for &'a BoundedPriorityQueue<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Entry(f64, u32);

    impl Scored for Entry {
        fn score(&self) -> f64 {
            self.0
        }
    }

    fn is_sorted(queue: &BoundedPriorityQueue<Entry>) -> bool {
        queue.as_slice().windows(2).all(|w| w[0].0 >= w[1].0)
    }

    #[test]
    fn test_keeps_top_k_sorted() {
        let mut queue = BoundedPriorityQueue::by_score(3);
        for (i, score) in [5.0, 1.0, 9.0, 3.0, 7.0, 2.0].into_iter().enumerate() {
            queue.add(Entry(score, i as u32));
            assert!(queue.len() <= 3);
            assert!(is_sorted(&queue));
        }
        let scores: Vec<f64> = queue.iter().map(|e| e.0).collect();
        assert_eq!(scores, vec![9.0, 7.0, 5.0]);
    }

    #[test]
    fn test_rejects_worse_when_full() {
        let mut queue = BoundedPriorityQueue::by_score(2);
        assert!(queue.add(Entry(4.0, 0)));
        assert!(queue.add(Entry(6.0, 1)));
        assert!((queue.threshold() - 4.0).abs() < f64::EPSILON);

        let before: Vec<Entry> = queue.as_slice().to_vec();
        assert!(!queue.add(Entry(3.0, 2)));
        // Ties with the worst are not strictly better
        assert!(!queue.add(Entry(4.0, 3)));
        assert_eq!(queue.as_slice(), &before[..]);

        assert!(queue.add(Entry(5.0, 4)));
        assert_eq!(queue.as_slice(), &[Entry(6.0, 1), Entry(5.0, 4)]);
    }

    #[test]
    fn test_threshold_before_full() {
        let mut queue = BoundedPriorityQueue::by_score(3);
        assert_eq!(queue.threshold(), f64::NEG_INFINITY);
        queue.add(Entry(1.0, 0));
        assert_eq!(queue.threshold(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let mut queue = BoundedPriorityQueue::by_score(4);
        queue.add(Entry(2.0, 0));
        queue.add(Entry(2.0, 1));
        queue.add(Entry(3.0, 2));
        queue.add(Entry(2.0, 3));
        let order: Vec<u32> = queue.iter().map(|e| e.1).collect();
        assert_eq!(order, vec![2, 0, 1, 3]);
    }

    #[test]
    fn test_custom_comparator_and_zero_capacity() {
        let mut ascending = BoundedPriorityQueue::new(2, |a: &i32, b: &i32| a.cmp(b));
        for v in [5, 3, 8, 1] {
            ascending.add(v);
        }
        assert_eq!(ascending.into_vec(), vec![1, 3]);

        let mut none = BoundedPriorityQueue::new(0, |a: &i32, b: &i32| a.cmp(b));
        assert!(!none.add(1));
        assert!(none.is_empty());
    }
}

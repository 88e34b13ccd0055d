//! # Search Driver
//!
//! Enumerates early/final loadout pairs, filters them through the policy
//! layer and keeps the best in a bounded queue.
//!
//! ## Algorithm
//!
//! ```text
//! for each E-combination of early candidates (item filter applied):
//!     from     = cache[combination]
//!     relevant = final candidates sharing a part with `from`  (memoized by part set)
//!     if |relevant| < F: skip
//!     for each F-combination of relevant:
//!         to = cache[combination]
//!         prune if approximate reuse ratio is too low   (only when max(E, F) >= 3)
//!         transition = (from, to, component flow)
//!         if constraint passes and score is finite: queue.add(score(transition))
//! ```
//!
//! Data gaps never abort the search. The only errors are an invalid request
//! (rejected before any work starts), cancellation and worker failures.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use recraft_catalog::{
    AnalysisConfig, Item, ItemRepository, SlotLimits, StatValueModel, NAME_SEPARATOR,
};
use serde::{Deserialize, Serialize};

use crate::cache::{LoadoutCache, DEFAULT_CACHE_CAPACITY};
use crate::candidates::{early_candidates, final_candidates, passes_item_filter, resolve};
use crate::combinatorics::{binomial, IndexCombinations};
use crate::error::{SearchError, SearchResult};
use crate::flow::{LoadoutTransition, ScoredTransition};
use crate::loadout::Loadout;
use crate::parallel;
use crate::policy::{default_constraint, default_scorer, Constraint, Scorer};
use crate::queue::BoundedPriorityQueue;

/// Default number of transitions returned.
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Default minimum approximate reuse ratio for the cheap pre-filter.
pub const DEFAULT_PRUNE_REUSE_RATIO: f64 = 0.25;

/// The pre-filter is engaged only when `max(E, F)` reaches this.
pub const PRUNE_MIN_ITEMS: usize = 3;

/// Below this many early combinations the search stays single-threaded.
pub const DEFAULT_PARALLEL_THRESHOLD: u64 = 100;

/// Early combinations between progress reports.
const PROGRESS_INTERVAL: u64 = 256;

// =============================================================================
// Request
// =============================================================================

/// Parameters of one transition search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Items in the early loadout (E).
    pub early_count: usize,
    /// Items in the final loadout (F).
    pub final_count: usize,
    /// Transitions returned.
    pub result_limit: usize,
    /// Slot limits of both loadouts.
    pub slots: SlotLimits,
    /// Stat valuation for stat value / efficiency.
    pub value_model: Option<StatValueModel>,
    /// Most expensive final candidate.
    pub max_final_cost: Option<u32>,
    /// Loadouts cached per worker.
    pub cache_capacity: usize,
    /// Minimum approximate reuse ratio, `None` disables pruning.
    pub prune_reuse_ratio: Option<f64>,
    /// Items the final loadout must contain.
    pub required_items: Vec<String>,
    /// Worker threads; 1 forces single-threaded mode.
    pub workers: usize,
    /// Early combinations needed before workers are spawned.
    pub parallel_threshold: u64,
}

impl SearchRequest {
    /// Creates a request for `early_count -> final_count` transitions with
    /// default settings.
    #[must_use]
    pub fn new(early_count: usize, final_count: usize) -> Self {
        Self {
            early_count,
            final_count,
            result_limit: DEFAULT_RESULT_LIMIT,
            slots: SlotLimits::default(),
            value_model: None,
            max_final_cost: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            prune_reuse_ratio: Some(DEFAULT_PRUNE_REUSE_RATIO),
            required_items: Vec::new(),
            workers: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Sets the number of transitions returned.
    #[must_use]
    pub const fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    /// Sets slot limits.
    #[must_use]
    pub const fn with_slots(mut self, slots: SlotLimits) -> Self {
        self.slots = slots;
        self
    }

    /// Sets the stat value model.
    #[must_use]
    pub fn with_value_model(mut self, model: StatValueModel) -> Self {
        self.value_model = Some(model);
        self
    }

    /// Caps the cost of final candidates.
    #[must_use]
    pub const fn with_max_final_cost(mut self, max_cost: u32) -> Self {
        self.max_final_cost = Some(max_cost);
        self
    }

    /// Sets the per-worker loadout cache capacity.
    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Overrides the pruning threshold; `None` disables pruning.
    #[must_use]
    pub const fn with_prune_reuse_ratio(mut self, ratio: Option<f64>) -> Self {
        self.prune_reuse_ratio = ratio;
        self
    }

    /// Requires an item in the final loadout.
    #[must_use]
    pub fn with_required_item(mut self, name: impl Into<String>) -> Self {
        self.required_items.push(name.into());
        self
    }

    /// Requires every configured key item not already required.
    #[must_use]
    pub fn requiring_key_items(mut self, config: &AnalysisConfig) -> Self {
        for name in &config.key_items {
            if !self.required_items.contains(name) {
                self.required_items.push(name.clone());
            }
        }
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the minimum early combination count for parallel mode.
    #[must_use]
    pub const fn with_parallel_threshold(mut self, threshold: u64) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Checks the request for inconsistencies.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for zero counts, limits or workers, bad slot
    /// limits, a prune ratio outside `[0, 1]`, or more required items than
    /// the final loadout can hold.
    pub fn validate(&self) -> SearchResult<()> {
        let invalid = |reason: String| Err(SearchError::InvalidRequest(reason));

        if self.early_count == 0 || self.final_count == 0 {
            return invalid(format!(
                "loadout sizes must be positive (early {}, final {})",
                self.early_count, self.final_count
            ));
        }
        if self.result_limit == 0 {
            return invalid("result limit must be positive".to_string());
        }
        if self.cache_capacity == 0 {
            return invalid("cache capacity must be positive".to_string());
        }
        if self.workers == 0 {
            return invalid("at least one worker is required".to_string());
        }
        self.slots
            .validate()
            .map_err(|e| SearchError::InvalidRequest(e.to_string()))?;
        if let Some(ratio) = self.prune_reuse_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return invalid(format!("prune ratio must be within [0, 1], got {ratio}"));
            }
        }
        let required = self.required_items.len();
        if required > self.slots.total() {
            return invalid(format!(
                "{required} required items exceed {} available slots",
                self.slots.total()
            ));
        }
        if required > self.final_count {
            return invalid(format!(
                "{required} required items exceed final loadout size {}",
                self.final_count
            ));
        }
        Ok(())
    }

    /// Pruning threshold in effect, if any.
    #[must_use]
    pub fn effective_prune_ratio(&self) -> Option<f64> {
        self.prune_reuse_ratio
            .filter(|_| self.early_count.max(self.final_count) >= PRUNE_MIN_ITEMS)
    }
}

// =============================================================================
// Cancellation and progress
// =============================================================================

/// Cooperative cancellation flag, polled between early combinations.
///
/// Clones share the flag. A [`child`](Self::child) is cancelled with its
/// parent but can also be cancelled on its own.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    flags: Vec<Arc<AtomicBool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Creates an untripped token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flags: vec![Arc::new(AtomicBool::new(false))],
        }
    }

    /// Token cancelled by either `self` or its own [`cancel`](Self::cancel).
    #[must_use]
    pub fn child(&self) -> Self {
        let mut flags = self.flags.clone();
        flags.push(Arc::new(AtomicBool::new(false)));
        Self { flags }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        if let Some(own) = self.flags.last() {
            own.store(true, Ordering::Release);
        }
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|flag| flag.load(Ordering::Acquire))
    }
}

/// Progress of one worker (worker 0 in single-threaded mode).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchProgress {
    /// Reporting worker.
    pub worker_id: usize,
    /// Early combinations processed.
    pub processed: u64,
    /// Early combinations assigned.
    pub total: u64,
    /// Valid transitions found so far.
    pub valid: u64,
}

/// Progress observer.
pub type ProgressCallback = Arc<dyn Fn(&SearchProgress) + Send + Sync>;

// =============================================================================
// Results
// =============================================================================

/// Aggregate search statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Transitions whose constraint was evaluated.
    pub total_evaluated: u64,
    /// Transitions that passed the constraint.
    pub valid_count: u64,
    /// Sum of valid scores.
    pub score_sum: f64,
    /// Mean valid score, 0 when none.
    pub average_score: f64,
    /// Best valid score.
    pub best_score: Option<f64>,
    /// Final combinations dropped by the reuse pre-filter.
    pub pruned_count: u64,
    /// Accepted transitions dropped because the scorer returned NaN or an
    /// infinity.
    pub non_finite_scores: u64,
    /// Early combinations with too few relevant targets.
    pub skipped_early: u64,
    /// Early combinations processed.
    pub early_combinations: u64,
    /// Loadout cache hits.
    pub cache_hits: u64,
    /// Loadout cache misses.
    pub cache_misses: u64,
    /// Wall time.
    pub elapsed_ms: u64,
    /// Workers used.
    pub workers: usize,
}

impl SearchStats {
    /// Records a valid transition's score.
    pub fn record(&mut self, score: f64) {
        self.valid_count += 1;
        self.score_sum += score;
        self.best_score = Some(self.best_score.map_or(score, |best| best.max(score)));
    }

    /// Folds another worker's statistics into these.
    pub fn merge(&mut self, other: &Self) {
        self.total_evaluated += other.total_evaluated;
        self.valid_count += other.valid_count;
        self.score_sum += other.score_sum;
        self.best_score = match (self.best_score, other.best_score) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.pruned_count += other.pruned_count;
        self.non_finite_scores += other.non_finite_scores;
        self.skipped_early += other.skipped_early;
        self.early_combinations += other.early_combinations;
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        self.workers += other.workers;
    }

    /// Recomputes the average from the sum and count.
    #[allow(clippy::cast_precision_loss)]
    pub fn finish(&mut self) {
        self.average_score = if self.valid_count == 0 {
            0.0
        } else {
            self.score_sum / self.valid_count as f64
        };
    }
}

/// Search output: best transitions first, plus statistics.
#[derive(Clone, Debug)]
pub struct BuildAnalysisResult {
    /// Best-first transitions, at most `result_limit`.
    pub transitions: Vec<ScoredTransition>,
    /// Aggregate statistics.
    pub stats: SearchStats,
}

// =============================================================================
// Core loop
// =============================================================================

/// Output of one run of the core loop.
pub(crate) struct ChunkOutcome {
    pub(crate) transitions: Vec<ScoredTransition>,
    pub(crate) stats: SearchStats,
}

/// Everything the core loop reads. Owns no mutable state; each run gets its
/// own cache and queue.
pub(crate) struct SearchCore<'a> {
    repo: &'a ItemRepository,
    config: &'a AnalysisConfig,
    request: &'a SearchRequest,
    early: Vec<Arc<Item>>,
    finals: Vec<Arc<Item>>,
    /// Base part -> positions in `finals` (ascending).
    part_users: HashMap<String, Vec<usize>>,
    constraint: &'a dyn Constraint,
    scorer: &'a dyn Scorer,
    cancel: &'a CancellationToken,
}

impl<'a> SearchCore<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        repo: &'a ItemRepository,
        config: &'a AnalysisConfig,
        request: &'a SearchRequest,
        early_indices: &[usize],
        final_indices: &[usize],
        constraint: &'a dyn Constraint,
        scorer: &'a dyn Scorer,
        cancel: &'a CancellationToken,
    ) -> Self {
        let early = resolve(repo, early_indices);
        let finals = resolve(repo, final_indices);

        let mut part_users: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, item) in finals.iter().enumerate() {
            let parts: BTreeSet<String> = repo.flatten(&item.name).iter().cloned().collect();
            for part in parts {
                part_users.entry(part).or_default().push(pos);
            }
        }

        Self {
            repo,
            config,
            request,
            early,
            finals,
            part_users,
            constraint,
            scorer,
            cancel,
        }
    }

    /// Early index tuples (positions into the early pool) passing the
    /// item-level filter, lexicographic order.
    pub(crate) fn early_tuples(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        IndexCombinations::new(self.early.len(), self.request.early_count)
            .filter(move |tuple| self.passes_item_filter(tuple))
    }

    fn passes_item_filter(&self, tuple: &[usize]) -> bool {
        passes_item_filter(
            tuple.iter().filter_map(|&i| self.early.get(i)).map(|item| &**item),
            self.config,
        )
    }

    /// Final positions sharing at least one part with `from`, memoized by
    /// the distinct part set.
    fn relevant_targets(&self, from: &Loadout, memo: &mut TargetMemo) -> Arc<[usize]> {
        let parts = from.component_counts();
        let mut key = String::new();
        for part in parts.keys() {
            if !key.is_empty() {
                key.push(NAME_SEPARATOR);
            }
            key.push_str(part);
        }
        if let Some(found) = memo.get(&key) {
            return found;
        }
        let positions: BTreeSet<usize> = parts
            .keys()
            .filter_map(|part| self.part_users.get(part))
            .flatten()
            .copied()
            .collect();
        let relevant: Arc<[usize]> = positions.into_iter().collect::<Vec<_>>().into();
        memo.insert(key, Arc::clone(&relevant));
        relevant
    }

    fn accepts(&self, transition: &LoadoutTransition) -> bool {
        self.request
            .required_items
            .iter()
            .all(|name| transition.to.contains(name))
            && self.constraint.evaluate(transition)
    }

    /// Runs the core loop over the given early tuples.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the token trips between early combinations.
    pub(crate) fn run(
        &self,
        tuples: impl Iterator<Item = Vec<usize>>,
        total: u64,
        worker_id: usize,
        queue_size: usize,
        progress: &mut dyn FnMut(SearchProgress),
    ) -> SearchResult<ChunkOutcome> {
        let started = Instant::now();
        let request = self.request;
        let value_model = request.value_model.as_ref();
        let prune = request.effective_prune_ratio();

        let mut cache = LoadoutCache::new(request.cache_capacity);
        let mut queue = BoundedPriorityQueue::by_score(queue_size);
        let mut memo = TargetMemo::new(request.cache_capacity);
        let mut stats = SearchStats {
            workers: 1,
            ..SearchStats::default()
        };
        let mut early_items = Vec::with_capacity(request.early_count);
        let mut final_items = Vec::with_capacity(request.final_count);

        for tuple in tuples {
            if self.cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            stats.early_combinations += 1;

            early_items.clear();
            early_items.extend(tuple.iter().filter_map(|&i| self.early.get(i).cloned()));
            let from = cache.get_or_create(&early_items, self.repo, value_model, request.slots);

            let relevant = self.relevant_targets(&from, &mut memo);
            if relevant.len() < request.final_count {
                stats.skipped_early += 1;
            } else {
                for positions in IndexCombinations::new(relevant.len(), request.final_count) {
                    final_items.clear();
                    final_items.extend(
                        positions
                            .iter()
                            .filter_map(|&p| self.finals.get(relevant[p]).cloned()),
                    );
                    let to = cache.get_or_create(&final_items, self.repo, value_model, request.slots);

                    if let Some(min_ratio) = prune {
                        if approximate_reuse(&from, &to) < min_ratio {
                            stats.pruned_count += 1;
                            continue;
                        }
                    }

                    stats.total_evaluated += 1;
                    let transition = LoadoutTransition::new(Arc::clone(&from), to, self.repo);
                    if !self.accepts(&transition) {
                        continue;
                    }
                    let score = self.scorer.score(&transition);
                    if !score.is_finite() {
                        stats.non_finite_scores += 1;
                        continue;
                    }
                    stats.record(score);
                    queue.add(ScoredTransition::new(transition, score));
                }
            }

            if stats.early_combinations % PROGRESS_INTERVAL == 0 {
                progress(SearchProgress {
                    worker_id,
                    processed: stats.early_combinations,
                    total,
                    valid: stats.valid_count,
                });
            }
        }

        progress(SearchProgress {
            worker_id,
            processed: stats.early_combinations,
            total,
            valid: stats.valid_count,
        });

        stats.cache_hits = cache.hits();
        stats.cache_misses = cache.misses();
        stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        stats.finish();

        Ok(ChunkOutcome {
            transitions: queue.into_vec(),
            stats,
        })
    }
}

/// Relevant-target sets keyed by distinct part set, bounded like
/// [`LoadoutCache`]: when full, the oldest tenth by insertion is dropped.
pub(crate) struct TargetMemo {
    entries: HashMap<String, Arc<[usize]>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl TargetMemo {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity.min(4096)),
            order: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<[usize]>> {
        self.entries.get(key).map(Arc::clone)
    }

    pub(crate) fn insert(&mut self, key: String, targets: Arc<[usize]>) {
        if self.entries.contains_key(&key) {
            return;
        }
        if self.entries.len() >= self.capacity {
            for _ in 0..self.capacity.div_ceil(10).max(1) {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, targets);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Reused part count over the early part count. O(parts).
///
/// An early loadout with no parts is never pruned.
#[allow(clippy::cast_precision_loss)]
fn approximate_reuse(from: &Loadout, to: &Loadout) -> f64 {
    let total = from.part_count();
    if total == 0 {
        return 1.0;
    }
    let to_counts = to.component_counts();
    let reused: u32 = from
        .component_counts()
        .iter()
        .map(|(part, &count)| count.min(to_counts.get(part).copied().unwrap_or(0)))
        .sum();
    f64::from(reused) / total as f64
}

// =============================================================================
// Entry point
// =============================================================================

/// A configured transition search.
///
/// ```rust,ignore
/// let result = TransitionSearch::new(&repo, &config, SearchRequest::new(2, 2))
///     .with_scorer(TotalRecovery)
///     .run()?;
/// ```
pub struct TransitionSearch<'a> {
    pub(crate) repo: &'a ItemRepository,
    pub(crate) config: &'a AnalysisConfig,
    pub(crate) request: SearchRequest,
    pub(crate) constraint: Arc<dyn Constraint>,
    pub(crate) scorer: Arc<dyn Scorer>,
    pub(crate) cancel: CancellationToken,
    pub(crate) progress: Option<ProgressCallback>,
}

/// A validated request with its candidate pools (catalog indices).
pub(crate) struct PreparedSearch {
    pub(crate) request: SearchRequest,
    pub(crate) early: Vec<usize>,
    pub(crate) finals: Vec<usize>,
    pub(crate) estimated_early: u64,
}

impl<'a> TransitionSearch<'a> {
    /// Creates a search with the default constraint and scorer.
    #[must_use]
    pub fn new(repo: &'a ItemRepository, config: &'a AnalysisConfig, request: SearchRequest) -> Self {
        Self {
            repo,
            config,
            request,
            constraint: Arc::new(default_constraint(config)),
            scorer: Arc::new(default_scorer()),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Replaces the constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraint = Arc::new(constraint);
        self
    }

    /// Replaces the scorer.
    #[must_use]
    pub fn with_scorer(mut self, scorer: impl Scorer + 'static) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }

    /// Uses the given cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Reports progress to `callback`.
    #[must_use]
    pub fn on_progress(mut self, callback: impl Fn(&SearchProgress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// The request this search runs.
    #[must_use]
    pub const fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Validates the request and computes candidate pools.
    pub(crate) fn prepare(&self) -> SearchResult<PreparedSearch> {
        self.request.validate()?;

        let mut request = self.request.clone();
        let mut seen = HashSet::new();
        for name in &mut request.required_items {
            let item = self.repo.get(name).ok_or_else(|| {
                SearchError::InvalidRequest(format!("required item {name} is not in the catalog"))
            })?;
            if !seen.insert(item.name.clone()) {
                return Err(SearchError::InvalidRequest(format!(
                    "required item {} listed twice",
                    item.name
                )));
            }
            name.clone_from(&item.name);
        }

        let early = early_candidates(self.repo, self.config);
        let finals = final_candidates(self.repo, request.max_final_cost);
        let estimated_early = binomial(early.len(), request.early_count);

        Ok(PreparedSearch {
            request,
            early,
            finals,
            estimated_early,
        })
    }

    /// Runs the search, in parallel when the request allows it and the
    /// early combination space is large enough.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the request is inconsistent
    /// - `Cancelled` if the cancellation token trips
    /// - `Worker` / `Protocol` if a parallel worker fails
    pub fn run(&self) -> SearchResult<BuildAnalysisResult> {
        let prepared = self.prepare()?;
        let parallel = prepared.request.workers > 1
            && prepared.estimated_early >= prepared.request.parallel_threshold;

        tracing::info!(
            "Transition search {}->{}: {} early candidates, {} final candidates, {} early combinations ({})",
            prepared.request.early_count,
            prepared.request.final_count,
            prepared.early.len(),
            prepared.finals.len(),
            prepared.estimated_early,
            if parallel { "parallel" } else { "single-threaded" }
        );

        let result = if parallel {
            parallel::orchestrate(self, &prepared)
        } else {
            self.execute_serial(&prepared)
        }?;

        tracing::info!(
            "Transition search finished: {} evaluated, {} valid, best {:?}, {} ms",
            result.stats.total_evaluated,
            result.stats.valid_count,
            result.stats.best_score,
            result.stats.elapsed_ms
        );
        Ok(result)
    }

    /// Runs the search on the calling thread regardless of size.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` or `Cancelled`.
    pub fn run_serial(&self) -> SearchResult<BuildAnalysisResult> {
        let prepared = self.prepare()?;
        self.execute_serial(&prepared)
    }

    /// Runs the search across workers regardless of size.
    ///
    /// # Errors
    ///
    /// `InvalidRequest`, `Cancelled`, `Worker` or `Protocol`.
    pub fn run_parallel(&self) -> SearchResult<BuildAnalysisResult> {
        let prepared = self.prepare()?;
        parallel::orchestrate(self, &prepared)
    }

    fn execute_serial(&self, prepared: &PreparedSearch) -> SearchResult<BuildAnalysisResult> {
        let core = SearchCore::new(
            self.repo,
            self.config,
            &prepared.request,
            &prepared.early,
            &prepared.finals,
            self.constraint.as_ref(),
            self.scorer.as_ref(),
            &self.cancel,
        );
        let mut report = |p: SearchProgress| {
            if let Some(callback) = &self.progress {
                callback(&p);
            }
        };
        // The item filter can drop tuples, so the binomial is only exact
        // without stacking-exempt items
        let total = if self.config.stacking_exempt.is_empty() {
            prepared.estimated_early
        } else {
            u64::try_from(core.early_tuples().count()).unwrap_or(u64::MAX)
        };
        let outcome = core.run(
            core.early_tuples(),
            total,
            0,
            prepared.request.result_limit,
            &mut report,
        )?;
        Ok(BuildAnalysisResult {
            transitions: outcome.transitions,
            stats: outcome.stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::TotalRecovery;

    fn create_test_repo() -> ItemRepository {
        ItemRepository::new(vec![
            Item::base_part("strength_component", 100),
            Item::base_part("agility_component", 100),
            Item::base_part("intelligence_component", 100),
            Item::base_part("lonely_component", 100),
            Item::assembled("bracer", 200, ["strength_component", "agility_component"]),
            Item::assembled("scepter", 400, ["strength_component", "intelligence_component"]),
            Item::assembled("wand", 300, ["agility_component", "intelligence_component"]),
            Item::assembled("hermit", 500, ["lonely_component"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_request_validation() {
        assert!(SearchRequest::new(1, 1).validate().is_ok());
        assert!(SearchRequest::new(0, 1).validate().is_err());
        assert!(SearchRequest::new(1, 1).with_result_limit(0).validate().is_err());
        assert!(SearchRequest::new(1, 1).with_cache_capacity(0).validate().is_err());
        assert!(SearchRequest::new(1, 1).with_workers(0).validate().is_err());
        assert!(SearchRequest::new(1, 1)
            .with_prune_reuse_ratio(Some(1.5))
            .validate()
            .is_err());

        let crowded = SearchRequest::new(1, 3)
            .with_slots(SlotLimits::new(1, 1))
            .with_required_item("a")
            .with_required_item("b")
            .with_required_item("c");
        assert!(matches!(
            crowded.validate(),
            Err(SearchError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_effective_prune_ratio() {
        assert_eq!(SearchRequest::new(2, 2).effective_prune_ratio(), None);
        assert_eq!(
            SearchRequest::new(1, 3).effective_prune_ratio(),
            Some(DEFAULT_PRUNE_REUSE_RATIO)
        );
        assert_eq!(
            SearchRequest::new(3, 3)
                .with_prune_reuse_ratio(None)
                .effective_prune_ratio(),
            None
        );
    }

    #[test]
    fn test_cancellation_token() {
        let parent = CancellationToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
        assert!(parent.clone().is_cancelled());
    }

    #[test]
    fn test_stats_merge() {
        let mut a = SearchStats::default();
        a.record(1.0);
        a.record(3.0);
        let mut b = SearchStats::default();
        b.record(5.0);
        a.merge(&b);
        a.finish();
        assert_eq!(a.valid_count, 3);
        assert_eq!(a.best_score, Some(5.0));
        assert!((a.average_score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_serial_search() {
        let repo = create_test_repo();
        let config = AnalysisConfig::default();
        let request = SearchRequest::new(1, 1).with_workers(1);
        let result = TransitionSearch::new(&repo, &config, request)
            .with_constraint(|t: &LoadoutTransition| t.cost_delta > 0)
            .with_scorer(TotalRecovery)
            .run()
            .unwrap();

        let pairs: Vec<(String, String)> = result
            .transitions
            .iter()
            .map(|t| (t.from().item_names()[0].clone(), t.to().item_names()[0].clone()))
            .collect();
        // wand -> scepter recovers (100 reused + 100 recipe) / 300; both
        // bracer moves recover 100 / 200 and keep arrival order
        assert_eq!(
            pairs,
            vec![
                ("wand".to_string(), "scepter".to_string()),
                ("bracer".to_string(), "scepter".to_string()),
                ("bracer".to_string(), "wand".to_string()),
            ]
        );
        let scores: Vec<f64> = result.transitions.iter().map(|t| t.score).collect();
        assert!((scores[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((scores[1] - 0.5).abs() < 1e-12);
        assert!((scores[2] - 0.5).abs() < 1e-12);
        assert_eq!(result.stats.early_combinations, 3);
        assert_eq!(result.stats.total_evaluated, 9);
        assert_eq!(result.stats.valid_count, 3);
        assert_eq!(result.stats.workers, 1);
    }

    #[test]
    fn test_non_finite_scores_are_dropped() {
        let repo = create_test_repo();
        let config = AnalysisConfig::default();
        let request = SearchRequest::new(1, 1).with_workers(1);
        let result = TransitionSearch::new(&repo, &config, request)
            .with_constraint(|t: &LoadoutTransition| t.cost_delta > 0)
            .with_scorer(|t: &LoadoutTransition| {
                if t.flow.wasted_gold == 0 {
                    f64::INFINITY
                } else if t.to.contains("wand") {
                    f64::NAN
                } else {
                    1.0
                }
            })
            .run()
            .unwrap();

        assert!(result.transitions.iter().all(|t| t.score.is_finite()));
        assert_eq!(result.stats.valid_count, result.transitions.len() as u64);
        assert_eq!(result.stats.valid_count + result.stats.non_finite_scores, 3);
        assert!(result.stats.non_finite_scores >= 1);
        assert_eq!(result.stats.best_score, Some(1.0));
    }

    #[test]
    fn test_target_memo_is_bounded() {
        let mut memo = TargetMemo::new(20);
        for i in 0..100usize {
            memo.insert(format!("part_{i}"), vec![i].into());
            assert!(memo.len() <= 20);
        }
        assert!(memo.get("part_0").is_none());
        assert_eq!(memo.get("part_99").as_deref(), Some(&[99usize][..]));

        memo.insert("part_99".to_string(), vec![0].into());
        assert_eq!(memo.get("part_99").as_deref(), Some(&[99usize][..]));
    }

    #[test]
    fn test_required_item_must_resolve() {
        let repo = create_test_repo();
        let config = AnalysisConfig::default();
        let request = SearchRequest::new(1, 1).with_required_item("nothing");
        let err = TransitionSearch::new(&repo, &config, request).run().unwrap_err();
        assert!(matches!(err, SearchError::InvalidRequest(_)));
    }

    #[test]
    fn test_cancelled_before_start() {
        let repo = create_test_repo();
        let config = AnalysisConfig::default();
        let token = CancellationToken::new();
        token.cancel();
        let err = TransitionSearch::new(&repo, &config, SearchRequest::new(1, 1).with_workers(1))
            .with_cancellation(token)
            .run()
            .unwrap_err();
        assert_eq!(err, SearchError::Cancelled);
    }
}

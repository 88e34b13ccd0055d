//! # Orchestrator
//!
//! Fan-out / fan-in over worker threads.
//!
//! ```text
//!   early tuples ──split──> [chunk 0] [chunk 1] ... [chunk n-1]
//!                               │         │              │
//!                            worker 0  worker 1  ...  worker n-1    (own cache, own queue)
//!                               │         │              │
//!                               └────── channel ─────────┘
//!                                         │
//!                       merge by score ─> truncate ─> rehydrate
//! ```
//!
//! Every spawned worker is joined before returning, on success and on
//! failure alike. The first worker failure cancels the siblings and fails
//! the whole request.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use recraft_catalog::{Item, ItemRepository};

use super::protocol::{
    decode, encode, WireTransition, WorkerChunk, WorkerInput, WorkerMessage, WorkerResult,
};
use super::worker::spawn_worker;
use crate::cache::LoadoutCache;
use crate::driver::{
    BuildAnalysisResult, CancellationToken, PreparedSearch, ProgressCallback, SearchCore,
    SearchRequest, SearchStats, TransitionSearch,
};
use crate::error::{SearchError, SearchResult};
use crate::flow::{LoadoutTransition, ScoredTransition};

/// Channel slots per worker.
const CHANNEL_DEPTH_PER_WORKER: usize = 16;

/// Runs a prepared search across worker threads.
pub(crate) fn orchestrate(
    search: &TransitionSearch<'_>,
    prepared: &PreparedSearch,
) -> SearchResult<BuildAnalysisResult> {
    let started = Instant::now();
    let request = &prepared.request;

    let tuples: Vec<Vec<usize>> = SearchCore::new(
        search.repo,
        search.config,
        request,
        &prepared.early,
        &prepared.finals,
        search.constraint.as_ref(),
        search.scorer.as_ref(),
        &search.cancel,
    )
    .early_tuples()
    .collect();

    let chunks = split_chunks(&tuples, request.workers);
    if chunks.is_empty() {
        return Ok(BuildAnalysisResult {
            transitions: Vec::new(),
            stats: SearchStats::default(),
        });
    }
    tracing::debug!(
        "Splitting {} early combinations across {} workers (chunk sizes {:?})",
        tuples.len(),
        chunks.len(),
        chunks.iter().map(Vec::len).collect::<Vec<_>>()
    );

    // Tripped by the caller's token or by the first worker failure
    let abort = search.cancel.child();
    let (outbox, inbox) = crossbeam_channel::bounded(chunks.len() * CHANNEL_DEPTH_PER_WORKER);
    let items = search.repo.to_items();
    let queue_size = request.result_limit.saturating_mul(2);

    let mut handles = Vec::with_capacity(chunks.len());
    let mut spawn_failure = None;
    for (worker_id, chunk) in chunks.into_iter().enumerate() {
        let input = WorkerInput {
            items: items.clone(),
            early_candidates: prepared.early.clone(),
            final_candidates: prepared.finals.clone(),
            config: search.config.clone(),
            request: request.clone(),
            queue_size,
            chunk: WorkerChunk {
                worker_id,
                estimated_total: chunk.len() as u64,
                early_tuples: chunk,
            },
        };
        let spawned = encode(&input).and_then(|bytes| {
            spawn_worker(
                worker_id,
                bytes,
                Arc::clone(&search.constraint),
                Arc::clone(&search.scorer),
                abort.clone(),
                outbox.clone(),
            )
        });
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                spawn_failure = Some(err);
                abort.cancel();
                break;
            }
        }
    }
    drop(outbox);

    let collected = fan_in(&inbox, handles.len(), &abort, search.progress.as_ref());

    // Cleanup: every worker is joined, whatever happened above
    let mut join_failure = None;
    for (worker_id, handle) in handles.into_iter().enumerate() {
        if handle.join().is_err() {
            join_failure.get_or_insert(SearchError::Worker {
                worker_id,
                message: "thread terminated abnormally".to_string(),
            });
        }
    }

    if let Some(err) = spawn_failure.or(collected.failure).or(join_failure) {
        return Err(err);
    }
    if collected.cancelled {
        return Err(SearchError::Cancelled);
    }

    let worker_count = collected.results.len();
    let mut stats = SearchStats::default();
    let mut merged: Vec<WireTransition> = Vec::new();
    for (worker_id, result) in collected.results.into_iter().enumerate() {
        let Some(result) = result else {
            return Err(SearchError::Worker {
                worker_id,
                message: "exited without a result".to_string(),
            });
        };
        stats.merge(&result.stats);
        merged.extend(result.transitions);
    }

    // Stable: equal scores keep worker order, then each worker's own order
    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged.truncate(request.result_limit);

    stats.workers = worker_count;
    stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    stats.finish();

    Ok(BuildAnalysisResult {
        transitions: rehydrate(search.repo, request, merged),
        stats,
    })
}

/// Contiguous, near-equal chunks; never more chunks than tuples.
fn split_chunks(tuples: &[Vec<usize>], workers: usize) -> Vec<Vec<Vec<usize>>> {
    if tuples.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, tuples.len());
    let size = tuples.len().div_ceil(workers);
    tuples.chunks(size).map(<[Vec<usize>]>::to_vec).collect()
}

/// What the fan-in loop gathered.
struct Collected {
    /// Terminal results by worker id.
    results: Vec<Option<WorkerResult>>,
    /// First real failure.
    failure: Option<SearchError>,
    /// Some worker stopped on cancellation.
    cancelled: bool,
}

/// Receives until every worker has sent its terminal message or every
/// sender is gone.
fn fan_in(
    inbox: &Receiver<Vec<u8>>,
    workers: usize,
    abort: &CancellationToken,
    progress: Option<&ProgressCallback>,
) -> Collected {
    let mut collected = Collected {
        results: (0..workers).map(|_| None).collect(),
        failure: None,
        cancelled: false,
    };
    let mut terminals = 0;

    while terminals < workers {
        let Ok(bytes) = inbox.recv() else {
            break;
        };
        let message = match decode::<WorkerMessage>(&bytes) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!("Dropping undecodable worker message: {}", err);
                collected.failure.get_or_insert(err);
                abort.cancel();
                continue;
            }
        };

        match message {
            WorkerMessage::Progress(report) => {
                if let Some(callback) = progress {
                    callback(&report);
                }
            }
            WorkerMessage::Result(result) => {
                terminals += 1;
                let worker_id = result.worker_id;
                if let Some(slot) = collected.results.get_mut(worker_id) {
                    *slot = Some(result);
                }
            }
            WorkerMessage::Error(failure) => {
                terminals += 1;
                abort.cancel();
                if failure.cancelled {
                    collected.cancelled = true;
                } else {
                    tracing::warn!("Worker {} failed: {}", failure.worker_id, failure.error);
                    collected.failure.get_or_insert(SearchError::Worker {
                        worker_id: failure.worker_id,
                        message: failure.error,
                    });
                }
            }
        }
    }

    collected
}

/// Rebuilds full transitions from item names.
fn rehydrate(
    repo: &ItemRepository,
    request: &SearchRequest,
    merged: Vec<WireTransition>,
) -> Vec<ScoredTransition> {
    let mut cache = LoadoutCache::new(request.cache_capacity);
    let value_model = request.value_model.as_ref();
    merged
        .into_iter()
        .map(|wire| {
            let from_items = lookup(repo, &wire.from);
            let to_items = lookup(repo, &wire.to);
            let from = cache.get_or_create(&from_items, repo, value_model, request.slots);
            let to = cache.get_or_create(&to_items, repo, value_model, request.slots);
            ScoredTransition::new(LoadoutTransition::new(from, to, repo), wire.score)
        })
        .collect()
}

fn lookup(repo: &ItemRepository, names: &[String]) -> Vec<Arc<Item>> {
    names
        .iter()
        .filter_map(|name| {
            let found = repo.get(name).cloned();
            if found.is_none() {
                tracing::warn!("Worker returned unknown item {}", name);
            }
            found
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_chunks() {
        let tuples: Vec<Vec<usize>> = (0..10).map(|i| vec![i]).collect();
        let chunks = split_chunks(&tuples, 3);
        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(chunks.concat(), tuples);

        assert_eq!(split_chunks(&tuples[..2], 8).len(), 2);
        assert!(split_chunks(&[], 4).is_empty());
    }
}

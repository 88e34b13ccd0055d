//! # Search Worker
//!
//! One thread per chunk. A worker decodes its input, rebuilds its own
//! repository, runs the core loop over its early tuples with its own cache
//! and queue, and reports back through the channel:
//!
//! - progress with `try_send` (dropped when the channel is full)
//! - exactly one terminal message with a blocking `send`
//!
//! Panics inside the worker are caught and reported as an `Error` message.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use recraft_catalog::ItemRepository;

use super::protocol::{
    decode, encode, WireTransition, WorkerFailure, WorkerInput, WorkerMessage, WorkerResult,
};
use crate::driver::{CancellationToken, SearchCore, SearchProgress};
use crate::error::{SearchError, SearchResult};
use crate::policy::{Constraint, Scorer};

/// Spawns a worker thread over an encoded [`WorkerInput`].
///
/// The constraint and scorer are shared read-only with the other workers.
///
/// # Errors
///
/// Returns `Worker` if the OS refuses to spawn the thread.
pub(crate) fn spawn_worker(
    worker_id: usize,
    input: Vec<u8>,
    constraint: Arc<dyn Constraint>,
    scorer: Arc<dyn Scorer>,
    cancel: CancellationToken,
    outbox: Sender<Vec<u8>>,
) -> SearchResult<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("recraft-worker-{worker_id}"))
        .spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                run_worker(
                    worker_id,
                    &input,
                    constraint.as_ref(),
                    scorer.as_ref(),
                    &cancel,
                    &outbox,
                )
            }));

            let terminal = match outcome {
                Ok(Ok(result)) => WorkerMessage::Result(result),
                Ok(Err(err)) => WorkerMessage::Error(WorkerFailure {
                    worker_id,
                    cancelled: err == SearchError::Cancelled,
                    error: err.to_string(),
                }),
                Err(panic) => WorkerMessage::Error(WorkerFailure {
                    worker_id,
                    error: format!("panicked: {}", panic_message(panic.as_ref())),
                    cancelled: false,
                }),
            };
            send_terminal(worker_id, &terminal, &outbox);
        })
        .map_err(|e| SearchError::Worker {
            worker_id,
            message: format!("failed to spawn: {e}"),
        })
}

/// Decodes the input and runs the core loop over the assigned chunk.
fn run_worker(
    worker_id: usize,
    input: &[u8],
    constraint: &dyn Constraint,
    scorer: &dyn Scorer,
    cancel: &CancellationToken,
    outbox: &Sender<Vec<u8>>,
) -> SearchResult<WorkerResult> {
    let input: WorkerInput = decode(input)?;
    if input.chunk.worker_id != worker_id {
        return Err(SearchError::Protocol(format!(
            "chunk for worker {} delivered to worker {worker_id}",
            input.chunk.worker_id
        )));
    }

    let repo = ItemRepository::new(input.items)?;
    let core = SearchCore::new(
        &repo,
        &input.config,
        &input.request,
        &input.early_candidates,
        &input.final_candidates,
        constraint,
        scorer,
        cancel,
    );

    let mut report = |progress: SearchProgress| {
        if let Ok(bytes) = encode(&WorkerMessage::Progress(progress)) {
            // Progress is advisory; a full channel drops it
            let _ = outbox.try_send(bytes);
        }
    };

    let outcome = core.run(
        input.chunk.early_tuples.into_iter(),
        input.chunk.estimated_total,
        worker_id,
        input.queue_size,
        &mut report,
    )?;

    Ok(WorkerResult {
        worker_id,
        transitions: outcome.transitions.iter().map(WireTransition::from).collect(),
        stats: outcome.stats,
    })
}

/// Sends the terminal message, falling back to a plain error if it cannot
/// be encoded.
fn send_terminal(worker_id: usize, terminal: &WorkerMessage, outbox: &Sender<Vec<u8>>) {
    let bytes = encode(terminal).or_else(|err| {
        encode(&WorkerMessage::Error(WorkerFailure {
            worker_id,
            error: err.to_string(),
            cancelled: false,
        }))
    });
    match bytes {
        Ok(bytes) => {
            if outbox.send(bytes).is_err() {
                tracing::warn!("Worker {}: orchestrator hung up before result", worker_id);
            }
        }
        Err(err) => tracing::warn!("Worker {}: cannot encode result: {}", worker_id, err),
    }
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_bad_input_reports_error() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = spawn_worker(
            4,
            b"garbage".to_vec(),
            Arc::new(|_: &crate::flow::LoadoutTransition| true),
            Arc::new(|_: &crate::flow::LoadoutTransition| 0.0),
            CancellationToken::new(),
            tx,
        )
        .unwrap();
        handle.join().unwrap();

        let message: WorkerMessage = decode(&rx.recv().unwrap()).unwrap();
        match message {
            WorkerMessage::Error(failure) => {
                assert_eq!(failure.worker_id, 4);
                assert!(!failure.cancelled);
                assert!(failure.error.contains("protocol"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }
}

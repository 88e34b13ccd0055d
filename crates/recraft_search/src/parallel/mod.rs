//! # Parallel Orchestration
//!
//! Shared-nothing workers over chunks of the early combination space.
//!
//! Each worker receives a self-contained [`WorkerInput`] as bytes, rebuilds
//! its own repository, and keeps its own cache and result queue. Results come
//! back as [`WorkerMessage`]s with items referenced by name; the orchestrator
//! merges them by score and rehydrates full transitions locally.

pub mod protocol;

mod orchestrator;
mod worker;

pub(crate) use orchestrator::orchestrate;

pub use protocol::{
    decode, encode, FlowSummary, WireTransition, WorkerChunk, WorkerFailure, WorkerInput,
    WorkerMessage, WorkerResult, PROTOCOL_VERSION,
};

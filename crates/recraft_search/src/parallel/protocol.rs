//! # Worker Protocol
//!
//! Versioned message schema between the orchestrator and its workers.
//!
//! ```text
//!   orchestrator ── WorkerInput ──────────────> worker      (one, at start)
//!   orchestrator <── Progress ───────────────── worker      (any number, lossy)
//!   orchestrator <── Result | Error ─────────── worker      (exactly one)
//! ```
//!
//! Every message is wrapped in an envelope carrying [`PROTOCOL_VERSION`] and
//! encoded as JSON. Nothing crosses the boundary by reference: items travel
//! as plain data and transitions reference items by name.
//!
//! Floats must come back bit-identical, so `serde_json` is built with
//! `float_roundtrip`. JSON has no infinities or NaN; the search drops
//! non-finite scores before they can reach a message.

use recraft_catalog::{AnalysisConfig, Item};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::driver::{SearchProgress, SearchRequest, SearchStats};
use crate::error::{SearchError, SearchResult};
use crate::flow::{ComponentFlow, ScoredTransition};

/// Version of the worker message schema.
pub const PROTOCOL_VERSION: u32 = 2;

/// A worker's share of the early combination space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerChunk {
    /// Assigned worker.
    pub worker_id: usize,
    /// Early index tuples (positions into the early candidate pool).
    pub early_tuples: Vec<Vec<usize>>,
    /// Iterations expected for progress reporting.
    pub estimated_total: u64,
}

/// Startup message: everything a worker needs to run in isolation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerInput {
    /// Full item catalog.
    pub items: Vec<Item>,
    /// Catalog indices of early candidates.
    pub early_candidates: Vec<usize>,
    /// Catalog indices of final candidates.
    pub final_candidates: Vec<usize>,
    /// Analysis configuration.
    pub config: AnalysisConfig,
    /// Counts, result cap, value model, cost ceiling and the rest.
    pub request: SearchRequest,
    /// Worker queue capacity.
    pub queue_size: usize,
    /// Assigned work.
    pub chunk: WorkerChunk,
}

/// Flattened component flow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    /// Reused part names.
    pub reused: Vec<String>,
    /// Wasted part names.
    pub wasted: Vec<String>,
    /// Acquired part names.
    pub acquired: Vec<String>,
    /// Gold of reused parts.
    pub reused_gold: u64,
    /// Gold of wasted parts.
    pub wasted_gold: u64,
    /// Gold of acquired parts.
    pub acquired_gold: u64,
    /// Recipe surcharge recovered.
    pub recovered_recipe_cost: u64,
    /// Recipe surcharge paid.
    pub target_recipe_cost: u64,
    /// Net recipe cost.
    pub net_recipe_cost: i64,
    /// Total gold needed.
    pub total_gold_needed: i64,
}

impl From<&ComponentFlow> for FlowSummary {
    fn from(flow: &ComponentFlow) -> Self {
        Self {
            reused: flow.reused.clone(),
            wasted: flow.wasted.clone(),
            acquired: flow.acquired.clone(),
            reused_gold: flow.reused_gold,
            wasted_gold: flow.wasted_gold,
            acquired_gold: flow.acquired_gold,
            recovered_recipe_cost: flow.recovered_recipe_cost,
            target_recipe_cost: flow.target_recipe_cost,
            net_recipe_cost: flow.net_recipe_cost,
            total_gold_needed: flow.total_gold_needed,
        }
    }
}

/// A scored transition referencing items by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireTransition {
    /// Early loadout item names.
    pub from: Vec<String>,
    /// Final loadout item names.
    pub to: Vec<String>,
    /// Cost delta.
    pub cost_delta: i64,
    /// Score.
    pub score: f64,
    /// Component flow summary.
    pub flow: FlowSummary,
}

impl From<&ScoredTransition> for WireTransition {
    fn from(scored: &ScoredTransition) -> Self {
        Self {
            from: scored.from().item_names(),
            to: scored.to().item_names(),
            cost_delta: scored.cost_delta(),
            score: scored.score,
            flow: FlowSummary::from(scored.flow()),
        }
    }
}

/// Successful terminal message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// Reporting worker.
    pub worker_id: usize,
    /// Worker's best transitions, best first.
    pub transitions: Vec<WireTransition>,
    /// Chunk statistics.
    pub stats: SearchStats,
}

/// Failed terminal message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFailure {
    /// Reporting worker.
    pub worker_id: usize,
    /// Failure description.
    pub error: String,
    /// The worker stopped because of cancellation, not a fault.
    pub cancelled: bool,
}

/// Worker -> orchestrator message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Non-terminal progress report.
    Progress(SearchProgress),
    /// Terminal success.
    Result(WorkerResult),
    /// Terminal failure.
    Error(WorkerFailure),
}

impl WorkerMessage {
    /// Whether this is the worker's last message.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    payload: T,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    version: u32,
}

/// Encodes a message with the current protocol version.
///
/// # Errors
///
/// Returns `Protocol` if the payload cannot be serialized.
pub fn encode<T: Serialize>(payload: &T) -> SearchResult<Vec<u8>> {
    serde_json::to_vec(&EnvelopeRef {
        version: PROTOCOL_VERSION,
        payload,
    })
    .map_err(|e| SearchError::Protocol(format!("encode failed: {e}")))
}

/// Decodes a message, rejecting other protocol versions.
///
/// # Errors
///
/// Returns `Protocol` on malformed input or a version mismatch.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> SearchResult<T> {
    let header: EnvelopeHeader = serde_json::from_slice(bytes)
        .map_err(|e| SearchError::Protocol(format!("malformed envelope: {e}")))?;
    if header.version != PROTOCOL_VERSION {
        return Err(SearchError::Protocol(format!(
            "protocol version {} is not supported (expected {PROTOCOL_VERSION})",
            header.version
        )));
    }
    let envelope: Envelope<T> = serde_json::from_slice(bytes)
        .map_err(|e| SearchError::Protocol(format!("decode failed: {e}")))?;
    Ok(envelope.payload)
}

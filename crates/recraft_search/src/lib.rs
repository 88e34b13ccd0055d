//! # RECRAFT Search
//!
//! Transition search over composable items: given a catalog of items built
//! from base parts, find early-game loadouts that transition well into
//! late-game loadouts by reusing the same parts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       TransitionSearch                          │
//! │  request ─> candidates ─> combinations ─> loadouts ─> policies  │
//! └────────────────┬───────────────────────────────┬────────────────┘
//!                  │ serial                        │ parallel
//!                  ▼                               ▼
//!         ┌─────────────────┐        ┌──────────────────────────────┐
//!         │   SearchCore    │        │  orchestrator ──> workers    │
//!         │ cache + queue   │        │  (chunks, messages, merge)   │
//!         └─────────────────┘        └──────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Lazy enumeration** - Combinations are generated one at a time, never
//!    materialized up front
//! 2. **Bounded memory** - Results live in a fixed-size queue, loadouts in a
//!    capped cache
//! 3. **Pure policies** - Constraints and scorers are side-effect free and
//!    shared read-only between threads
//! 4. **Shared nothing** - Workers exchange serialized messages only
//!
//! ## Example
//!
//! ```rust,ignore
//! use recraft_catalog::{AnalysisConfig, ItemRepository};
//! use recraft_search::{policy::MinTotalRecovery, SearchRequest, TransitionSearch};
//!
//! let repo = ItemRepository::load("data/items.toml")?;
//! let config = AnalysisConfig::load("data/analysis.toml")?;
//!
//! let result = TransitionSearch::new(&repo, &config, SearchRequest::new(2, 3))
//!     .with_constraint(MinTotalRecovery(0.6))
//!     .run()?;
//!
//! for scored in &result.transitions {
//!     println!("{:?} -> {:?}: {:.3}", scored.from().item_names(), scored.to().item_names(),
//!         scored.score);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cache;
pub mod candidates;
pub mod combinatorics;
pub mod driver;
pub mod error;
pub mod flow;
pub mod loadout;
pub mod parallel;
pub mod policy;
pub mod pool;
pub mod queue;

pub use cache::{cache_key, LoadoutCache, DEFAULT_CACHE_CAPACITY};
pub use combinatorics::{
    binomial, combinations, filtered_combinations, Combinations, IndexCombinations,
};
pub use driver::{
    BuildAnalysisResult, CancellationToken, ProgressCallback, SearchProgress, SearchRequest,
    SearchStats, TransitionSearch,
};
pub use error::{SearchError, SearchResult};
pub use flow::{analyze_component_flow, ComponentFlow, LoadoutTransition, ScoredTransition};
pub use loadout::{create_loadout, Loadout};
pub use policy::{Constraint, ExplainedConstraint, Scorer, Side};
pub use pool::{AssemblyPlan, ComponentPool, TargetAssembly};
pub use queue::{BoundedPriorityQueue, Comparator, Scored};

//! # Search Error Types
//!
//! Only configuration errors, worker failures and cancellation surface as
//! errors. Data gaps inside the search loop degrade to zero values.

use recraft_catalog::CatalogError;
use thiserror::Error;

/// Errors that can occur when running a transition search.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The search request is inconsistent (rejected before any work starts).
    #[error("invalid search request: {0}")]
    InvalidRequest(String),

    /// The catalog or configuration could not be built.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A parallel worker failed; the whole request is rejected.
    #[error("worker {worker_id} failed: {message}")]
    Worker {
        /// Worker that reported the failure.
        worker_id: usize,
        /// Failure description.
        message: String,
    },

    /// A worker message could not be encoded or decoded.
    #[error("worker protocol error: {0}")]
    Protocol(String),

    /// The search was cancelled by the caller.
    #[error("search cancelled")]
    Cancelled,
}

/// Result type for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

//! # Catalog Error Types
//!
//! Errors raised while building a catalog or loading configuration.
//!
//! Lookups during a search never fail: an unknown name degrades to a
//! zero-cost leaf part. Only malformed input at load time is an error.

use thiserror::Error;

/// Errors that can occur while constructing a catalog or configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Two catalog entries share the same internal name.
    #[error("duplicate item name: {0}")]
    DuplicateItem(String),

    /// An item or component name is empty or contains the key separator.
    #[error("invalid item name: {0:?}")]
    InvalidName(String),

    /// The composition graph contains a cycle (an item builds into itself).
    #[error("cycle detected in item composition: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A catalog or configuration file could not be read.
    #[error("failed to read {path}: {reason}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O failure.
        reason: String,
    },

    /// A catalog or configuration document could not be parsed.
    #[error("failed to parse TOML: {0}")]
    Parse(String),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Reads a UTF-8 file, mapping failures into [`CatalogError::Io`].
pub(crate) fn read_file(path: &std::path::Path) -> CatalogResult<String> {
    std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

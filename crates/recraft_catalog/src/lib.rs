//! # RECRAFT Catalog
//!
//! Item data and analysis configuration for the RECRAFT transition search.
//!
//! ## Design Principles
//!
//! 1. **Immutable after load** - The repository never changes during a search
//! 2. **Total lookups** - Unknown names degrade to zero-cost leaf parts
//! 3. **Validated at the boundary** - Duplicates and composition cycles are
//!    rejected when the catalog is built, never inside the search loop
//! 4. **External configuration** - Catalogs and settings live in TOML files
//!
//! ## Example
//!
//! ```rust,ignore
//! use recraft_catalog::{AnalysisConfig, ItemRepository};
//!
//! let repo = ItemRepository::load("data/items.toml")?;
//! let config = AnalysisConfig::load("data/analysis.toml")?;
//!
//! let parts = repo.flatten("greater_bracer");
//! let surcharge = repo.recipe_cost("greater_bracer");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod item;
pub mod repository;

pub use config::{AnalysisConfig, SlotLimits, StatValueModel};
pub use error::{CatalogError, CatalogResult};
pub use item::{Item, ItemFlags, NAME_SEPARATOR};
pub use repository::ItemRepository;

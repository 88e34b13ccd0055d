//! # Analysis Configuration
//!
//! Plain value objects that parameterize a search. All of them can be
//! loaded from TOML and carry no behavior beyond validation.
//!
//! ```toml
//! min_gold_recovery = 0.6
//! early_game_cost_ceiling = 2000
//! stacking_exempt = ["boots", "travel_boots"]
//! key_items = ["blink"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{read_file, CatalogError, CatalogResult};
use crate::item::Item;

/// Default active (inventory) slots.
pub const DEFAULT_ACTIVE_SLOTS: usize = 6;

/// Default reserve (backpack) slots.
pub const DEFAULT_RESERVE_SLOTS: usize = 3;

/// Search-wide analysis settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum fraction of the early loadout's gold that must be recovered.
    pub min_gold_recovery: f64,
    /// Most expensive item still considered "early game".
    pub early_game_cost_ceiling: u32,
    /// Items whose effects do not stack; at most one per loadout.
    pub stacking_exempt: Vec<String>,
    /// Items of particular interest to the caller. Not applied on its own;
    /// a search requires them only when its request is built with
    /// `SearchRequest::requiring_key_items`.
    pub key_items: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_gold_recovery: 0.5,
            early_game_cost_ceiling: 2500,
            stacking_exempt: Vec::new(),
            key_items: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Parses a configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed TOML and `InvalidConfig` if validation fails.
    pub fn from_toml_str(content: &str) -> CatalogResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, plus any error from
    /// [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let content = read_file(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `min_gold_recovery` is outside `[0, 1]`.
    pub fn validate(&self) -> CatalogResult<()> {
        if !(0.0..=1.0).contains(&self.min_gold_recovery) {
            return Err(CatalogError::InvalidConfig(format!(
                "min_gold_recovery must be within [0, 1], got {}",
                self.min_gold_recovery
            )));
        }
        Ok(())
    }

    /// Whether the named item is stacking-exempt.
    #[inline]
    #[must_use]
    pub fn is_stacking_exempt(&self, name: &str) -> bool {
        self.stacking_exempt.iter().any(|n| n == name)
    }
}

/// Slot capacities of a loadout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotLimits {
    /// Slots whose items contribute stats.
    pub active: usize,
    /// Slots whose items are held but contribute no stats.
    pub reserve: usize,
}

impl Default for SlotLimits {
    fn default() -> Self {
        Self {
            active: DEFAULT_ACTIVE_SLOTS,
            reserve: DEFAULT_RESERVE_SLOTS,
        }
    }
}

impl SlotLimits {
    /// Creates slot limits.
    #[must_use]
    pub const fn new(active: usize, reserve: usize) -> Self {
        Self { active, reserve }
    }

    /// Total held capacity.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> usize {
        self.active + self.reserve
    }

    /// Checks that at least one active slot exists.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if there are no active slots.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.active == 0 {
            return Err(CatalogError::InvalidConfig(
                "at least one active slot is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Gold value of one point of each stat.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatValueModel {
    /// Stat name -> gold per point.
    pub gold_per_point: BTreeMap<String, f64>,
}

impl StatValueModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gold rate for a stat.
    #[must_use]
    pub fn with_rate(mut self, stat: impl Into<String>, gold_per_point: f64) -> Self {
        self.gold_per_point.insert(stat.into(), gold_per_point);
        self
    }

    /// Gold value of an item's stats. Stats without a rate are worth nothing.
    #[must_use]
    pub fn value_of(&self, item: &Item) -> f64 {
        item.stats
            .iter()
            .filter_map(|(stat, amount)| self.gold_per_point.get(stat).map(|rate| rate * amount))
            .sum()
    }

    /// Parses a model from a TOML table of `stat = gold_per_point`.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed TOML.
    pub fn from_toml_str(content: &str) -> CatalogResult<Self> {
        toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            min_gold_recovery = 0.8
            stacking_exempt = ["boots"]
            "#,
        )
        .unwrap();
        assert!((config.min_gold_recovery - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.early_game_cost_ceiling, 2500);
        assert!(config.is_stacking_exempt("boots"));
        assert!(!config.is_stacking_exempt("blade"));
    }

    #[test]
    fn test_config_rejects_bad_recovery() {
        let err = AnalysisConfig::from_toml_str("min_gold_recovery = 1.5").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConfig(_)));
    }

    #[test]
    fn test_slot_limits() {
        let slots = SlotLimits::default();
        assert_eq!(slots.total(), 9);
        assert!(slots.validate().is_ok());
        assert!(SlotLimits::new(0, 3).validate().is_err());
    }

    #[test]
    fn test_stat_value_model() {
        let model = StatValueModel::from_toml_str("strength = 50.0\nagility = 40.0").unwrap();
        let item = Item::base_part("band", 100)
            .with_stat("strength", 2.0)
            .with_stat("agility", 1.0)
            .with_stat("luck", 9.0);
        assert!((model.value_of(&item) - 140.0).abs() < 1e-9);
    }
}

//! # Item Model
//!
//! Catalog entries. An item is either a base part (a leaf of the
//! composition graph) or an assembled item built from sub-items.
//!
//! Refund behavior is carried by an explicit [`ItemFlags::RECIPE`] tag
//! instead of being inferred from the item's name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Joins item and part names in composite keys; never valid inside a name.
pub const NAME_SEPARATOR: char = ',';

/// Flags for item properties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ItemFlags(u32);

impl ItemFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Item is a base part with no sub-components.
    pub const BASE_PART: Self = Self(1 << 0);
    /// Item is consumed on use and never held in a loadout.
    pub const CONSUMABLE: Self = Self(1 << 1);
    /// Item is a recipe scroll: fully refundable when discarded.
    pub const RECIPE: Self = Self(1 << 2);

    /// Creates flags from raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Checks if a specific flag is set.
    #[inline]
    #[must_use]
    pub const fn has(self, flag: Self) -> bool {
        (self.0 & flag.0) != 0
    }

    /// Combines two flag sets.
    #[inline]
    #[must_use]
    pub const fn with(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }
}

/// A catalog item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "ItemRecord", into = "ItemRecord")]
pub struct Item {
    /// Stable internal identifier.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Purchase cost in gold.
    pub cost: u32,
    /// Sparse map of stat name to bonus.
    pub stats: BTreeMap<String, f64>,
    /// Item flags (base part, consumable, recipe).
    pub flags: ItemFlags,
    /// Immediate sub-item names (empty for base parts).
    pub components: Vec<String>,
}

impl Item {
    /// Creates a base part.
    #[must_use]
    pub fn base_part(name: impl Into<String>, cost: u32) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            cost,
            stats: BTreeMap::new(),
            flags: ItemFlags::BASE_PART,
            components: Vec::new(),
        }
    }

    /// Creates an assembled item from immediate sub-item names.
    #[must_use]
    pub fn assembled<S: Into<String>>(
        name: impl Into<String>,
        cost: u32,
        components: impl IntoIterator<Item = S>,
    ) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            cost,
            stats: BTreeMap::new(),
            flags: ItemFlags::NONE,
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Adds a stat bonus.
    #[must_use]
    pub fn with_stat(mut self, stat: impl Into<String>, value: f64) -> Self {
        self.stats.insert(stat.into(), value);
        self
    }

    /// Adds flags.
    #[must_use]
    pub const fn with_flags(mut self, flags: ItemFlags) -> Self {
        self.flags = self.flags.with(flags);
        self
    }

    /// Returns true for leaves of the composition graph.
    #[inline]
    #[must_use]
    pub fn is_base_part(&self) -> bool {
        self.flags.has(ItemFlags::BASE_PART) || self.components.is_empty()
    }

    /// Returns true for items built from at least one sub-item.
    #[inline]
    #[must_use]
    pub fn is_assembled(&self) -> bool {
        !self.components.is_empty()
    }

    /// Returns true for consumables.
    #[inline]
    #[must_use]
    pub const fn is_consumable(&self) -> bool {
        self.flags.has(ItemFlags::CONSUMABLE)
    }

    /// Returns true for recipe-type items (full refund on discard).
    #[inline]
    #[must_use]
    pub const fn is_recipe(&self) -> bool {
        self.flags.has(ItemFlags::RECIPE)
    }

    /// Returns true if the item grants any stat bonus.
    #[inline]
    #[must_use]
    pub fn has_stats(&self) -> bool {
        self.stats.values().any(|v| *v != 0.0)
    }

    /// Gold refunded when this item is sold off.
    ///
    /// Recipes refund in full, everything else refunds half (rounded down).
    #[inline]
    #[must_use]
    pub const fn sale_refund(&self) -> u32 {
        if self.is_recipe() {
            self.cost
        } else {
            self.cost / 2
        }
    }
}

/// On-disk / on-wire shape of an [`Item`].
///
/// Flags are spelled out as booleans so catalog files stay readable.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ItemRecord {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    cost: u32,
    #[serde(default)]
    stats: BTreeMap<String, f64>,
    #[serde(default)]
    components: Vec<String>,
    #[serde(default)]
    base_part: Option<bool>,
    #[serde(default)]
    consumable: bool,
    #[serde(default)]
    recipe: bool,
}

impl From<ItemRecord> for Item {
    fn from(record: ItemRecord) -> Self {
        let mut flags = ItemFlags::NONE;
        if record.base_part.unwrap_or(record.components.is_empty()) {
            flags = flags.with(ItemFlags::BASE_PART);
        }
        if record.consumable {
            flags = flags.with(ItemFlags::CONSUMABLE);
        }
        if record.recipe {
            flags = flags.with(ItemFlags::RECIPE);
        }
        Self {
            display_name: record.display_name.unwrap_or_else(|| record.name.clone()),
            name: record.name,
            cost: record.cost,
            stats: record.stats,
            flags,
            components: record.components,
        }
    }
}

impl From<Item> for ItemRecord {
    fn from(item: Item) -> Self {
        Self {
            base_part: Some(item.flags.has(ItemFlags::BASE_PART)),
            consumable: item.is_consumable(),
            recipe: item.is_recipe(),
            name: item.name,
            display_name: Some(item.display_name),
            cost: item.cost,
            stats: item.stats,
            components: item.components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_combine() {
        let flags = ItemFlags::NONE
            .with(ItemFlags::CONSUMABLE)
            .with(ItemFlags::RECIPE);
        assert!(flags.has(ItemFlags::CONSUMABLE));
        assert!(flags.has(ItemFlags::RECIPE));
        assert!(!flags.has(ItemFlags::BASE_PART));
        assert_eq!(ItemFlags::from_raw(flags.raw()), flags);
    }

    #[test]
    fn test_sale_refund() {
        let sword = Item::assembled("sword", 301, ["blade"]);
        assert_eq!(sword.sale_refund(), 150);

        let recipe = Item::base_part("recipe_sword", 200).with_flags(ItemFlags::RECIPE);
        assert_eq!(recipe.sale_refund(), 200);
    }

    #[test]
    fn test_part_classification() {
        let part = Item::base_part("blade", 100).with_stat("damage", 10.0);
        assert!(part.is_base_part());
        assert!(!part.is_assembled());
        assert!(part.has_stats());

        let sword = Item::assembled("sword", 300, ["blade", "hilt"]);
        assert!(sword.is_assembled());
        assert!(!sword.is_base_part());
        assert!(!sword.has_stats());
    }

    #[test]
    fn test_record_defaults() {
        let item: Item = toml::from_str(
            r#"
            name = "mango"
            cost = 70
            consumable = true
            "#,
        )
        .unwrap();
        assert_eq!(item.display_name, "mango");
        assert!(item.is_base_part());
        assert!(item.is_consumable());
        assert!(!item.is_recipe());
    }
}

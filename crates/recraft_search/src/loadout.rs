//! # Loadout Engine
//!
//! An immutable snapshot of a set of held items.
//!
//! ## Slot Partition
//!
//! Items are stably sorted by priority and sliced into three contiguous runs:
//!
//! ```text
//!  priority order ──> [ active (stats) | reserve (held) | discarded (sold) ]
//!                       <- slots.active -><- slots.reserve ->
//! ```
//!
//! Priority: assembled items before base parts, items with stat bonuses
//! before those without, higher cost before lower. Discarded items are sold:
//! recipes refund in full, everything else refunds half.
//!
//! The three runs always form an exact partition of the input multiset.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use recraft_catalog::{Item, ItemRepository, SlotLimits, StatValueModel};

/// An immutable loadout snapshot.
#[derive(Clone, Debug)]
pub struct Loadout {
    /// All items, input order.
    items: Vec<Arc<Item>>,
    /// Items in active slots (contribute stats).
    active: Vec<Arc<Item>>,
    /// Items in reserve slots (held, no stats).
    reserve: Vec<Arc<Item>>,
    /// Items that did not fit and are sold off.
    discarded: Vec<Arc<Item>>,
    /// Cost of retained items (active + reserve).
    total_cost: u64,
    /// Cost of every item, discarded included.
    gross_cost: u64,
    /// Gold refunded for discarded items.
    refund: u64,
    /// Flattened base parts of retained items.
    components: Vec<String>,
    /// Base part -> count.
    component_counts: BTreeMap<String, u32>,
    /// Gold value of active stats.
    stat_value: f64,
    /// `stat_value / net_cost`.
    efficiency: f64,
}

impl Loadout {
    /// Builds a loadout.
    ///
    /// Total: never fails. Unresolved part names contribute zero gold.
    #[must_use]
    pub fn build(
        items: Vec<Arc<Item>>,
        repo: &ItemRepository,
        value_model: Option<&StatValueModel>,
        slots: SlotLimits,
    ) -> Self {
        let mut ordered = items.clone();
        ordered.sort_by_key(|item| (item.is_base_part(), !item.has_stats(), Reverse(item.cost)));

        let active_end = slots.active.min(ordered.len());
        let reserve_end = (active_end + slots.reserve).min(ordered.len());
        let discarded = ordered.split_off(reserve_end);
        let reserve = ordered.split_off(active_end);
        let active = ordered;

        let retained = || active.iter().chain(reserve.iter());

        let total_cost: u64 = retained().map(|item| u64::from(item.cost)).sum();
        let discarded_cost: u64 = discarded.iter().map(|item| u64::from(item.cost)).sum();
        let refund: u64 = discarded
            .iter()
            .map(|item| u64::from(item.sale_refund()))
            .sum();
        let gross_cost = total_cost + discarded_cost;

        let mut components = Vec::new();
        for item in retained() {
            components.extend(repo.flatten(&item.name).iter().cloned());
        }
        let mut component_counts = BTreeMap::new();
        for part in &components {
            *component_counts.entry(part.clone()).or_insert(0) += 1;
        }

        let stat_value = value_model.map_or(0.0, |model| {
            active.iter().map(|item| model.value_of(item)).sum()
        });
        let net_cost = gross_cost.saturating_sub(refund);
        #[allow(clippy::cast_precision_loss)]
        let efficiency = if net_cost == 0 {
            0.0
        } else {
            stat_value / net_cost as f64
        };

        Self {
            items,
            active,
            reserve,
            discarded,
            total_cost,
            gross_cost,
            refund,
            components,
            component_counts,
            stat_value,
            efficiency,
        }
    }

    /// All items, input order.
    #[inline]
    #[must_use]
    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }

    /// Items in active slots.
    #[inline]
    #[must_use]
    pub fn active(&self) -> &[Arc<Item>] {
        &self.active
    }

    /// Items in reserve slots.
    #[inline]
    #[must_use]
    pub fn reserve(&self) -> &[Arc<Item>] {
        &self.reserve
    }

    /// Items sold off for lack of space.
    #[inline]
    #[must_use]
    pub fn discarded(&self) -> &[Arc<Item>] {
        &self.discarded
    }

    /// Cost of retained items (active + reserve).
    #[inline]
    #[must_use]
    pub const fn total_cost(&self) -> u64 {
        self.total_cost
    }

    /// Cost of every item, discarded included.
    #[inline]
    #[must_use]
    pub const fn gross_cost(&self) -> u64 {
        self.gross_cost
    }

    /// Gold refunded for discarded items.
    #[inline]
    #[must_use]
    pub const fn refund(&self) -> u64 {
        self.refund
    }

    /// Gross cost minus refunds.
    #[inline]
    #[must_use]
    pub const fn net_cost(&self) -> u64 {
        self.gross_cost.saturating_sub(self.refund)
    }

    /// Flattened base parts of retained items (multiset).
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Per-part counts of [`Self::components`].
    #[inline]
    #[must_use]
    pub const fn component_counts(&self) -> &BTreeMap<String, u32> {
        &self.component_counts
    }

    /// Number of base parts held (duplicates counted).
    #[inline]
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.components.len()
    }

    /// Gold value of the active items' stats.
    #[inline]
    #[must_use]
    pub const fn stat_value(&self) -> f64 {
        self.stat_value
    }

    /// Stat value per gold of net investment.
    #[inline]
    #[must_use]
    pub const fn efficiency(&self) -> f64 {
        self.efficiency
    }

    /// Number of input items.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the loadout holds no items.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// How many input items carry the given name.
    #[must_use]
    pub fn count_item(&self, name: &str) -> usize {
        self.items.iter().filter(|item| item.name == name).count()
    }

    /// Whether any input item carries the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|item| item.name == name)
    }

    /// Input item names, input order.
    #[must_use]
    pub fn item_names(&self) -> Vec<String> {
        self.items.iter().map(|item| item.name.clone()).collect()
    }
}

/// Builds a loadout with default slot limits when none are given.
#[must_use]
pub fn create_loadout(
    items: &[Arc<Item>],
    repo: &ItemRepository,
    value_model: Option<&StatValueModel>,
    slots: Option<SlotLimits>,
) -> Loadout {
    Loadout::build(items.to_vec(), repo, value_model, slots.unwrap_or_default())
}

//! # Component Flow
//!
//! Accounting of base parts between two loadouts.
//!
//! ```text
//!   from parts: [str, agi]          to parts: [str, int]
//!                  │    │                        │    │
//!                  │    └── wasted ──X           │    └── acquired (bought)
//!                  └──────── reused ─────────────┘
//! ```
//!
//! For each distinct part, `min(count_from, count_to)` copies are reused, the
//! rest of `from` is wasted and the rest of `to` is acquired. Recipe
//! surcharges of every `from` item are recovered in full on teardown.

use std::collections::BTreeSet;
use std::sync::Arc;

use recraft_catalog::ItemRepository;

use crate::loadout::Loadout;

/// Reused / wasted / acquired parts between two loadouts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComponentFlow {
    /// Parts present on both sides.
    pub reused: Vec<String>,
    /// Parts of `from` with no use in `to`.
    pub wasted: Vec<String>,
    /// Parts of `to` that must be bought.
    pub acquired: Vec<String>,
    /// Gold value of `reused`.
    pub reused_gold: u64,
    /// Gold value of `wasted`.
    pub wasted_gold: u64,
    /// Gold value of `acquired`.
    pub acquired_gold: u64,
    /// Recipe surcharges recovered by tearing down `from`.
    pub recovered_recipe_cost: u64,
    /// Recipe surcharges paid to assemble `to`.
    pub target_recipe_cost: u64,
    /// `target - recovered`; negative means a net refund.
    pub net_recipe_cost: i64,
    /// `acquired_gold + net_recipe_cost`.
    pub total_gold_needed: i64,
}

impl ComponentFlow {
    /// Gold recovered from `from`: reused parts plus recovered surcharges.
    #[inline]
    #[must_use]
    pub const fn recovered_gold(&self) -> u64 {
        self.reused_gold + self.recovered_recipe_cost
    }
}

/// Saturating `u64 -> i64`.
#[inline]
pub(crate) fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn push_copies(bucket: &mut Vec<String>, part: &str, count: u32) {
    bucket.extend(std::iter::repeat(part).take(count as usize).map(str::to_string));
}

/// Analyzes the part flow from one loadout to another.
///
/// Pure and total. Unresolved part names are valued at zero gold.
#[must_use]
pub fn analyze_component_flow(from: &Loadout, to: &Loadout, repo: &ItemRepository) -> ComponentFlow {
    let from_counts = from.component_counts();
    let to_counts = to.component_counts();

    let mut flow = ComponentFlow::default();

    let parts: BTreeSet<&String> = from_counts.keys().chain(to_counts.keys()).collect();
    for part in parts {
        let have = from_counts.get(part).copied().unwrap_or(0);
        let need = to_counts.get(part).copied().unwrap_or(0);
        let reused = have.min(need);
        let gold = u64::from(repo.cost_of(part));

        push_copies(&mut flow.reused, part, reused);
        push_copies(&mut flow.wasted, part, have - reused);
        push_copies(&mut flow.acquired, part, need - reused);
        flow.reused_gold += gold * u64::from(reused);
        flow.wasted_gold += gold * u64::from(have - reused);
        flow.acquired_gold += gold * u64::from(need - reused);
    }

    flow.recovered_recipe_cost = from
        .items()
        .iter()
        .map(|item| u64::from(repo.recipe_cost(&item.name)))
        .sum();
    flow.target_recipe_cost = to
        .items()
        .iter()
        .map(|item| u64::from(repo.recipe_cost(&item.name)))
        .sum();
    flow.net_recipe_cost = signed(flow.target_recipe_cost) - signed(flow.recovered_recipe_cost);
    flow.total_gold_needed = signed(flow.acquired_gold).saturating_add(flow.net_recipe_cost);

    flow
}

/// A before/after pair of loadouts.
#[derive(Clone, Debug)]
pub struct LoadoutTransition {
    /// Starting loadout.
    pub from: Arc<Loadout>,
    /// Ending loadout.
    pub to: Arc<Loadout>,
    /// `to.total_cost - from.total_cost`.
    pub cost_delta: i64,
    /// Part accounting between the two.
    pub flow: ComponentFlow,
}

impl LoadoutTransition {
    /// Builds a transition, analyzing its component flow.
    #[must_use]
    pub fn new(from: Arc<Loadout>, to: Arc<Loadout>, repo: &ItemRepository) -> Self {
        let flow = analyze_component_flow(&from, &to, repo);
        let cost_delta = signed(to.total_cost()) - signed(from.total_cost());
        Self {
            from,
            to,
            cost_delta,
            flow,
        }
    }
}

/// A transition with its score.
#[derive(Clone, Debug)]
pub struct ScoredTransition {
    /// The scored transition.
    pub transition: LoadoutTransition,
    /// Higher is better.
    pub score: f64,
}

impl ScoredTransition {
    /// Attaches a score to a transition.
    #[must_use]
    pub const fn new(transition: LoadoutTransition, score: f64) -> Self {
        Self { transition, score }
    }

    /// Starting loadout.
    #[inline]
    #[must_use]
    pub fn from(&self) -> &Loadout {
        &self.transition.from
    }

    /// Ending loadout.
    #[inline]
    #[must_use]
    pub fn to(&self) -> &Loadout {
        &self.transition.to
    }

    /// Cost delta of the transition.
    #[inline]
    #[must_use]
    pub const fn cost_delta(&self) -> i64 {
        self.transition.cost_delta
    }

    /// Part accounting of the transition.
    #[inline]
    #[must_use]
    pub const fn flow(&self) -> &ComponentFlow {
        &self.transition.flow
    }
}

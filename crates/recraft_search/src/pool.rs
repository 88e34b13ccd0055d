//! # Component Pool
//!
//! Parts available after tearing down a loadout, and plans for spending them.
//!
//! A pool holds the flattened parts of a loadout's retained items plus any
//! leftover parts carried over from an earlier plan, together with the
//! recipe surcharges that teardown refunds. [`ComponentPool::plan`] assigns
//! pool parts to target items greedily in target order:
//!
//! ```text
//!   pool: {str: 2, agi: 1}      targets: [scepter(str, int)]
//!   consumed  = [str]
//!   purchased = [int]
//!   leftovers = {str: 1, agi: 1}   (still held, not wasted)
//! ```
//!
//! Every pool part ends up either consumed or leftover.

use std::collections::BTreeMap;
use std::sync::Arc;

use recraft_catalog::{Item, ItemRepository};

use crate::flow::signed;
use crate::loadout::Loadout;

/// Parts and refundable gold obtainable from a teardown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentPool {
    /// Part name -> count.
    parts: BTreeMap<String, u32>,
    /// Recipe surcharges refunded by the teardown.
    recoverable_gold: u64,
}

/// Parts one target item takes from the pool and from the shop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetAssembly {
    /// Target item name.
    pub item: String,
    /// Parts taken from the pool.
    pub consumed: Vec<String>,
    /// Parts that must be bought.
    pub purchased: Vec<String>,
}

/// How a set of target items is assembled from a pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyPlan {
    /// Per-target breakdown, target order.
    pub assemblies: Vec<TargetAssembly>,
    /// Pool parts not used by any target (still held).
    pub leftovers: BTreeMap<String, u32>,
    /// Gold value of all purchased parts.
    pub purchase_cost: u64,
    /// Recipe surcharges of the targets.
    pub target_recipe_cost: u64,
    /// Surcharges refunded by the teardown.
    pub recovered_gold: u64,
    /// `purchase_cost + target_recipe_cost - recovered_gold`.
    pub gold_needed: i64,
}

impl AssemblyPlan {
    /// All consumed parts, target order.
    #[must_use]
    pub fn consumed(&self) -> Vec<&str> {
        self.assemblies
            .iter()
            .flat_map(|a| a.consumed.iter().map(String::as_str))
            .collect()
    }

    /// All purchased parts, target order.
    #[must_use]
    pub fn purchased(&self) -> Vec<&str> {
        self.assemblies
            .iter()
            .flat_map(|a| a.purchased.iter().map(String::as_str))
            .collect()
    }

    /// Leftovers as a flat list, for seeding the next pool.
    #[must_use]
    pub fn leftover_parts(&self) -> Vec<String> {
        self.leftovers
            .iter()
            .flat_map(|(part, &count)| std::iter::repeat(part.clone()).take(count as usize))
            .collect()
    }
}

impl ComponentPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool from tearing down `loadout`, plus previously tracked leftovers.
    #[must_use]
    pub fn from_loadout(loadout: &Loadout, repo: &ItemRepository, leftovers: &[String]) -> Self {
        let mut pool = Self::new();
        for (part, &count) in loadout.component_counts() {
            *pool.parts.entry(part.clone()).or_insert(0) += count;
        }
        for part in leftovers {
            pool.add_part(part);
        }
        pool.recoverable_gold = loadout
            .items()
            .iter()
            .map(|item| u64::from(repo.recipe_cost(&item.name)))
            .sum();
        pool
    }

    /// Adds one part to the pool.
    pub fn add_part(&mut self, part: &str) {
        *self.parts.entry(part.to_string()).or_insert(0) += 1;
    }

    /// Part name -> count.
    #[inline]
    #[must_use]
    pub const fn parts(&self) -> &BTreeMap<String, u32> {
        &self.parts
    }

    /// Total part count (duplicates counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.values().map(|&c| c as usize).sum()
    }

    /// Whether the pool holds no parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.values().all(|&c| c == 0)
    }

    /// Recipe surcharges refunded by the teardown.
    #[inline]
    #[must_use]
    pub const fn recoverable_gold(&self) -> u64 {
        self.recoverable_gold
    }

    /// Gold value of the pool's parts.
    #[must_use]
    pub fn part_gold(&self, repo: &ItemRepository) -> u64 {
        self.parts
            .iter()
            .map(|(part, &count)| u64::from(repo.cost_of(part)) * u64::from(count))
            .sum()
    }

    /// Plans assembling `targets` from this pool.
    ///
    /// Parts are assigned greedily in target order. The pool is not mutated.
    #[must_use]
    pub fn plan(&self, targets: &[Arc<Item>], repo: &ItemRepository) -> AssemblyPlan {
        let mut remaining = self.parts.clone();
        let mut assemblies = Vec::with_capacity(targets.len());
        let mut purchase_cost = 0u64;
        let mut target_recipe_cost = 0u64;

        for target in targets {
            let mut consumed = Vec::new();
            let mut purchased = Vec::new();
            for part in repo.flatten(&target.name).iter() {
                match remaining.get_mut(part) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        consumed.push(part.clone());
                    }
                    _ => {
                        purchase_cost += u64::from(repo.cost_of(part));
                        purchased.push(part.clone());
                    }
                }
            }
            target_recipe_cost += u64::from(repo.recipe_cost(&target.name));
            assemblies.push(TargetAssembly {
                item: target.name.clone(),
                consumed,
                purchased,
            });
        }

        remaining.retain(|_, count| *count > 0);
        let gold_needed = signed(purchase_cost)
            .saturating_add(signed(target_recipe_cost))
            .saturating_sub(signed(self.recoverable_gold));

        AssemblyPlan {
            assemblies,
            leftovers: remaining,
            purchase_cost,
            target_recipe_cost,
            recovered_gold: self.recoverable_gold,
            gold_needed,
        }
    }
}

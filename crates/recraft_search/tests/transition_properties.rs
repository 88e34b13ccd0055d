//! Integration tests for loadouts, component flow and the result containers.
//!
//! Run with: cargo test --package recraft_search --test transition_properties

use std::collections::BTreeMap;
use std::sync::Arc;

use recraft_catalog::{Item, ItemRepository, SlotLimits, StatValueModel};
use recraft_search::policy::{
    total_recovery_ratio, CostIncrease, ExplainAll, MinTotalRecovery,
};
use recraft_search::{
    analyze_component_flow, cache_key, combinations, create_loadout, BoundedPriorityQueue,
    Constraint, ExplainedConstraint, Loadout, LoadoutCache, LoadoutTransition,
};

const PART_COUNT: usize = 8;
const ASSEMBLED_COUNT: usize = 16;

fn part_name(i: usize) -> String {
    format!("part_{}", i % PART_COUNT)
}

fn part_cost(i: usize) -> u32 {
    50 * (i % PART_COUNT + 1) as u32
}

/// Deterministic catalog: 8 base parts, 16 two- or three-part items with
/// varying surcharges, and one nested item built from other items.
fn create_generated_catalog() -> ItemRepository {
    let mut items = Vec::new();
    for i in 0..PART_COUNT {
        items.push(
            Item::base_part(part_name(i), part_cost(i))
                .with_stat(format!("stat_{}", i % 3), (i + 1) as f64),
        );
    }
    for j in 0..ASSEMBLED_COUNT {
        let mut parts = vec![j, j * 3 + 1];
        if j % 4 == 0 {
            parts.push(j + 5);
        }
        let cost = parts.iter().map(|&p| part_cost(p)).sum::<u32>() + (j % 3) as u32 * 75;
        items.push(Item::assembled(
            format!("item_{j}"),
            cost,
            parts.into_iter().map(part_name),
        ));
    }
    items.push(Item::assembled(
        "relic",
        2000,
        ["item_0".to_string(), "item_1".to_string(), part_name(7)],
    ));
    ItemRepository::new(items).unwrap()
}

fn assembled(repo: &ItemRepository) -> Vec<Arc<Item>> {
    repo.assembled_items().cloned().collect()
}

fn owned(combo: Vec<&Arc<Item>>) -> Vec<Arc<Item>> {
    combo.into_iter().cloned().collect()
}

fn sorted_names(items: &[Arc<Item>]) -> Vec<String> {
    let mut names: Vec<String> = items.iter().map(|item| item.name.clone()).collect();
    names.sort();
    names
}

fn counts(parts: &[String]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for part in parts {
        *counts.entry(part.as_str()).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// Worked scenario
// ============================================================================

#[test]
fn test_bracer_to_scepter_scenario() {
    let repo = ItemRepository::new(vec![
        Item::base_part("strength_component", 100).with_stat("strength", 3.0),
        Item::base_part("agility_component", 100).with_stat("agility", 3.0),
        Item::base_part("intelligence_component", 100).with_stat("intelligence", 3.0),
        Item::assembled("bracer", 200, ["strength_component", "agility_component"]),
        Item::assembled("scepter", 400, ["strength_component", "intelligence_component"]),
    ])
    .unwrap();

    let bracer = Arc::clone(repo.get("bracer").unwrap());
    let scepter = Arc::clone(repo.get("scepter").unwrap());
    let from = Arc::new(create_loadout(&[bracer], &repo, None, None));
    let to = Arc::new(create_loadout(&[scepter], &repo, None, None));

    let transition = LoadoutTransition::new(from, to, &repo);
    let flow = &transition.flow;

    assert_eq!(flow.reused, vec!["strength_component"]);
    assert_eq!(flow.wasted, vec!["agility_component"]);
    assert_eq!(flow.acquired, vec!["intelligence_component"]);
    assert_eq!(flow.reused_gold, 100);
    assert_eq!(flow.wasted_gold, 100);
    assert_eq!(flow.acquired_gold, 100);
    assert_eq!(flow.recovered_recipe_cost, 0);
    assert_eq!(flow.target_recipe_cost, 200);
    assert_eq!(flow.net_recipe_cost, 200);
    assert_eq!(flow.total_gold_needed, 300);
    assert_eq!(transition.cost_delta, 200);

    assert!(CostIncrease.evaluate(&transition));
    assert!(!MinTotalRecovery(0.8).evaluate(&transition));
    assert_eq!(total_recovery_ratio(&transition), Some(0.5));

    let failures = ExplainAll::new()
        .with(CostIncrease)
        .with(MinTotalRecovery(0.8))
        .failures(&transition);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("50.0%"));
    assert!(MinTotalRecovery(0.8).explain(&transition).is_some());
}

// ============================================================================
// Loadout properties
// ============================================================================

#[test]
fn test_multiset_conservation() {
    let repo = create_generated_catalog();
    let pool = assembled(&repo);
    let loadouts: Vec<Loadout> = combinations(&pool, 2)
        .take(40)
        .map(|combo| create_loadout(&owned(combo), &repo, None, None))
        .collect();

    for from in &loadouts {
        for to in &loadouts {
            let flow = analyze_component_flow(from, to, &repo);
            assert_eq!(flow.reused.len() + flow.wasted.len(), from.part_count());
            assert_eq!(flow.reused.len() + flow.acquired.len(), to.part_count());

            let mut before = flow.reused.clone();
            before.extend(flow.wasted.iter().cloned());
            assert_eq!(counts(&before), counts(from.components()));

            let mut after = flow.reused.clone();
            after.extend(flow.acquired.iter().cloned());
            assert_eq!(counts(&after), counts(to.components()));
        }
    }
}

#[test]
fn test_partition_completeness() {
    let repo = create_generated_catalog();
    let mut pool = assembled(&repo);
    // Base parts and duplicates exercise every slot class
    pool.push(Arc::clone(repo.get("part_3").unwrap()));
    pool.push(Arc::clone(repo.get("item_2").unwrap()));
    let model = StatValueModel::new().with_rate("stat_0", 10.0);

    for combo in combinations(&pool, 4).step_by(97) {
        let items = owned(combo);
        let loadout = create_loadout(&items, &repo, Some(&model), Some(SlotLimits::new(2, 1)));
        assert_eq!(loadout.active().len(), 2);
        assert_eq!(loadout.reserve().len(), 1);
        assert_eq!(loadout.discarded().len(), 1);

        let mut rejoined = loadout.active().to_vec();
        rejoined.extend(loadout.reserve().iter().cloned());
        rejoined.extend(loadout.discarded().iter().cloned());
        assert_eq!(sorted_names(&rejoined), sorted_names(&items));
    }
}

#[test]
fn test_flattening_reaches_nested_parts() {
    let repo = create_generated_catalog();
    let relic = Arc::clone(repo.get("relic").unwrap());
    let loadout = create_loadout(&[relic], &repo, None, None);

    // item_0: parts 0, 1, 5; item_1: parts 1, 4; plus part 7
    assert_eq!(loadout.part_count(), 6);
    assert_eq!(loadout.component_counts().get("part_1"), Some(&2));
    assert!(repo.recipe_cost("relic") > 0);
}

// ============================================================================
// Cache key and cache identity
// ============================================================================

#[test]
fn test_key_canonicalization() {
    let repo = create_generated_catalog();
    let pool = assembled(&repo);

    for combo in combinations(&pool, 3).step_by(31) {
        let items = owned(combo);
        let mut reversed = items.clone();
        reversed.reverse();
        let mut rotated = items.clone();
        rotated.rotate_left(1);
        assert_eq!(cache_key(&items), cache_key(&reversed));
        assert_eq!(cache_key(&items), cache_key(&rotated));
    }

    assert_eq!(cache_key(&[]), "");
    assert_eq!(cache_key(&pool[..1]), pool[0].name);
}

#[test]
fn test_cache_identity_and_capacity() {
    let repo = create_generated_catalog();
    let pool = assembled(&repo);
    let slots = SlotLimits::default();

    let mut cache = LoadoutCache::new(1000);
    for combo in combinations(&pool, 3).step_by(17) {
        let items = owned(combo);
        let mut shuffled = items.clone();
        shuffled.swap(0, 2);
        let first = cache.get_or_create(&items, &repo, None, slots);
        let second = cache.get_or_create(&shuffled, &repo, None, slots);
        assert!(Arc::ptr_eq(&first, &second));
    }

    let mut small = LoadoutCache::new(5);
    for combo in combinations(&pool, 2).take(40) {
        small.get_or_create(&owned(combo), &repo, None, slots);
        assert!(small.len() <= 5);
    }
    assert!(small.evictions() > 0);
}

// ============================================================================
// Bounded queue
// ============================================================================

#[test]
fn test_bounded_queue_invariants() {
    let mut queue = BoundedPriorityQueue::new(10, |a: &u64, b: &u64| b.cmp(a));

    // Deterministic scramble of 0..200
    let values: Vec<u64> = (0..200u64).map(|i| (i * 7919) % 200).collect();
    for value in values {
        let worst_before = queue.worst().copied();
        let was_full = queue.is_full();
        let accepted = queue.add(value);

        if was_full {
            let worst = worst_before.unwrap();
            assert_eq!(accepted, value > worst);
        } else {
            assert!(accepted);
        }
        assert!(queue.len() <= queue.max_size());
        assert!(queue.as_slice().windows(2).all(|w| w[0] >= w[1]));
    }

    assert_eq!(queue.into_vec(), (190..200u64).rev().collect::<Vec<_>>());
}

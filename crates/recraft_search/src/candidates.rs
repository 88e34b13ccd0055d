//! # Candidate Pools
//!
//! Catalog filters that decide which items may appear in early and final
//! loadouts. Both pools are lists of catalog indices in catalog order, so
//! they can cross the worker boundary as plain numbers.

use std::sync::Arc;

use recraft_catalog::{AnalysisConfig, Item, ItemRepository};

/// Early candidates: assembled, non-consumable items within the early-game
/// cost ceiling whose base parts are used by at least one other assembled
/// item.
#[must_use]
pub fn early_candidates(repo: &ItemRepository, config: &AnalysisConfig) -> Vec<usize> {
    repo.items()
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            item.is_assembled()
                && !item.is_consumable()
                && item.cost <= config.early_game_cost_ceiling
        })
        .filter(|(idx, item)| has_reuse_elsewhere(repo, *idx, item))
        .map(|(idx, _)| idx)
        .collect()
}

/// Whether any part of `item` also goes into a different assembled item.
fn has_reuse_elsewhere(repo: &ItemRepository, idx: usize, item: &Item) -> bool {
    repo.flatten(&item.name)
        .iter()
        .any(|part| repo.user_indices(part).iter().any(|&user| user != idx))
}

/// Final candidates: assembled, non-consumable items, optionally capped in
/// cost.
#[must_use]
pub fn final_candidates(repo: &ItemRepository, max_cost: Option<u32>) -> Vec<usize> {
    repo.items()
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            item.is_assembled()
                && !item.is_consumable()
                && max_cost.map_or(true, |ceiling| item.cost <= ceiling)
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Resolves catalog indices to items. Out-of-range indices are skipped.
#[must_use]
pub fn resolve(repo: &ItemRepository, indices: &[usize]) -> Vec<Arc<Item>> {
    indices
        .iter()
        .filter_map(|&idx| repo.item_at(idx).cloned())
        .collect()
}

/// Item-level combination filter: at most one stacking-exempt item.
#[must_use]
pub fn passes_item_filter<'a>(
    items: impl IntoIterator<Item = &'a Item>,
    config: &AnalysisConfig,
) -> bool {
    items
        .into_iter()
        .filter(|item| config.is_stacking_exempt(&item.name))
        .count()
        <= 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use recraft_catalog::ItemFlags;

    fn create_test_repo() -> ItemRepository {
        ItemRepository::new(vec![
            Item::base_part("strength_component", 100),
            Item::base_part("agility_component", 100),
            Item::base_part("lonely_component", 100),
            Item::assembled("bracer", 200, ["strength_component", "agility_component"]),
            Item::assembled("scepter", 4000, ["strength_component", "agility_component"]),
            Item::assembled("hermit", 300, ["lonely_component"]),
            Item::assembled("potion", 50, ["agility_component"]).with_flags(ItemFlags::CONSUMABLE),
            Item::assembled("boots", 400, ["agility_component"]),
        ])
        .unwrap()
    }

    fn names(repo: &ItemRepository, indices: &[usize]) -> Vec<String> {
        resolve(repo, indices)
            .iter()
            .map(|item| item.name.clone())
            .collect()
    }

    #[test]
    fn test_early_candidates() {
        let repo = create_test_repo();
        let early = early_candidates(&repo, &AnalysisConfig::default());
        // scepter exceeds the ceiling, hermit's part has no other user,
        // potion is consumable
        assert_eq!(names(&repo, &early), vec!["bracer", "boots"]);
    }

    #[test]
    fn test_final_candidates() {
        let repo = create_test_repo();
        let all = final_candidates(&repo, None);
        assert_eq!(names(&repo, &all), vec!["bracer", "scepter", "hermit", "boots"]);
        let capped = final_candidates(&repo, Some(350));
        assert_eq!(names(&repo, &capped), vec!["bracer", "hermit"]);
    }

    #[test]
    fn test_item_filter() {
        let repo = create_test_repo();
        let config = AnalysisConfig {
            stacking_exempt: vec!["boots".into(), "bracer".into()],
            ..AnalysisConfig::default()
        };
        let one = resolve(&repo, &[3, 5]);
        let two = resolve(&repo, &[3, 7]);
        assert!(passes_item_filter(one.iter().map(|item| &**item), &config));
        assert!(!passes_item_filter(two.iter().map(|item| &**item), &config));
    }
}

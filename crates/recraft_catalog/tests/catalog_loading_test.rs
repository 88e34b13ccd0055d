//! Integration test for catalog and configuration loading.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use recraft_catalog::{AnalysisConfig, CatalogError, ItemRepository, StatValueModel};

const CATALOG: &str = r#"
[[items]]
name = "strength_component"
display_name = "Belt of Strength"
cost = 100
stats = { strength = 3.0 }

[[items]]
name = "agility_component"
display_name = "Band of Agility"
cost = 100
stats = { agility = 3.0 }

[[items]]
name = "intelligence_component"
cost = 100
stats = { intelligence = 3.0 }

[[items]]
name = "bracer"
display_name = "Bracer"
cost = 200
components = ["strength_component", "agility_component"]

[[items]]
name = "scepter"
display_name = "Scepter of Power"
cost = 400
components = ["strength_component", "intelligence_component"]

[[items]]
name = "greater_scepter"
cost = 900
components = ["scepter", "bracer"]

[[items]]
name = "tonic"
cost = 50
consumable = true
components = ["agility_component"]
"#;

fn temp_path(name: &str) -> std::path::PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("recraft_{name}_{id}.toml"))
}

#[test]
fn test_catalog_from_file() {
    let path = temp_path("catalog");
    std::fs::write(&path, CATALOG).unwrap();

    let repo = ItemRepository::load(&path).unwrap();
    assert_eq!(repo.len(), 7);
    assert_eq!(repo.assembled_items().count(), 4);
    assert_eq!(repo.get("Scepter of Power").unwrap().name, "scepter");
    assert_eq!(repo.get("scepter of power").unwrap().name, "scepter");
    assert!(repo.get("tonic").unwrap().is_consumable());

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_nested_surcharge() {
    let repo = ItemRepository::from_toml_str(CATALOG).unwrap();

    // 900 - (4 parts x 100)
    assert_eq!(repo.flatten("greater_scepter").len(), 4);
    assert_eq!(repo.recipe_cost("greater_scepter"), 500);
    assert_eq!(repo.recipe_cost("scepter"), 200);
    assert_eq!(repo.recipe_cost("bracer"), 0);
    assert_eq!(repo.recipe_cost("strength_component"), 0);
    assert_eq!(repo.recipe_cost("no_such_item"), 0);
    assert_eq!(repo.cost_of("no_such_item"), 0);
}

#[test]
fn test_component_users() {
    let repo = ItemRepository::from_toml_str(CATALOG).unwrap();

    let users: Vec<String> = repo
        .items_using_component("strength_component", &HashSet::new())
        .iter()
        .map(|item| item.name.clone())
        .collect();
    assert_eq!(users, vec!["bracer", "scepter", "greater_scepter"]);

    let exclude: HashSet<String> = ["scepter".to_string()].into_iter().collect();
    let users = repo.items_using_component("intelligence_component", &exclude);
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "greater_scepter");
}

#[test]
fn test_cycle_in_file_rejected() {
    let result = ItemRepository::from_toml_str(
        r#"
        [[items]]
        name = "ouroboros"
        cost = 10
        components = ["tail"]

        [[items]]
        name = "tail"
        cost = 10
        components = ["ouroboros"]
        "#,
    );
    assert!(matches!(result, Err(CatalogError::CycleDetected(_))));
}

#[test]
fn test_missing_file() {
    let err = ItemRepository::load("/definitely/not/a/catalog.toml").unwrap_err();
    assert!(matches!(err, CatalogError::Io { .. }));
}

#[test]
fn test_config_and_value_model_from_files() {
    let config_path = temp_path("analysis");
    std::fs::write(
        &config_path,
        "min_gold_recovery = 0.6\nearly_game_cost_ceiling = 1800\nkey_items = [\"scepter\"]\n",
    )
    .unwrap();
    let config = AnalysisConfig::load(&config_path).unwrap();
    assert!((config.min_gold_recovery - 0.6).abs() < f64::EPSILON);
    assert_eq!(config.early_game_cost_ceiling, 1800);
    assert_eq!(config.key_items, vec!["scepter"]);
    assert!(config.stacking_exempt.is_empty());
    std::fs::remove_file(&config_path).ok();

    let repo = ItemRepository::from_toml_str(CATALOG).unwrap();
    let model = StatValueModel::from_toml_str("strength = 50.0\nintelligence = 35.0").unwrap();
    let belt = repo.get("strength_component").unwrap();
    assert!((model.value_of(belt) - 150.0).abs() < 1e-9);
}

#[test]
fn test_shared_across_threads() {
    let repo = Arc::new(ItemRepository::from_toml_str(CATALOG).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                (0..100)
                    .map(|_| repo.flatten("greater_scepter").len() + repo.recipe_cost("scepter") as usize)
                    .sum::<usize>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 100 * (4 + 200));
    }
}

//! # Item Repository
//!
//! **Read-only query surface over the item catalog.**
//!
//! The repository is built once from a list of items and is immutable for
//! the duration of a search. It answers:
//!
//! 1. Lookup by internal name or display name
//! 2. Flattening of an item into its base parts (memoized)
//! 3. Recipe surcharge: cost not covered by the flattened parts (memoized)
//! 4. Reverse lookup: which assembled items use a given base part
//!
//! ## Composition Graph
//!
//! ```text
//!   strength_component ──┐
//!                        ├──> bracer ──┐
//!   agility_component ───┘             ├──> greater_bracer
//!   intelligence_component ────────────┘
//! ```
//!
//! The graph is validated to be acyclic at construction. Names that do not
//! resolve are treated as zero-cost leaf parts rather than errors.

use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::error::{read_file, CatalogError, CatalogResult};
use crate::item::{Item, NAME_SEPARATOR};

/// Catalog document layout: a list of `[[items]]` tables.
#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    items: Vec<Item>,
}

/// The item repository.
#[derive(Debug)]
pub struct ItemRepository {
    /// All items in catalog order.
    items: Vec<Arc<Item>>,
    /// Internal name -> index.
    by_name: HashMap<String, usize>,
    /// Lowercased display name -> index.
    by_display: HashMap<String, usize>,
    /// Indices of assembled items, catalog order.
    assembled: Vec<usize>,
    /// Base part name -> indices of assembled items whose flattened parts contain it.
    users: HashMap<String, Vec<usize>>,
    /// Memoized flattening.
    flattened: RwLock<HashMap<String, Arc<[String]>>>,
    /// Memoized recipe surcharge.
    recipe_costs: RwLock<HashMap<String, u32>>,
}

impl ItemRepository {
    /// Builds a repository from catalog items.
    ///
    /// # Errors
    ///
    /// - `DuplicateItem` if two items share an internal name
    /// - `InvalidName` if a name or component reference is empty or contains
    ///   [`NAME_SEPARATOR`]
    /// - `CycleDetected` if an item (transitively) builds into itself
    pub fn new(items: impl IntoIterator<Item = Item>) -> CatalogResult<Self> {
        let items: Vec<Arc<Item>> = items.into_iter().map(Arc::new).collect();

        let mut by_name = HashMap::with_capacity(items.len());
        let mut by_display = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if let Some(bad) = std::iter::once(&item.name)
                .chain(&item.components)
                .find(|name| !is_valid_name(name))
            {
                return Err(CatalogError::InvalidName(bad.clone()));
            }
            if by_name.insert(item.name.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateItem(item.name.clone()));
            }
            by_display
                .entry(item.display_name.to_lowercase())
                .or_insert(idx);
        }

        let assembled = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_assembled())
            .map(|(idx, _)| idx)
            .collect();

        let mut repo = Self {
            items,
            by_name,
            by_display,
            assembled,
            users: HashMap::new(),
            flattened: RwLock::new(HashMap::new()),
            recipe_costs: RwLock::new(HashMap::new()),
        };

        if let Some(cycle) = repo.find_cycle() {
            return Err(CatalogError::CycleDetected(cycle));
        }

        repo.index_users();
        Ok(repo)
    }

    /// Parses a catalog from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed TOML, plus any error from [`Self::new`].
    pub fn from_toml_str(content: &str) -> CatalogResult<Self> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(file.items)
    }

    /// Loads a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, plus any error from
    /// [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let content = read_file(path.as_ref())?;
        let repo = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded catalog {} ({} items, {} assembled)",
            path.as_ref().display(),
            repo.len(),
            repo.assembled.len()
        );
        Ok(repo)
    }

    /// Builds the part -> users reverse index.
    fn index_users(&mut self) {
        let mut users: HashMap<String, Vec<usize>> = HashMap::new();
        for &idx in &self.assembled {
            let parts = self.flatten(&self.items[idx].name);
            let mut seen = HashSet::new();
            for part in parts.iter() {
                if seen.insert(part.as_str()) {
                    users.entry(part.clone()).or_default().push(idx);
                }
            }
        }
        self.users = users;
    }

    /// Detects a composition cycle, returning the offending path.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        for idx in 0..self.items.len() {
            if !visited.contains(&idx) {
                if let Some(cycle) = self.dfs_find_cycle(idx, &mut visited, &mut on_stack, &mut path)
                {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// DFS helper for cycle detection.
    fn dfs_find_cycle(
        &self,
        idx: usize,
        visited: &mut HashSet<usize>,
        on_stack: &mut HashSet<usize>,
        path: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        visited.insert(idx);
        on_stack.insert(idx);
        path.push(idx);

        for child_name in &self.items[idx].components {
            // Unresolved children are leaves and cannot close a cycle
            let Some(&child) = self.by_name.get(child_name) else {
                continue;
            };

            if !visited.contains(&child) {
                if let Some(cycle) = self.dfs_find_cycle(child, visited, on_stack, path) {
                    return Some(cycle);
                }
            } else if on_stack.contains(&child) {
                let start = path.iter().position(|&i| i == child).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..]
                    .iter()
                    .map(|&i| self.items[i].name.clone())
                    .collect();
                cycle.push(self.items[child].name.clone());
                return Some(cycle);
            }
        }

        path.pop();
        on_stack.remove(&idx);
        None
    }

    /// Number of items in the catalog.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalog is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All items in catalog order.
    #[inline]
    #[must_use]
    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }

    /// Item at a catalog index.
    #[inline]
    #[must_use]
    pub fn item_at(&self, idx: usize) -> Option<&Arc<Item>> {
        self.items.get(idx)
    }

    /// Catalog index of an internal name.
    #[inline]
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Resolves an item by internal name, falling back to display name
    /// (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Item>> {
        self.by_name
            .get(name)
            .or_else(|| self.by_display.get(&name.to_lowercase()))
            .map(|&idx| &self.items[idx])
    }

    /// All assembled items (at least one component), catalog order.
    pub fn assembled_items(&self) -> impl Iterator<Item = &Arc<Item>> + '_ {
        self.assembled.iter().map(|&idx| &self.items[idx])
    }

    /// Recursively flattens an item into its base parts.
    ///
    /// Base parts and unresolved names flatten to themselves.
    #[must_use]
    pub fn flatten(&self, name: &str) -> Arc<[String]> {
        if let Some(parts) = self.flattened.read().get(name) {
            return Arc::clone(parts);
        }

        let parts: Arc<[String]> = match self.by_name.get(name) {
            Some(&idx) if self.items[idx].is_assembled() => {
                let mut parts = Vec::new();
                for child in &self.items[idx].components {
                    parts.extend(self.flatten(child).iter().cloned());
                }
                parts.into()
            }
            Some(_) => Arc::from(vec![name.to_string()]),
            None => {
                tracing::warn!("Unresolved item reference: {}", name);
                Arc::from(vec![name.to_string()])
            }
        };

        self.flattened
            .write()
            .insert(name.to_string(), Arc::clone(&parts));
        parts
    }

    /// Cost of a single item, zero when unresolved.
    #[inline]
    #[must_use]
    pub fn cost_of(&self, name: &str) -> u32 {
        self.by_name
            .get(name)
            .map_or(0, |&idx| self.items[idx].cost)
    }

    /// Sums the gold value of a list of part names.
    #[must_use]
    pub fn component_gold<S: AsRef<str>>(&self, parts: &[S]) -> u64 {
        parts
            .iter()
            .map(|p| u64::from(self.cost_of(p.as_ref())))
            .sum()
    }

    /// Recipe surcharge: item cost minus the cost of its flattened parts,
    /// floored at zero. Base parts and unknown names have no surcharge.
    #[must_use]
    pub fn recipe_cost(&self, name: &str) -> u32 {
        if let Some(&cost) = self.recipe_costs.read().get(name) {
            return cost;
        }

        let cost = match self.by_name.get(name) {
            Some(&idx) if self.items[idx].is_assembled() => {
                let parts_gold = self.component_gold(&self.flatten(name));
                let surcharge = u64::from(self.items[idx].cost).saturating_sub(parts_gold);
                u32::try_from(surcharge).unwrap_or(u32::MAX)
            }
            _ => 0,
        };

        self.recipe_costs.write().insert(name.to_string(), cost);
        cost
    }

    /// Assembled items whose flattened parts include `part`, catalog order.
    ///
    /// Items named in `exclude` are skipped so an item is never reported as
    /// a use for its own parts.
    #[must_use]
    pub fn items_using_component(&self, part: &str, exclude: &HashSet<String>) -> Vec<Arc<Item>> {
        self.users.get(part).map_or_else(Vec::new, |indices| {
            indices
                .iter()
                .map(|&idx| &self.items[idx])
                .filter(|item| !exclude.contains(&item.name))
                .cloned()
                .collect()
        })
    }

    /// Catalog indices of assembled items using `part`.
    #[must_use]
    pub fn user_indices(&self, part: &str) -> &[usize] {
        self.users.get(part).map_or(&[], Vec::as_slice)
    }

    /// Clones the catalog back into plain items (for serialization).
    #[must_use]
    pub fn to_items(&self) -> Vec<Item> {
        self.items.iter().map(|item| Item::clone(item)).collect()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(NAME_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemFlags;

    fn create_test_repo() -> ItemRepository {
        ItemRepository::new(vec![
            Item::base_part("strength_component", 100).with_stat("strength", 3.0),
            Item::base_part("agility_component", 100).with_stat("agility", 3.0),
            Item::base_part("intelligence_component", 100).with_stat("intelligence", 3.0),
            Item::assembled("bracer", 200, ["strength_component", "agility_component"])
                .with_display_name("Bracer of Might"),
            Item::assembled("greater_bracer", 600, ["bracer", "intelligence_component"]),
            Item::assembled("wand", 450, ["intelligence_component", "mystery_part"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup_by_name_and_display() {
        let repo = create_test_repo();
        assert_eq!(repo.get("bracer").unwrap().cost, 200);
        assert_eq!(repo.get("bracer of might").unwrap().name, "bracer");
        assert!(repo.get("nothing").is_none());
        assert_eq!(repo.index_of("greater_bracer"), Some(4));
    }

    #[test]
    fn test_flatten_is_recursive() {
        let repo = create_test_repo();
        let parts = repo.flatten("greater_bracer");
        assert_eq!(
            &parts[..],
            &[
                "strength_component".to_string(),
                "agility_component".to_string(),
                "intelligence_component".to_string()
            ]
        );
        assert_eq!(&repo.flatten("agility_component")[..], &["agility_component".to_string()]);
    }

    #[test]
    fn test_recipe_cost() {
        let repo = create_test_repo();
        assert_eq!(repo.recipe_cost("bracer"), 0);
        assert_eq!(repo.recipe_cost("greater_bracer"), 300);
        assert_eq!(repo.recipe_cost("strength_component"), 0);
        assert_eq!(repo.recipe_cost("nothing"), 0);
        // Unresolved part counts as zero gold
        assert_eq!(repo.recipe_cost("wand"), 350);
    }

    #[test]
    fn test_items_using_component() {
        let repo = create_test_repo();
        let exclude = HashSet::new();
        let users: Vec<String> = repo
            .items_using_component("intelligence_component", &exclude)
            .iter()
            .map(|i| i.name.clone())
            .collect();
        assert_eq!(users, vec!["greater_bracer", "wand"]);

        let exclude: HashSet<String> = ["wand".to_string()].into_iter().collect();
        let users = repo.items_using_component("intelligence_component", &exclude);
        assert_eq!(users.len(), 1);
        assert!(repo.items_using_component("nothing", &exclude).is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = ItemRepository::new(vec![
            Item::base_part("a", 1),
            Item::base_part("a", 2),
        ]);
        assert_eq!(result.unwrap_err(), CatalogError::DuplicateItem("a".into()));
    }

    #[test]
    fn test_separator_in_name_rejected() {
        let result = ItemRepository::new(vec![Item::base_part("a,b", 1)]);
        assert_eq!(result.unwrap_err(), CatalogError::InvalidName("a,b".into()));

        let result = ItemRepository::new(vec![
            Item::base_part("a", 1),
            Item::assembled("c", 5, ["a", "b,a"]),
        ]);
        assert_eq!(result.unwrap_err(), CatalogError::InvalidName("b,a".into()));

        let result = ItemRepository::new(vec![Item::base_part("", 1)]);
        assert!(matches!(result, Err(CatalogError::InvalidName(_))));
    }

    #[test]
    fn test_detect_cycle() {
        let result = ItemRepository::new(vec![
            Item::assembled("a", 10, ["b"]),
            Item::assembled("b", 10, ["c"]),
            Item::assembled("c", 10, ["a"]),
        ]);
        match result {
            Err(CatalogError::CycleDetected(path)) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_from_toml() {
        let repo = ItemRepository::from_toml_str(
            r#"
            [[items]]
            name = "blade"
            cost = 100
            stats = { damage = 8.0 }

            [[items]]
            name = "recipe_sword"
            cost = 150
            recipe = true

            [[items]]
            name = "sword"
            cost = 250
            components = ["blade", "recipe_sword"]
            "#,
        )
        .unwrap();
        assert_eq!(repo.len(), 3);
        assert!(repo.get("recipe_sword").unwrap().flags.has(ItemFlags::RECIPE));
        assert_eq!(repo.flatten("sword").len(), 2);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = ItemRepository::from_toml_str("[[items]]\ncost = \"lots\"").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }
}

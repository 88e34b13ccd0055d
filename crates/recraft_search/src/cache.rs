//! # Loadout Cache
//!
//! Memoizes loadouts by their item multiset.
//!
//! The key is the item names sorted and joined with [`NAME_SEPARATOR`],
//! which the catalog rejects inside names, so any permutation of the same
//! items maps to the same cached [`Loadout`] and distinct multisets never
//! share a key. When full, the
//! oldest tenth of entries (by insertion, not by access) is evicted before a
//! new one is stored.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use recraft_catalog::{Item, ItemRepository, SlotLimits, StatValueModel, NAME_SEPARATOR};

use crate::loadout::Loadout;

/// Default number of cached loadouts.
pub const DEFAULT_CACHE_CAPACITY: usize = 50_000;

/// Canonical, order-independent key of an item multiset.
#[must_use]
pub fn cache_key(items: &[Arc<Item>]) -> String {
    let mut names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();
    names.sort_unstable();
    let mut key = String::with_capacity(names.iter().map(|name| name.len() + 1).sum());
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            key.push(NAME_SEPARATOR);
        }
        key.push_str(name);
    }
    key
}

/// Insertion-order bounded loadout cache.
#[derive(Debug)]
pub struct LoadoutCache {
    entries: HashMap<String, Arc<Loadout>>,
    order: VecDeque<String>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Default for LoadoutCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl LoadoutCache {
    /// Creates a cache holding at most `capacity` loadouts (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity.min(4096)),
            order: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Returns the cached loadout for this multiset, building it on a miss.
    ///
    /// Loadouts are built from the items in key order, so the partition does
    /// not depend on the caller's ordering.
    pub fn get_or_create(
        &mut self,
        items: &[Arc<Item>],
        repo: &ItemRepository,
        value_model: Option<&StatValueModel>,
        slots: SlotLimits,
    ) -> Arc<Loadout> {
        let key = cache_key(items);
        if let Some(loadout) = self.entries.get(&key) {
            self.hits += 1;
            return Arc::clone(loadout);
        }
        self.misses += 1;

        let mut ordered = items.to_vec();
        ordered.sort_by(|a, b| a.name.cmp(&b.name));
        let loadout = Arc::new(Loadout::build(ordered, repo, value_model, slots));

        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, Arc::clone(&loadout));
        loadout
    }

    /// Drops the oldest tenth of entries (at least one).
    fn evict_oldest(&mut self) {
        let count = self.capacity.div_ceil(10).max(1);
        for _ in 0..count {
            let Some(key) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&key);
            self.evictions += 1;
        }
        tracing::debug!(
            "Loadout cache evicted {} entries ({} remain)",
            count,
            self.entries.len()
        );
    }

    /// Cached loadout for a key, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<Loadout>> {
        self.entries.get(key)
    }

    /// Number of cached loadouts.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached loadouts.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lookups answered from the cache.
    #[inline]
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that built a new loadout.
    #[inline]
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    /// Entries dropped by eviction.
    #[inline]
    #[must_use]
    pub const fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

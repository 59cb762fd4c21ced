//! Cache: bounded key-value store shared between services

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::Mutex;
use tracing::debug;

use crate::stats::CacheStats;

/// Construction options for a [`Cache`]
///
/// A limit of zero means "no limit".
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Name used in log output
    pub name: Option<String>,
    /// Soft limit on the number of entries
    pub count_limit: Option<usize>,
    /// Soft limit on the summed cost of all entries
    pub total_cost_limit: Option<usize>,
}

impl CacheConfig {
    /// Create a config with no limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the entry count limit
    pub fn with_count_limit(mut self, limit: usize) -> Self {
        self.count_limit = Some(limit);
        self
    }

    /// Set the total cost limit
    pub fn with_total_cost_limit(mut self, limit: usize) -> Self {
        self.total_cost_limit = Some(limit);
        self
    }
}

struct Entry<V> {
    value: V,
    cost: usize,
}

/// Map plus limit bookkeeping, always accessed under the cache mutex
struct Store<K, V> {
    map: HashMap<K, Entry<V>, RandomState>,
    /// Exact sum of entry costs; wide enough that it cannot overflow
    total_cost: u128,
    count_limit: Option<usize>,
    total_cost_limit: Option<usize>,
}

impl<K, V> Store<K, V>
where
    K: Hash + Eq + Clone,
{
    fn over_limit(&self) -> bool {
        let over_count = self.count_limit.is_some_and(|limit| self.map.len() > limit);
        let over_cost = self
            .total_cost_limit
            .is_some_and(|limit| self.total_cost > limit as u128);
        over_count || over_cost
    }

    /// Evict arbitrary entries other than `keep` until both limits hold.
    fn trim(&mut self, keep: Option<&K>) -> u64 {
        let mut evicted = 0;
        while self.over_limit() {
            let victim = self.map.keys().find(|key| Some(*key) != keep).cloned();
            let Some(victim) = victim else {
                break;
            };
            if let Some(entry) = self.map.remove(&victim) {
                self.total_cost -= entry.cost as u128;
                evicted += 1;
            }
        }
        evicted
    }

    fn insert(&mut self, key: K, value: V, cost: usize) -> u64 {
        if let Some(old) = self.map.insert(key.clone(), Entry { value, cost }) {
            self.total_cost -= old.cost as u128;
        }
        self.total_cost += cost as u128;
        self.trim(Some(&key))
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.map.remove(key)?;
        self.total_cost -= entry.cost as u128;
        Some(entry.value)
    }

    fn clear(&mut self) {
        self.map.clear();
        self.total_cost = 0;
    }
}

pub(crate) struct Inner<K, V> {
    name: Option<String>,
    store: Mutex<Store<K, V>>,
    stats: CacheStats,
}

impl<K, V> Inner<K, V>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn remove_all(&self) {
        let removed = {
            let mut store = self.store.lock();
            let removed = store.map.len();
            store.clear();
            removed
        };
        self.stats.record_purge();
        debug!(cache = self.name.as_deref().unwrap_or("unnamed"), removed, "cache cleared");
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Thread-safe bounded cache
///
/// `Cache` is a cheap handle: clones share the same entries, limits and
/// statistics. When a limit is exceeded the cache drops entries of its own
/// choosing; which ones is unspecified.
pub struct Cache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.inner.store.lock();
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("len", &store.map.len())
            .field("total_cost", &store.total_cost)
            .field("count_limit", &store.count_limit)
            .field("total_cost_limit", &store.total_cost_limit)
            .finish()
    }
}

fn normalize(limit: Option<usize>) -> Option<usize> {
    limit.filter(|limit| *limit > 0)
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create an unnamed cache without limits
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a cache from the given config
    pub fn with_config(config: CacheConfig) -> Self {
        let store = Store {
            map: HashMap::with_hasher(RandomState::new()),
            total_cost: 0,
            count_limit: normalize(config.count_limit),
            total_cost_limit: normalize(config.total_cost_limit),
        };

        Self {
            inner: Arc::new(Inner {
                name: config.name,
                store: Mutex::new(store),
                stats: CacheStats::new(),
            }),
        }
    }

    /// Get a copy of the value stored for `key`
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.peek(key);
        match value {
            Some(_) => self.inner.stats.record_hit(),
            None => self.inner.stats.record_miss(),
        }
        value
    }

    /// Get a copy of the value stored for `key` without recording a hit or miss
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner
            .store
            .lock()
            .map
            .get(key)
            .map(|entry| entry.value.clone())
    }

    /// Insert or overwrite `key` with zero cost
    pub fn set(&self, key: K, value: V) {
        self.set_with_cost(key, value, 0);
    }

    /// Insert or overwrite `key`, charging `cost` against the cost limit
    ///
    /// If a limit is exceeded afterwards, other entries are evicted. The
    /// entry just written is never chosen as a victim.
    pub fn set_with_cost(&self, key: K, value: V, cost: usize) {
        let evicted = self.inner.store.lock().insert(key, value, cost);
        self.inner.stats.record_insert();
        if evicted > 0 {
            self.inner.stats.record_evictions(evicted);
        }
    }

    /// Remove `key`, returning its value if present
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.store.lock().remove(key)
    }

    /// Remove every entry
    pub fn remove_all(&self) {
        self.inner.remove_all();
    }

    /// Check whether `key` is stored, without touching statistics
    pub fn contains(&self, key: &K) -> bool {
        self.inner.store.lock().map.contains_key(key)
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.inner.store.lock().map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.store.lock().map.is_empty()
    }

    /// Summed cost of all stored entries
    pub fn total_cost(&self) -> usize {
        usize::try_from(self.inner.store.lock().total_cost).unwrap_or(usize::MAX)
    }

    /// Cache name, if one was configured
    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    /// Current entry count limit
    pub fn count_limit(&self) -> Option<usize> {
        self.inner.store.lock().count_limit
    }

    /// Change the entry count limit, trimming immediately if needed
    pub fn set_count_limit(&self, limit: Option<usize>) {
        let evicted = {
            let mut store = self.inner.store.lock();
            store.count_limit = normalize(limit);
            store.trim(None)
        };
        self.inner.stats.record_evictions(evicted);
    }

    /// Current total cost limit
    pub fn total_cost_limit(&self) -> Option<usize> {
        self.inner.store.lock().total_cost_limit
    }

    /// Change the total cost limit, trimming immediately if needed
    pub fn set_total_cost_limit(&self, limit: Option<usize>) {
        let evicted = {
            let mut store = self.inner.store.lock();
            store.total_cost_limit = normalize(limit);
            store.trim(None)
        };
        self.inner.stats.record_evictions(evicted);
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }

    pub(crate) fn inner(&self) -> &Arc<Inner<K, V>> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic() {
        let cache = Cache::new();

        cache.set(1, "a");
        cache.set(2, "b");

        assert_eq!(cache.get(&1), Some("a"));
        assert_eq!(cache.get(&2), Some("b"));
        assert_eq!(cache.get(&3), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().hits(), 2);
        assert_eq!(cache.stats().misses(), 1);

        assert_eq!(cache.peek(&1), Some("a"));
        assert_eq!(cache.peek(&9), None);
        assert_eq!(cache.stats().hits(), 2);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_cache_overwrite() {
        let cache = Cache::new();

        cache.set(1, "a");
        cache.set(1, "b");

        assert_eq!(cache.get(&1), Some("b"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().inserts(), 2);
    }

    #[test]
    fn test_cache_remove() {
        let cache = Cache::new();

        cache.set(1, "a");
        cache.set(2, "b");

        assert_eq!(cache.remove(&2), Some("b"));
        assert_eq!(cache.remove(&2), None);
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(&2));
    }

    #[test]
    fn test_cache_remove_all() {
        let cache = Cache::new();

        cache.set_with_cost(1, "a", 4);
        cache.set_with_cost(2, "b", 4);
        cache.remove_all();

        assert!(cache.is_empty());
        assert_eq!(cache.total_cost(), 0);
        assert_eq!(cache.stats().purges(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = Cache::new();
        let other = cache.clone();

        other.set("page", 7);

        assert_eq!(cache.get(&"page"), Some(7));
    }

    #[test]
    fn test_count_limit_is_approximate() {
        let cache = Cache::with_config(CacheConfig::new().with_count_limit(5));

        for key in 0..100 {
            cache.set(key, key * 10);
            // The latest insert survives its own eviction pass
            assert_eq!(cache.get(&key), Some(key * 10));
        }

        assert!(cache.len() <= 5);
        assert!(cache.stats().evictions() >= 95);
    }

    #[test]
    fn test_zero_limit_means_unbounded() {
        let cache = Cache::with_config(CacheConfig::new().with_count_limit(0));

        for key in 0..20 {
            cache.set(key, ());
        }

        assert_eq!(cache.count_limit(), None);
        assert_eq!(cache.len(), 20);
    }

    #[test]
    fn test_total_cost_limit() {
        let cache = Cache::with_config(CacheConfig::new().with_total_cost_limit(10));

        cache.set_with_cost(1, "a", 4);
        cache.set_with_cost(2, "b", 4);
        assert_eq!(cache.total_cost(), 8);

        cache.set_with_cost(3, "c", 4);
        assert!(cache.total_cost() <= 10);
        assert!(cache.contains(&3));

        // A single entry above the limit still survives its own insert
        cache.set_with_cost(4, "d", 50);
        assert!(cache.contains(&4));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_cost(), 50);
    }

    #[test]
    fn test_huge_costs_do_not_overflow() {
        let cache = Cache::with_config(CacheConfig::new().with_total_cost_limit(10));

        cache.set_with_cost(1, "big", usize::MAX);
        cache.set_with_cost(2, "small", 1);

        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
        assert_eq!(cache.total_cost(), 1);

        let unbounded = Cache::new();
        unbounded.set_with_cost(1, "a", usize::MAX);
        unbounded.set_with_cost(2, "b", usize::MAX);
        assert_eq!(unbounded.len(), 2);
        // Reported total saturates, the tracked one stays exact
        assert_eq!(unbounded.total_cost(), usize::MAX);

        unbounded.remove(&1);
        assert_eq!(unbounded.total_cost(), usize::MAX);
        unbounded.remove(&2);
        assert_eq!(unbounded.total_cost(), 0);
    }

    #[test]
    fn test_overwrite_adjusts_cost() {
        let cache = Cache::new();

        cache.set_with_cost(1, "a", 10);
        cache.set_with_cost(1, "b", 3);

        assert_eq!(cache.total_cost(), 3);
        assert_eq!(cache.remove(&1), Some("b"));
        assert_eq!(cache.total_cost(), 0);
    }

    #[test]
    fn test_lowering_limit_trims() {
        let cache = Cache::new();
        for key in 0..10 {
            cache.set(key, key);
        }

        cache.set_count_limit(Some(3));

        assert_eq!(cache.count_limit(), Some(3));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions(), 7);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Cache::with_config(
            CacheConfig::new()
                .with_name("concurrent")
                .with_count_limit(64),
        );

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        let key = thread * 1_000 + i;
                        cache.set(key, i);
                        cache.get(&key);
                        if i % 100 == 0 {
                            cache.remove_all();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.name(), Some("concurrent"));
        assert!(cache.len() <= 64);
    }
}

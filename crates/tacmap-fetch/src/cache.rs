//! Bounded in-memory cache with oldest-first eviction and optional TTL.
//!
//! One instance is created per session by whoever owns the data (the archive
//! store, the raster sampler) and shared by reference. The cache itself is not
//! synchronised; owners wrap it in a mutex and never hold the lock across an
//! await point.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};
use tacmap_metrics::metric_defs;

/// Capacity and expiry settings for a [`BoundedCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries. Zero disables caching.
    pub capacity: usize,
    /// Entries older than this are dropped on their next access.
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    /// Create a config without expiry.
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ttl: None,
        }
    }

    /// Set the time-to-live.
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A cached value and when it was inserted.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// Cache key.
    pub key: K,
    /// Cached value.
    pub value: V,
    /// Insertion time; re-inserting a key refreshes it.
    pub inserted_at: Instant,
}

impl<K, V> CacheEntry<K, V> {
    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| now.saturating_duration_since(self.inserted_at) >= ttl)
    }
}

/// Counters describing cache behaviour since creation (or the last clear).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held.
    pub len: usize,
    /// Configured capacity.
    pub capacity: usize,
    /// Lookups that returned a live entry.
    pub hits: u64,
    /// Lookups that found nothing or an expired entry.
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
    /// Entries dropped because their TTL lapsed.
    pub expirations: u64,
}

/// Bounded cache evicting the oldest inserted entry once full.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    name: &'static str,
    config: CacheConfig,
    entries: HashMap<K, CacheEntry<K, V>>,
    /// Insertion order, oldest at the front.
    order: VecDeque<K>,
    stats: CacheStats,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache. `name` labels the cache in metrics and logs.
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            name,
            config,
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats {
                capacity: config.capacity,
                ..Default::default()
            },
        }
    }

    /// Look up a key, dropping the entry if its TTL has lapsed.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(self.config.ttl, now),
            None => {
                self.record_miss();
                return None;
            }
        };

        if expired {
            self.remove(key);
            self.stats.expirations += 1;
            self.record_miss();
            return None;
        }

        self.stats.hits += 1;
        metrics::counter!(metric_defs::CACHE_HITS.name, "cache" => self.name).increment(1);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert a value, evicting the oldest entries while at capacity.
    ///
    /// Re-inserting an existing key replaces its value and makes it the newest.
    pub fn insert(&mut self, key: K, value: V) {
        if self.config.capacity == 0 {
            return;
        }

        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        }

        while self.entries.len() >= self.config.capacity && !self.entries.contains_key(&key) {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            self.stats.evictions += 1;
            metrics::counter!(metric_defs::CACHE_EVICTIONS.name, "cache" => self.name)
                .increment(1);
        }

        self.order.push_back(key.clone());
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove an entry, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(entry.value)
    }

    /// Whether a key is present (expired entries count until next accessed).
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.stats = CacheStats {
            capacity: self.config.capacity,
            ..Default::default()
        };
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            len: self.entries.len(),
            ..self.stats
        }
    }

    fn record_miss(&mut self) {
        self.stats.misses += 1;
        metrics::counter!(metric_defs::CACHE_MISSES.name, "cache" => self.name).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_exactly_the_oldest() {
        let capacity = 4;
        let mut cache = BoundedCache::new("test", CacheConfig::new(capacity));
        for i in 0..=capacity {
            cache.insert(format!("tile-{i}"), i);
        }

        assert_eq!(cache.len(), capacity);
        assert!(!cache.contains(&"tile-0".to_string()));
        for i in 1..=capacity {
            assert_eq!(cache.get(&format!("tile-{i}")), Some(i));
        }
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_reinsert_refreshes_position() {
        let mut cache = BoundedCache::new("test", CacheConfig::new(2));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_lookups_do_not_change_eviction_order() {
        let mut cache = BoundedCache::new("test", CacheConfig::new(2));
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);

        assert!(!cache.contains(&"a"));
        assert!(cache.contains(&"b"));
    }

    #[test]
    fn test_ttl_lapses_on_next_access() {
        let mut cache = BoundedCache::new("test", CacheConfig::new(8).with_ttl(Duration::ZERO));
        cache.insert("a", 1);
        assert!(cache.contains(&"a"));

        assert_eq!(cache.get(&"a"), None);
        assert!(!cache.contains(&"a"));
        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_long_ttl_keeps_entries() {
        let mut cache =
            BoundedCache::new("test", CacheConfig::new(8).with_ttl(Duration::from_secs(3600)));
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = BoundedCache::new("test", CacheConfig::new(0));
        cache.insert("a", 1);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_clear_resets() {
        let mut cache = BoundedCache::new("test", CacheConfig::new(2));
        cache.insert("a", 1);
        let _ = cache.get(&"a");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats { capacity: 2, ..Default::default() });
    }
}

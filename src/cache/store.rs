//! Cache Store Module
//!
//! Main cache engine combining the entry table, version table, LRU tracking
//! and TTL expiration. Not synchronized; see [`crate::cache::TownCache`] for
//! the shared handle.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::key::normalize;
use crate::cache::{
    CacheEntry, CacheKey, CacheStats, EntryView, LruTracker, Payload, StatsCounter, VersionTable,
};
use crate::config::CacheConfig;
use crate::error::Result;

// == Validity ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Validity {
    Valid,
    Expired,
    Stale,
}

// == Version Stamp ==
/// Scope state captured before a load, used to detect invalidations that
/// happen while the loader runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionStamp {
    epoch: u64,
    version: u64,
}

// == Cache Store ==
/// Main cache storage with LRU eviction, TTL and version-based invalidation.
#[derive(Debug)]
pub struct CacheStore {
    /// Entry table
    entries: HashMap<CacheKey, CacheEntry>,
    /// Scope versions
    versions: VersionTable,
    /// LRU access tracker
    lru: LruTracker,
    /// Lifetime counters
    stats: StatsCounter,
    /// Maximum number of distinct keys
    max_size: usize,
    /// TTL for entries without an override
    default_ttl: Duration,
    /// Bumped by `invalidate_all`, which also resets every version to 0
    epoch: u64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity and default TTL.
    ///
    /// # Errors
    /// `CacheError::InvalidConfig` if `max_size` or `default_ttl` is zero.
    pub fn new(max_size: usize, default_ttl: Duration) -> Result<Self> {
        let config = CacheConfig::new()
            .with_max_size(max_size)
            .with_default_ttl(default_ttl);
        Self::from_config(&config)
    }

    /// Creates a new CacheStore from a validated configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            entries: HashMap::new(),
            versions: VersionTable::new(),
            lru: LruTracker::new(),
            stats: StatsCounter::new(),
            max_size: config.max_size,
            default_ttl: config.default_ttl,
            epoch: 0,
        })
    }

    // == Lookup ==
    /// Returns the payload for a key if it has a valid entry.
    ///
    /// Records a hit and refreshes recency on success. Records a miss
    /// otherwise, removing an expired or stale entry if one was found.
    pub fn lookup(&mut self, key: &CacheKey) -> Option<Payload> {
        match self.validity(key) {
            Some(Validity::Valid) => {
                let entry = self.entries.get_mut(key)?;
                entry.touch();
                let data = entry.data.clone();
                self.lru.touch(key);
                self.stats.record_hit();
                debug!("Cache hit: {}", key);
                Some(data)
            }
            Some(reason) => {
                self.remove_entry(key);
                self.stats.record_miss();
                debug!("Cache miss: {} ({:?} entry removed)", key, reason);
                None
            }
            None => {
                self.stats.record_miss();
                debug!("Cache miss: {}", key);
                None
            }
        }
    }

    // == Set ==
    /// Stores a payload under a key with optional TTL override.
    ///
    /// A new key at capacity evicts the least recently used entry first.
    /// Replacing an existing key never evicts and keeps its recency.
    /// A zero override falls back to the default TTL.
    pub fn set(&mut self, key: CacheKey, data: Payload, ttl: Option<Duration>) {
        let version = self.versions.effective(&key);
        self.insert(key, data, ttl, version);
    }

    /// Captures the current scope state for a key.
    pub fn stamp(&self, key: &CacheKey) -> VersionStamp {
        VersionStamp {
            epoch: self.epoch,
            version: self.versions.effective(key),
        }
    }

    /// Stores a loaded payload unless the key's scope was invalidated since
    /// `stamp` was taken. Returns whether the payload was stored.
    pub fn insert_loaded(&mut self, key: CacheKey, data: Payload, stamp: VersionStamp) -> bool {
        if self.stamp(&key) != stamp {
            debug!("Discarding load for {}: scope invalidated while loading", key);
            return false;
        }
        self.insert(key, data, None, stamp.version);
        true
    }

    // == Has ==
    /// True if a valid entry exists. Touches neither recency nor stats.
    pub fn has(&self, key: &CacheKey) -> bool {
        self.validity(key) == Some(Validity::Valid)
    }

    /// Returns a valid payload without recording a lookup.
    pub fn peek(&self, key: &CacheKey) -> Option<Payload> {
        match self.validity(key) {
            Some(Validity::Valid) => self.entries.get(key).map(|e| e.data.clone()),
            _ => None,
        }
    }

    // == Invalidate ==
    /// Invalidates one (town, service) scope, or a whole town when `service`
    /// is None.
    ///
    /// The scope version is bumped and matching entries are deleted right
    /// away. Returns the number of entries removed.
    pub fn invalidate(&mut self, town: &str, service: Option<&str>) -> usize {
        let removed = match service {
            Some(service) => {
                let key = CacheKey::new(town, service);
                self.versions.bump_service(&key);
                let removed = usize::from(self.remove_entry(&key));
                debug!("Invalidated {} ({} entry removed)", key, removed);
                removed
            }
            None => {
                let town = normalize(town);
                self.versions.bump_town(&town);
                let doomed: Vec<CacheKey> = self
                    .entries
                    .keys()
                    .filter(|key| key.in_town(&town))
                    .cloned()
                    .collect();
                for key in &doomed {
                    self.remove_entry(key);
                }
                info!("Invalidated town '{}': removed {} entries", town, doomed.len());
                doomed.len()
            }
        };

        self.stats.record_invalidations(1);
        removed
    }

    // == Invalidate All ==
    /// Clears the entry and version tables. Returns the number of entries removed.
    pub fn invalidate_all(&mut self) -> usize {
        let removed = self.entries.len();

        self.entries.clear();
        self.lru.clear();
        self.versions.clear();
        self.epoch += 1;
        self.stats.record_invalidations(removed as u64);

        info!("Invalidated all: removed {} entries", removed);
        removed
    }

    // == Entries ==
    /// Lists valid entries ordered by key. Read-only.
    pub fn entries(&self) -> Vec<EntryView> {
        let mut views: Vec<EntryView> = self
            .entries
            .iter()
            .filter(|(key, _)| self.validity(key) == Some(Validity::Valid))
            .map(|(key, entry)| entry.view(key))
            .collect();
        views.sort_by(|a, b| a.key.cmp(&b.key));
        views
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len())
    }

    // == Purge Stale ==
    /// Removes every expired or stale entry.
    ///
    /// Returns the number of entries removed. Counters are left untouched.
    pub fn purge_stale(&mut self) -> usize {
        let doomed: Vec<CacheKey> = self
            .entries
            .keys()
            .filter(|key| self.validity(key) != Some(Validity::Valid))
            .cloned()
            .collect();

        for key in &doomed {
            self.remove_entry(key);
        }
        doomed.len()
    }

    // == Length ==
    /// Returns the current number of entries, valid or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn insert(&mut self, key: CacheKey, data: Payload, ttl: Option<Duration>, version: u64) {
        let ttl = ttl.filter(|t| !t.is_zero()).unwrap_or(self.default_ttl);

        if !self.entries.contains_key(&key) {
            if self.entries.len() >= self.max_size {
                self.evict_oldest();
            }
            self.lru.touch(&key);
        }

        self.entries.insert(key, CacheEntry::new(data, version, ttl));
    }

    fn evict_oldest(&mut self) {
        if let Some(victim) = self.lru.evict_oldest() {
            self.entries.remove(&victim);
            self.stats.record_eviction();
            debug!("Evicted least recently used entry: {}", victim);
        }
    }

    fn remove_entry(&mut self, key: &CacheKey) -> bool {
        self.lru.remove(key);
        self.entries.remove(key).is_some()
    }

    fn validity(&self, key: &CacheKey) -> Option<Validity> {
        let entry = self.entries.get(key)?;
        Some(if entry.is_expired() {
            Validity::Expired
        } else if entry.is_stale(self.versions.effective(key)) {
            Validity::Stale
        } else {
            Validity::Valid
        })
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(300);

    fn store(max_size: usize) -> CacheStore {
        CacheStore::new(max_size, TTL).unwrap()
    }

    fn key(town: &str, service: &str) -> CacheKey {
        CacheKey::new(town, service)
    }

    fn payload(content: &str) -> Payload {
        Payload::new(content)
    }

    #[test]
    fn test_store_new() {
        let store = store(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.max_size(), 100);
        assert_eq!(store.default_ttl(), TTL);
    }

    #[test]
    fn test_store_rejects_invalid_config() {
        assert!(matches!(
            CacheStore::new(0, TTL),
            Err(CacheError::InvalidConfig(_))
        ));
        assert!(matches!(
            CacheStore::new(10, Duration::ZERO),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_store_key_normalization() {
        let mut store = store(100);

        store.set(key("BOSTON", "WELCOME"), payload("hi"), None);

        assert_eq!(store.lookup(&key("boston", "welcome")), Some(payload("hi")));
    }

    #[test]
    fn test_store_miss_on_empty() {
        let mut store = store(100);

        assert_eq!(store.lookup(&key("boston", "welcome")), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = store(100);

        store.set(key("boston", "welcome"), payload("v1"), None);
        store.set(key("boston", "welcome"), payload("v2"), None);

        assert_eq!(store.lookup(&key("boston", "welcome")), Some(payload("v2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = store(3);

        store.set(key("town1", "welcome"), payload("1"), None);
        store.set(key("town2", "welcome"), payload("2"), None);
        store.set(key("town3", "welcome"), payload("3"), None);

        // Reading town1 makes town2 the least recently used
        store.lookup(&key("town1", "welcome")).unwrap();
        store.set(key("town4", "welcome"), payload("4"), None);

        assert_eq!(store.len(), 3);
        assert_eq!(store.stats().evictions, 1);
        assert!(!store.has(&key("town2", "welcome")));
        assert!(store.has(&key("town1", "welcome")));
        assert!(store.has(&key("town3", "welcome")));
        assert!(store.has(&key("town4", "welcome")));
    }

    #[test]
    fn test_store_no_eviction_on_update() {
        let mut store = store(2);

        store.set(key("a", "s"), payload("1"), None);
        store.set(key("b", "s"), payload("2"), None);
        store.set(key("a", "s"), payload("3"), None);
        store.set(key("b", "s"), payload("4"), None);

        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().evictions, 0);
    }

    #[test]
    fn test_store_update_does_not_refresh_recency() {
        let mut store = store(2);

        store.set(key("a", "s"), payload("1"), None);
        store.set(key("b", "s"), payload("2"), None);
        // Overwriting `a` leaves it the least recently used
        store.set(key("a", "s"), payload("1b"), None);
        store.set(key("c", "s"), payload("3"), None);

        assert!(!store.has(&key("a", "s")));
        assert!(store.has(&key("b", "s")));
        assert!(store.has(&key("c", "s")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_expiration() {
        let mut store = CacheStore::new(100, Duration::from_millis(1000)).unwrap();
        store.set(key("boston", "welcome"), payload("hi"), None);

        advance(Duration::from_millis(700)).await;
        assert!(store.has(&key("boston", "welcome")));

        advance(Duration::from_millis(800)).await;
        assert!(!store.has(&key("boston", "welcome")));
        assert_eq!(store.lookup(&key("boston", "welcome")), None);
        // The expired entry is reaped by the lookup
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_override() {
        let mut store = CacheStore::new(100, Duration::from_millis(1000)).unwrap();
        store.set(key("boston", "welcome"), payload("short"), Some(Duration::from_millis(500)));
        store.set(key("boston", "pricing"), payload("default"), None);

        advance(Duration::from_millis(600)).await;

        assert!(!store.has(&key("boston", "welcome")));
        assert!(store.has(&key("boston", "pricing")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_zero_ttl_override_uses_default() {
        let mut store = CacheStore::new(100, Duration::from_millis(1000)).unwrap();
        store.set(key("boston", "welcome"), payload("x"), Some(Duration::ZERO));

        advance(Duration::from_millis(900)).await;
        assert!(store.has(&key("boston", "welcome")));
    }

    #[test]
    fn test_store_specific_invalidation() {
        let mut store = store(100);
        store.set(key("Boston", "welcome"), payload("w"), None);
        store.set(key("Boston", "pricing"), payload("p"), None);

        let removed = store.invalidate("Boston", Some("welcome"));

        assert_eq!(removed, 1);
        assert!(!store.has(&key("boston", "welcome")));
        assert!(store.has(&key("boston", "pricing")));
        assert_eq!(store.stats().invalidations, 1);
    }

    #[test]
    fn test_store_town_invalidation() {
        let mut store = store(100);
        store.set(key("Boston", "welcome"), payload("w"), None);
        store.set(key("Boston", "pricing"), payload("p"), None);
        store.set(key("NYC", "welcome"), payload("n"), None);

        let removed = store.invalidate("BOSTON", None);

        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
        assert!(store.has(&key("nyc", "welcome")));
        let listed: Vec<String> = store.entries().into_iter().map(|e| e.key).collect();
        assert_eq!(listed, vec!["nyc:welcome".to_string()]);
    }

    #[test]
    fn test_store_set_after_invalidation_is_fresh() {
        let mut store = store(100);
        store.invalidate("boston", Some("welcome"));
        store.invalidate("boston", None);

        store.set(key("boston", "welcome"), payload("new"), None);

        assert!(store.has(&key("boston", "welcome")));
        assert_eq!(store.lookup(&key("boston", "welcome")), Some(payload("new")));
    }

    #[test]
    fn test_store_invalidate_all() {
        let mut store = store(100);
        store.set(key("boston", "welcome"), payload("w"), None);
        store.set(key("boston", "pricing"), payload("p"), None);
        store.set(key("nyc", "welcome"), payload("n"), None);
        store.invalidate("nyc", Some("pricing"));

        let removed = store.invalidate_all();

        assert_eq!(removed, 3);
        assert!(store.is_empty());
        assert!(!store.has(&key("boston", "welcome")));
        // One for the specific invalidation, three for the entries cleared
        assert_eq!(store.stats().invalidations, 4);
    }

    #[test]
    fn test_store_insert_loaded_respects_invalidation() {
        let mut store = store(100);
        let k = key("boston", "welcome");

        let stamp = store.stamp(&k);
        assert!(store.insert_loaded(k.clone(), payload("fresh"), stamp));
        assert!(store.has(&k));

        let stamp = store.stamp(&k);
        store.invalidate("boston", None);
        assert!(!store.insert_loaded(k.clone(), payload("old"), stamp));
        assert!(!store.has(&k));

        let stamp = store.stamp(&k);
        store.invalidate_all();
        assert!(!store.insert_loaded(k.clone(), payload("old"), stamp));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_has_and_peek_are_read_only() {
        let mut store = store(2);
        store.set(key("a", "s"), payload("1"), None);
        store.set(key("b", "s"), payload("2"), None);

        assert!(store.has(&key("a", "s")));
        assert_eq!(store.peek(&key("a", "s")), Some(payload("1")));

        // Neither call refreshed `a`, so it is still evicted first
        store.set(key("c", "s"), payload("3"), None);
        assert!(!store.has(&key("a", "s")));

        let stats = store.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_entries_filters_without_removing() {
        let mut store = CacheStore::new(100, Duration::from_millis(1000)).unwrap();
        store.set(key("boston", "welcome"), payload("w"), Some(Duration::from_millis(100)));
        store.set(key("boston", "pricing"), payload("p"), None);

        advance(Duration::from_millis(200)).await;

        let listed = store.entries();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].service, "pricing");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_purge_stale() {
        let mut store = CacheStore::new(100, Duration::from_millis(1000)).unwrap();
        store.set(key("boston", "welcome"), payload("w"), Some(Duration::from_millis(100)));
        store.set(key("boston", "pricing"), payload("p"), None);
        store.set(key("nyc", "welcome"), payload("n"), None);

        advance(Duration::from_millis(200)).await;

        assert_eq!(store.purge_stale(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().evictions, 0);
    }

    #[test]
    fn test_store_stats() {
        let mut store = store(100);

        store.set(key("boston", "welcome"), payload("w"), None);
        store.lookup(&key("boston", "welcome")).unwrap();
        store.lookup(&key("boston", "welcome")).unwrap();
        let _ = store.lookup(&key("nyc", "welcome"));

        let stats = store.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
    }
}

//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::{BTreeMap, HashMap};

use crate::cache::CacheKey;

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every access is stamped with a strictly increasing tick:
/// - Smallest tick = Least recently used
/// - Largest tick = Most recently used
///
/// Ticks are unique, so eviction order is always deterministic.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Keys ordered by last access tick
    order: BTreeMap<u64, CacheKey>,
    /// Current tick of each tracked key
    ticks: HashMap<CacheKey, u64>,
    /// Next tick to hand out
    clock: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, tracking it if new.
    pub fn touch(&mut self, key: &CacheKey) {
        if let Some(old) = self.ticks.get(key) {
            self.order.remove(old);
        }
        let tick = self.clock;
        self.clock += 1;
        self.order.insert(tick, key.clone());
        self.ticks.insert(key.clone(), tick);
    }

    // == Remove ==
    /// Stops tracking a key.
    pub fn remove(&mut self, key: &CacheKey) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<CacheKey> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    #[allow(dead_code)]
    pub fn peek_oldest(&self) -> Option<&CacheKey> {
        self.order.values().next()
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.order.clear();
        self.ticks.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    // == Is Empty ==
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    #[allow(dead_code)]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.ticks.contains_key(key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn key(town: &str) -> CacheKey {
        CacheKey::new(town, "welcome")
    }

    #[test]
    fn test_lru_new() {
        let lru = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn test_lru_touch_new_key() {
        let mut lru = LruTracker::new();

        lru.touch(&key("a"));
        lru.touch(&key("b"));
        lru.touch(&key("c"));

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek_oldest(), Some(&key("a")));
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let mut lru = LruTracker::new();

        lru.touch(&key("a"));
        lru.touch(&key("b"));
        lru.touch(&key("c"));
        lru.touch(&key("a"));

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek_oldest(), Some(&key("b")));
    }

    #[test]
    fn test_lru_evict_empty() {
        let mut lru = LruTracker::new();
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch(&key("a"));
        lru.touch(&key("b"));
        lru.touch(&key("c"));
        lru.remove(&key("b"));
        lru.remove(&key("missing"));

        assert_eq!(lru.len(), 2);
        assert!(!lru.contains(&key("b")));
        assert_eq!(lru.evict_oldest(), Some(key("a")));
        assert_eq!(lru.evict_oldest(), Some(key("c")));
        assert!(lru.is_empty());
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut lru = LruTracker::new();

        lru.touch(&key("a"));
        lru.touch(&key("b"));
        lru.touch(&key("c"));

        lru.touch(&key("a"));
        lru.touch(&key("c"));
        lru.touch(&key("b"));

        assert_eq!(lru.evict_oldest(), Some(key("a")));
        assert_eq!(lru.evict_oldest(), Some(key("c")));
        assert_eq!(lru.evict_oldest(), Some(key("b")));
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = LruTracker::new();
        lru.touch(&key("a"));
        lru.touch(&key("b"));

        lru.clear();

        assert!(lru.is_empty());
        assert_eq!(lru.peek_oldest(), None);
    }
}

//! Cache Statistics Module
//!
//! Tracks hits, misses, evictions and invalidations.

use serde::Serialize;

// == Stats Counter ==
/// Lifetime counters owned by a store. Never decrease.
#[derive(Debug, Clone, Default)]
pub struct StatsCounter {
    hits: u64,
    misses: u64,
    evictions: u64,
    invalidations: u64,
}

impl StatsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Adds `count` invalidations.
    pub fn record_invalidations(&mut self, count: u64) {
        self.invalidations += count;
    }

    /// Builds a snapshot with the derived fields filled in.
    pub fn snapshot(&self, size: usize) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            invalidations: self.invalidations,
            size,
            hit_rate: hit_rate(self.hits, self.misses),
        }
    }
}

// == Cache Stats ==
/// Point-in-time view of cache performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of lookups served from a valid entry
    pub hits: u64,
    /// Number of lookups with no valid entry
    pub misses: u64,
    /// Number of entries evicted due to LRU policy
    pub evictions: u64,
    /// Number of invalidations applied
    pub invalidations: u64,
    /// Current number of entries in the table
    pub size: usize,
    /// hits / (hits + misses), 0.0 before any lookup
    pub hit_rate: f64,
}

/// Calculates the hit rate, or 0.0 if no lookups have been made.
fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

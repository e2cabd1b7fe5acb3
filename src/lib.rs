//! Town Cache - versioned, TTL-bounded LRU content cache
//!
//! Stores opaque content per (town, service) with LRU eviction, TTL expiry,
//! scope-versioned invalidation and an optional async loader for misses.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;
pub mod telemetry;

pub use cache::{loader_fn, CacheStats, ContentLoader, EntryView, Payload, TownCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::spawn_reaper;
pub use telemetry::init_tracing;

//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a cache.
//!
//! # Tasks
//! - Reaper: Removes expired and stale cache entries at a fixed interval

mod reaper;

pub use reaper::spawn_reaper;

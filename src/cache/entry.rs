//! Cache Entry Module
//!
//! Defines the stored payload and the per-key entry with TTL and version data.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::cache::CacheKey;

// == Payload ==
/// Opaque content stored by the cache.
///
/// The cache never inspects `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// The content string
    pub content: String,
    /// Optional open-ended metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Payload {
    /// Creates a payload without metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    /// Attaches a metadata map.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// == Cache Entry ==
/// A single cache entry with payload, expiry and version data.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload
    pub data: Payload,
    /// Scope version in effect when the entry was inserted
    pub version: u64,
    /// Insertion instant
    pub created_at: Instant,
    /// Expiration instant, always after `created_at`
    pub expires_at: Instant,
    /// Last successful read, never before `created_at`
    pub last_access: Instant,
    /// Wall-clock insertion time, for listings
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry expiring after `ttl`.
    ///
    /// # Arguments
    /// * `data` - The payload to store
    /// * `version` - Effective scope version at insertion time
    /// * `ttl` - Time to live, must be non-zero
    pub fn new(data: Payload, version: u64, ttl: Duration) -> Self {
        let now = Instant::now();

        Self {
            data,
            version,
            created_at: now,
            expires_at: now + ttl,
            last_access: now,
            cached_at: Utc::now(),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is still live at exactly `expires_at` and expires strictly after it.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Expiry check against a caller-supplied instant.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    /// True if a newer scope version has been published since insertion.
    pub fn is_stale(&self, effective_version: u64) -> bool {
        self.version < effective_version
    }

    /// Records a successful read.
    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    /// Remaining TTL, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Time since the last successful read (or insertion).
    pub fn idle(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_access)
    }

    /// Read-only snapshot of this entry for listings.
    pub fn view(&self, key: &CacheKey) -> EntryView {
        EntryView {
            key: key.to_string(),
            town: key.town().to_string(),
            service: key.service().to_string(),
            data: self.data.clone(),
            version: self.version,
            cached_at: self.cached_at,
            idle_ms: saturating_millis(self.idle()),
            ttl_remaining_ms: saturating_millis(self.ttl_remaining()),
        }
    }
}

/// Whole milliseconds in `d`, capped at `u64::MAX`.
fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// == Entry View ==
/// Snapshot of a valid entry returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryView {
    /// Rendered key, `town:service`
    pub key: String,
    /// Normalized town
    pub town: String,
    /// Normalized service
    pub service: String,
    /// Stored payload
    pub data: Payload,
    /// Version the entry was stored under
    pub version: u64,
    /// Wall-clock insertion time
    pub cached_at: DateTime<Utc>,
    /// Milliseconds since the last read
    pub idle_ms: u64,
    /// Milliseconds until expiry
    pub ttl_remaining_ms: u64,
}

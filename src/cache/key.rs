//! Cache Key Module
//!
//! Normalized (town, service) identity used by the entry table.

use std::fmt;

/// Separator used when a key is rendered as a single string.
pub const KEY_SEPARATOR: char = ':';

// == Cache Key ==
/// Case-insensitive (town, service) pair.
///
/// Both parts are lowercased on construction. The parts are kept apart rather
/// than joined, so a town containing the separator cannot collide with a
/// different split of the same characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    town: String,
    service: String,
}

impl CacheKey {
    /// Builds a normalized key. Empty parts are legal.
    pub fn new(town: &str, service: &str) -> Self {
        Self {
            town: normalize(town),
            service: normalize(service),
        }
    }

    /// Normalized town part.
    pub fn town(&self) -> &str {
        &self.town
    }

    /// Normalized service part.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// True if this key is filed under the given normalized town.
    pub fn in_town(&self, town: &str) -> bool {
        self.town == town
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.town, KEY_SEPARATOR, self.service)
    }
}

/// Lowercases one key part.
pub fn normalize(part: &str) -> String {
    part.to_lowercase()
}

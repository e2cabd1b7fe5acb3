//! Version Table Module
//!
//! Per-scope version counters used for lazy invalidation.

use std::collections::HashMap;

use crate::cache::CacheKey;

// == Scope ==
/// Invalidation granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Scope {
    /// Every service of one normalized town
    Town(String),
    /// A single (town, service) pair
    Service(CacheKey),
}

// == Version Table ==
/// Maps scopes to monotonically increasing versions. Absent scopes are version 0.
#[derive(Debug, Default)]
pub struct VersionTable {
    versions: HashMap<Scope, u64>,
}

impl VersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective version for a key: the newer of its own and its town's version.
    pub fn effective(&self, key: &CacheKey) -> u64 {
        let service = self.get(&Scope::Service(key.clone()));
        let town = self.get(&Scope::Town(key.town().to_string()));
        service.max(town)
    }

    /// Bumps the version of one (town, service) scope and returns it.
    ///
    /// The new version is above the key's current effective version, so the
    /// bump is visible even when the town version was the larger one.
    pub fn bump_service(&mut self, key: &CacheKey) -> u64 {
        let next = self.effective(key) + 1;
        self.versions.insert(Scope::Service(key.clone()), next);
        next
    }

    /// Bumps the version of a whole town and returns it.
    ///
    /// The new version is above every service version in the town, so the
    /// effective version of each of its keys increases.
    pub fn bump_town(&mut self, town: &str) -> u64 {
        let highest = self
            .versions
            .iter()
            .filter_map(|(scope, version)| match scope {
                Scope::Town(t) if t == town => Some(*version),
                Scope::Service(key) if key.in_town(town) => Some(*version),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        let next = highest + 1;
        self.versions.insert(Scope::Town(town.to_string()), next);
        next
    }

    /// Forgets every scope, so all versions read as 0 again.
    pub fn clear(&mut self) {
        self.versions.clear();
    }

    /// Number of scopes that have been bumped.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    fn get(&self, scope: &Scope) -> u64 {
        self.versions.get(scope).copied().unwrap_or(0)
    }
}

// # Zone Id Cache
//
// Memoizes provider zone ids resolved by name lookup.
//
// ## Lifetime
//
// - Entries live for the process lifetime only; nothing is written to disk
// - An entry is written once, after a successful lookup, and never replaced
// - A failed or empty lookup leaves no entry, so the next tick retries
//
// The engine owns the cache and is the only writer. There is a single
// execution context, so no locking is involved.

use std::collections::HashMap;

/// A zone id learned from the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedZone {
    pub id: String,
    pub resolved_at: chrono::DateTime<chrono::Utc>,
}

/// Resolved zone ids keyed by (owner username, zone name)
///
/// The owner is part of the key because two credentials may see
/// different zones under the same name.
#[derive(Debug, Clone, Default)]
pub struct ZoneIdCache {
    inner: HashMap<(String, String), ResolvedZone>,
}

impl ZoneIdCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previously resolved id
    pub fn get(&self, owner: &str, zone_name: &str) -> Option<&str> {
        self.inner
            .get(&(owner.to_string(), zone_name.to_string()))
            .map(|zone| zone.id.as_str())
    }

    /// Full entry, including when it was resolved
    pub fn entry(&self, owner: &str, zone_name: &str) -> Option<&ResolvedZone> {
        self.inner.get(&(owner.to_string(), zone_name.to_string()))
    }

    /// Memoize `id`; an existing entry is kept
    pub fn insert(&mut self, owner: &str, zone_name: &str, id: impl Into<String>) -> &str {
        let zone = self
            .inner
            .entry((owner.to_string(), zone_name.to_string()))
            .or_insert_with(|| ResolvedZone {
                id: id.into(),
                resolved_at: chrono::Utc::now(),
            });
        zone.id.as_str()
    }

    /// Get the number of resolved zones
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if nothing has been resolved yet
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

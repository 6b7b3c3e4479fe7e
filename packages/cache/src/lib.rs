#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Time-bounded response cache.
//!
//! Used at the request boundary to avoid repeating paid AI calls for the
//! same risk summary. The cache is advisory: a miss only costs latency,
//! never correctness. Callers depend on the [`ResponseCache`] trait so a
//! shared store can replace [`InMemoryCache`] in multi-instance
//! deployments.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default lifetime of a cached entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Map size above which an insert triggers a sweep of expired entries.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// A key/value cache with per-entry expiry.
pub trait ResponseCache: Send + Sync {
    /// Returns the value for `key` if present and not expired.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Stores `value` under `key` for `ttl`.
    fn set(&self, key: String, value: serde_json::Value, ttl: Duration);
}

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Single-process [`ResponseCache`] backed by a `Mutex<BTreeMap>`.
///
/// Expired entries are hidden on read and swept whenever an insert pushes
/// the map past `max_entries`.
pub struct InMemoryCache {
    entries: Mutex<BTreeMap<String, Entry>>,
    max_entries: usize,
}

impl InMemoryCache {
    /// Creates an empty cache that sweeps once it exceeds `max_entries`.
    #[must_use]
    pub const fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            max_entries,
        }
    }

    /// Number of stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl ResponseCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let Ok(entries) = self.entries.lock() else {
            log::warn!("Response cache mutex poisoned; treating as miss");
            return None;
        };
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: String, value: serde_json::Value, ttl: Duration) {
        let Ok(mut entries) = self.entries.lock() else {
            log::warn!("Response cache mutex poisoned; dropping write");
            return;
        };

        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| {
            log::warn!("Cache TTL {ttl:?} is out of range; using {DEFAULT_TTL:?}");
            now.checked_add(DEFAULT_TTL).unwrap_or(now)
        });
        entries.insert(key, Entry { value, expires_at });

        if entries.len() > self.max_entries {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            log::debug!(
                "Pruned {} expired cache entries ({} remain)",
                before - entries.len(),
                entries.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_fresh_entries() {
        let cache = InMemoryCache::default();
        cache.set("k".to_string(), serde_json::json!({"a": 1}), DEFAULT_TTL);
        assert_eq!(cache.get("k"), Some(serde_json::json!({"a": 1})));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn oversized_ttl_falls_back_to_default() {
        let cache = InMemoryCache::default();
        cache.set("k".to_string(), serde_json::json!(1), Duration::MAX);
        assert_eq!(cache.get("k"), Some(serde_json::json!(1)));
    }

    #[test]
    fn hides_expired_entries() {
        let cache = InMemoryCache::default();
        cache.set("k".to_string(), serde_json::json!(1), Duration::ZERO);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn overwrites_existing_key() {
        let cache = InMemoryCache::default();
        cache.set("k".to_string(), serde_json::json!(1), DEFAULT_TTL);
        cache.set("k".to_string(), serde_json::json!(2), DEFAULT_TTL);
        assert_eq!(cache.get("k"), Some(serde_json::json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn prunes_expired_entries_when_over_capacity() {
        let cache = InMemoryCache::new(2);
        cache.set("old-1".to_string(), serde_json::json!(1), Duration::ZERO);
        cache.set("old-2".to_string(), serde_json::json!(2), Duration::ZERO);
        assert_eq!(cache.len(), 2);

        cache.set("fresh".to_string(), serde_json::json!(3), DEFAULT_TTL);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(serde_json::json!(3)));
    }

    #[test]
    fn keeps_live_entries_when_over_capacity() {
        let cache = InMemoryCache::new(1);
        cache.set("a".to_string(), serde_json::json!(1), DEFAULT_TTL);
        cache.set("b".to_string(), serde_json::json!(2), DEFAULT_TTL);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn usable_as_trait_object() {
        let cache: Box<dyn ResponseCache> = Box::new(InMemoryCache::default());
        cache.set("k".to_string(), serde_json::json!("v"), DEFAULT_TTL);
        assert_eq!(cache.get("k"), Some(serde_json::json!("v")));
    }
}

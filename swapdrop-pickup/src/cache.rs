//! Resolution memo: normalized address key to the point it resolved to.
//!
//! Bounded by [`LruCache`]; a resolution older than the window is treated as
//! absent and evicted on the next lookup.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use swapdrop_core::constants::{DEFAULT_PICKUP_CACHE_ENTRIES, DEFAULT_PICKUP_CACHE_TTL_SECS};
use swapdrop_core::types::PickupPoint;

/// Cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Addresses remembered at once; zero is treated as one
    pub max_entries: usize,
    /// Resolution window in seconds
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_PICKUP_CACHE_ENTRIES,
            ttl_seconds: DEFAULT_PICKUP_CACHE_TTL_SECS,
        }
    }
}

/// Remembers which pickup point each address resolved to.
///
/// Keys are [`PostalAddress::normalized_key`](swapdrop_core::types::PostalAddress::normalized_key)
/// values, so formatting variants of one address share an entry.
pub struct PickupCache {
    resolved: Mutex<LruCache<String, (PickupPoint, Instant)>>,
    window: Duration,
}

impl PickupCache {
    /// Creates a cache sized and windowed by `config`.
    pub fn with_config(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            resolved: Mutex::new(LruCache::new(capacity)),
            window: Duration::from_secs(config.ttl_seconds),
        }
    }

    /// The point `key` resolved to, if that resolution is inside the window.
    pub fn get(&self, key: &str) -> Option<PickupPoint> {
        let mut resolved = self.resolved.lock();
        match resolved.get(key) {
            Some((point, at)) if at.elapsed() <= self.window => Some(point.clone()),
            Some(_) => {
                resolved.pop(key);
                None
            }
            None => None,
        }
    }

    /// Records that `key` resolved to `point` just now.
    pub fn insert(&self, key: String, point: PickupPoint) {
        self.resolved.lock().put(key, (point, Instant::now()));
    }

    /// Number of remembered resolutions, stale ones included.
    pub fn len(&self) -> usize {
        self.resolved.lock().len()
    }

    /// Returns true if nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.resolved.lock().is_empty()
    }
}

impl Default for PickupCache {
    fn default() -> Self {
        Self::with_config(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapdrop_core::types::PostalAddress;

    fn point(id: &str) -> PickupPoint {
        PickupPoint {
            id: id.into(),
            name: format!("Shop {}", id),
            address: PostalAddress::new("3 High St", "Paris", "75011", "FR"),
            service_area: vec!["75".into()],
        }
    }

    fn cache(max_entries: usize, ttl_seconds: u64) -> PickupCache {
        PickupCache::with_config(CacheConfig { max_entries, ttl_seconds })
    }

    #[test]
    fn test_remembers_resolution() {
        let cache = PickupCache::default();
        cache.insert("75011|paris|fr".into(), point("pp-1"));
        assert_eq!(cache.get("75011|paris|fr").unwrap().id, "pp-1");
        assert!(cache.get("69007|lyon|fr").is_none());
    }

    #[test]
    fn test_stale_resolution_is_evicted() {
        let cache = cache(8, 0);
        cache.insert("k".into(), point("pp-1"));
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_least_recently_resolved_goes_first() {
        let cache = cache(2, 3600);
        cache.insert("a".into(), point("pp-1"));
        cache.insert("b".into(), point("pp-2"));
        assert!(cache.get("a").is_some());
        cache.insert("c".into(), point("pp-3"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let cache = cache(0, 3600);
        cache.insert("a".into(), point("pp-1"));
        cache.insert("b".into(), point("pp-2"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b").unwrap().id, "pp-2");
    }
}

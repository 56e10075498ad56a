//! Shared TTL Cache
//!
//! Thread-safe handle over a [`CacheStore`]. One `RwLock` per instance is the
//! whole mutual-exclusion domain: writes (including evict-then-insert) run
//! under a single write guard, reads share a read guard and only upgrade when
//! they find an expired entry to purge.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::{CacheStats, CacheStore, Lookup};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::telemetry::{Telemetry, TelemetryEvent, TracingTelemetry};

/// Bounded, TTL-based cache shared between tasks. Cloning shares the store.
#[derive(Clone)]
pub struct TtlCache<V> {
    store: Arc<RwLock<CacheStore<V>>>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
}

impl<V: Clone + Send + Sync> TtlCache<V> {
    /// Creates a cache on the system clock reporting to `tracing`.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(TracingTelemetry))
    }

    /// Creates a cache with an explicit clock and telemetry sink.
    pub fn with_parts(
        config: CacheConfig,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self> {
        Ok(Self {
            store: Arc::new(RwLock::new(CacheStore::new(config)?)),
            clock,
            telemetry,
        })
    }

    /// Stores `value` under `key`, evicting the nearest-expiry entry first if full.
    pub async fn set(&self, key: &str, value: V) -> Result<()> {
        let evicted = {
            let mut store = self.store.write().await;
            store.set(key, value, self.clock.now())?
        };

        if let Some(evicted) = evicted {
            self.telemetry
                .record(&TelemetryEvent::CacheEvicted { key: evicted });
        }
        Ok(())
    }

    /// Returns the live value for `key`, or `None` if blank, missing or expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        let (lookup, expired) = {
            let store = self.store.read().await;
            match store.lookup(key, self.clock.now()) {
                Lookup::Hit(value) => (Some(value.clone()), false),
                Lookup::Missing => (None, false),
                Lookup::Expired => (None, true),
            }
        };

        if expired {
            self.purge_expired_key(key).await;
            return None;
        }

        let event = match lookup {
            Some(_) => TelemetryEvent::CacheHit {
                key: key.to_string(),
            },
            None => TelemetryEvent::CacheMiss {
                key: key.to_string(),
            },
        };
        self.telemetry.record(&event);
        lookup
    }

    /// Removes `key` if present. Idempotent.
    pub async fn remove(&self, key: &str) {
        self.store.write().await.remove(key);
    }

    /// Empties the cache.
    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    /// Stored entry count.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Removes every expired entry, returning how many were purged.
    pub async fn purge_expired(&self) -> usize {
        let purged = {
            let mut store = self.store.write().await;
            store.purge_expired(self.clock.now())
        };

        for key in &purged {
            self.telemetry
                .record(&TelemetryEvent::CacheExpired { key: key.clone() });
        }
        purged.len()
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    async fn purge_expired_key(&self, key: &str) {
        // Re-checked under the write guard: a concurrent set may have refreshed it
        let purged = {
            let mut store = self.store.write().await;
            store.purge_if_expired(key, self.clock.now())
        };

        if purged {
            self.telemetry.record(&TelemetryEvent::CacheExpired {
                key: key.to_string(),
            });
        }
        self.telemetry.record(&TelemetryEvent::CacheMiss {
            key: key.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Error;
    use crate::telemetry::RecordingTelemetry;
    use std::time::Duration;

    fn cache(
        max_entries: usize,
        ttl: Duration,
    ) -> (TtlCache<u32>, Arc<ManualClock>, Arc<RecordingTelemetry>) {
        let clock = Arc::new(ManualClock::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        let cache = TtlCache::with_parts(
            CacheConfig { max_entries, ttl },
            clock.clone(),
            telemetry.clone(),
        )
        .unwrap();
        (cache, clock, telemetry)
    }

    #[tokio::test]
    async fn test_unset_key_is_not_found() {
        let (cache, _, telemetry) = cache(10, Duration::from_secs(60));

        assert_eq!(cache.get("never-set").await, None);
        assert_eq!(
            telemetry.events(),
            vec![TelemetryEvent::CacheMiss {
                key: "never-set".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (cache, _, telemetry) = cache(10, Duration::from_secs(60));

        cache.set("k", 7).await.unwrap();

        assert_eq!(cache.get("k").await, Some(7));
        assert_eq!(
            telemetry.count(|e| matches!(e, TelemetryEvent::CacheHit { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_blank_key_rejected() {
        let (cache, _, _) = cache(10, Duration::from_secs(60));

        assert!(matches!(cache.set(" ", 1).await, Err(Error::InvalidKey)));
        assert_eq!(cache.get(" ").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_entry_is_purged_on_get() {
        let (cache, clock, telemetry) = cache(10, Duration::from_secs(60));

        cache.set("k", 1).await.unwrap();
        clock.advance(Duration::from_secs(61));

        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.len().await, 0);
        assert_eq!(
            telemetry.count(|e| matches!(e, TelemetryEvent::CacheExpired { .. })),
            1
        );
        assert_eq!(cache.stats().await.expirations, 1);
    }

    #[tokio::test]
    async fn test_eviction_scenario() {
        let (cache, clock, telemetry) = cache(2, Duration::from_secs(300));

        cache.set("a", 1).await.unwrap();
        clock.advance(Duration::from_secs(1));
        cache.set("b", 2).await.unwrap();
        clock.advance(Duration::from_secs(1));
        cache.set("c", 3).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, Some(2));
        assert_eq!(cache.get("c").await, Some(3));
        assert!(telemetry
            .events()
            .contains(&TelemetryEvent::CacheEvicted { key: "a".into() }));
    }

    #[tokio::test]
    async fn test_overwrite_in_full_cache_evicts_nearest_expiry() {
        let (cache, clock, telemetry) = cache(2, Duration::from_secs(300));

        cache.set("a", 1).await.unwrap();
        clock.advance(Duration::from_secs(1));
        cache.set("b", 2).await.unwrap();
        clock.advance(Duration::from_secs(1));
        cache.set("b", 3).await.unwrap();

        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, Some(3));
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.stats().await.evictions, 1);
        assert!(telemetry
            .events()
            .contains(&TelemetryEvent::CacheEvicted { key: "a".into() }));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let (cache, _, _) = cache(10, Duration::from_secs(60));
        cache.set("a", 1).await.unwrap();
        cache.set("b", 2).await.unwrap();

        cache.remove("a").await;
        cache.remove("a").await;
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_purge_expired_emits_events() {
        let (cache, clock, telemetry) = cache(10, Duration::from_secs(10));
        cache.set("a", 1).await.unwrap();
        cache.set("b", 2).await.unwrap();
        clock.advance(Duration::from_secs(11));

        assert_eq!(cache.purge_expired().await, 2);
        assert_eq!(
            telemetry.count(|e| matches!(e, TelemetryEvent::CacheExpired { .. })),
            2
        );
    }

    #[tokio::test]
    async fn test_concurrent_writers_respect_capacity() {
        let (cache, _, _) = cache(8, Duration::from_secs(60));

        let mut handles = Vec::new();
        for i in 0..64u32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.set(&format!("key{}", i), i).await.unwrap();
                cache.len().await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap() <= 8);
        }
        assert_eq!(cache.len().await, 8);
    }
}

//! TTL Cleanup Task
//!
//! Background task that periodically purges expired cache entries, so memory
//! is reclaimed even for keys that are never read again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TtlCache;

/// Spawns a background task that periodically purges expired cache entries.
///
/// The task runs until aborted, sleeping for `interval` between sweeps.
///
/// # Returns
/// A JoinHandle for the spawned task, used to abort it during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cleanup_handle = spawn_cleanup_task(service.cache().clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: TtlCache<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "Starting TTL cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired().await;
            if removed > 0 {
                info!(removed, "TTL cleanup: purged expired entries");
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;
    use crate::telemetry::{RecordingTelemetry, TelemetryEvent};
    use std::sync::Arc;

    fn cache() -> (TtlCache<String>, Arc<ManualClock>, Arc<RecordingTelemetry>) {
        let clock = Arc::new(ManualClock::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        let cache = TtlCache::with_parts(
            CacheConfig {
                max_entries: 100,
                ttl: Duration::from_secs(60),
            },
            clock.clone(),
            telemetry.clone(),
        )
        .unwrap();
        (cache, clock, telemetry)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_removes_expired_entries() {
        let (cache, clock, telemetry) = cache();
        cache.set("expire_soon", "value".to_string()).await.unwrap();
        clock.advance(Duration::from_secs(61));

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.len().await, 0);
        assert!(telemetry.events().contains(&TelemetryEvent::CacheExpired {
            key: "expire_soon".into()
        }));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_preserves_valid_entries() {
        let (cache, _, _) = cache();
        cache.set("long_lived", "value".to_string()).await.unwrap();

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(cache.get("long_lived").await, Some("value".to_string()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let (cache, _, _) = cache();

        let handle = spawn_cleanup_task(cache, Duration::from_secs(1));
        handle.abort();

        let result = handle.await;
        assert!(result.unwrap_err().is_cancelled());
    }
}

//! Sweeper Tasks
//!
//! Two independent loops over the entry store: a frequent expired-entry
//! sweep and an infrequent unused-entry sweep.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;

/// Handles of both sweeper tasks.
#[derive(Debug)]
pub struct SweeperHandles {
    expired: JoinHandle<()>,
    idle: JoinHandle<()>,
}

impl SweeperHandles {
    /// Stops both tasks at their next await point.
    pub fn abort(&self) {
        self.expired.abort();
        self.idle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.expired.is_finished() && self.idle.is_finished()
    }
}

/// Spawns both sweepers with the intervals from the cache's config.
///
/// The tasks hold only a weak reference, so they end on their own once the
/// cache is dropped.
pub fn spawn_sweepers<V>(cache: &Arc<Cache<V>>) -> SweeperHandles
where
    V: Send + Sync + 'static,
{
    let config = cache.config();
    SweeperHandles {
        expired: spawn_expired_sweeper(Arc::downgrade(cache), config.expired_sweep_interval),
        idle: spawn_idle_sweeper(Arc::downgrade(cache), config.idle_sweep_interval),
    }
}

/// Spawns a task that removes expired entries every `interval`.
pub fn spawn_expired_sweeper<V>(cache: Weak<Cache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    spawn_sweeper("expired", cache, interval, Cache::sweep_expired)
}

/// Spawns a task that removes never-read entries every `interval`.
pub fn spawn_idle_sweeper<V>(cache: Weak<Cache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    spawn_sweeper("unused", cache, interval, Cache::sweep_idle)
}

fn spawn_sweeper<V>(
    name: &'static str,
    cache: Weak<Cache<V>>,
    interval: Duration,
    sweep: fn(&Cache<V>) -> usize,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            sweeper = name,
            interval_secs = interval.as_secs(),
            "Starting cache sweeper"
        );

        loop {
            tokio::time::sleep(interval).await;

            // Hold the strong reference only for the pass itself
            let Some(cache) = cache.upgrade() else {
                debug!(sweeper = name, "Cache dropped, stopping sweeper");
                break;
            };
            let removed = sweep(&cache);
            debug!(sweeper = name, removed, "Sweep pass finished");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn cache_with(config: CacheConfig) -> Arc<Cache<String>> {
        Arc::new(Cache::new(config))
    }

    #[tokio::test]
    async fn test_expired_sweeper_removes_expired_entries() {
        let cache = cache_with(CacheConfig::default());
        cache.put("expire_soon", "value".to_string(), Duration::from_millis(50));
        cache.put("long_lived", "value".to_string(), Duration::from_secs(3600));

        let handle = spawn_expired_sweeper(Arc::downgrade(&cache), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(350)).await;

        // Removed by the sweep, not by a read
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long_lived").as_deref(), Some("value"));

        handle.abort();
    }

    #[tokio::test]
    async fn test_idle_sweeper_removes_unread_entries() {
        let cache = cache_with(CacheConfig {
            idle_threshold: Duration::from_millis(50),
            ..CacheConfig::default()
        });
        cache.put("never_read", "a".to_string(), Duration::from_secs(3600));
        cache.put("read", "b".to_string(), Duration::from_secs(3600));
        assert!(cache.get("read").is_some());

        let handle = spawn_idle_sweeper(Arc::downgrade(&cache), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(cache.len(), 1);
        assert!(!cache.exists("never_read"));
        assert!(cache.exists("read"));

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_cache_dropped() {
        let cache = cache_with(CacheConfig::default());
        let handle = spawn_expired_sweeper(Arc::downgrade(&cache), Duration::from_millis(20));

        drop(cache);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(handle.is_finished(), "sweeper should exit once the cache is gone");
    }

    #[tokio::test]
    async fn test_sweepers_can_be_aborted() {
        let cache = cache_with(CacheConfig::default());
        let handles = spawn_sweepers(&cache);

        handles.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(handles.is_finished(), "tasks should be finished after abort");
    }
}

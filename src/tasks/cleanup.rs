//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired local cache entries.
//! Reads already ignore expired entries; the sweep only reclaims memory.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::LocalCache;

/// Spawns a background task that periodically cleans up expired entries.
///
/// The task sleeps for `interval` between runs. Each run takes the cache's
/// shard locks one at a time, so readers are only blocked for one shard's
/// sweep.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(LocalCache::<String>::new(config));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: Arc<LocalCache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        info!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "Starting TTL cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.cleanup_expired();

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

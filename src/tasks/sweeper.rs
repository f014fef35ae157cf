//! Expiry Sweeper Task
//!
//! Background task that periodically removes expired cache entries and
//! rewrites the stats file.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task runs in an infinite loop, sleeping for `interval` between
/// passes. Each pass goes through `Cache::sweep_expired`, the same removal
/// path as `delete`, then persists the counters.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Cache::open(CacheConfig::default()).await?;
/// let sweeper = spawn_sweeper_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_sweeper_task(cache: Cache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiry sweeper with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep_expired().await;
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }

            if let Err(e) = cache.persist_stats().await {
                warn!("Expiry sweep: could not persist stats: {}", e);
            }
        }
    })
}

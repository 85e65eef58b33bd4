//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries and idle
//! rate limit windows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::CacheManager;
use crate::clock::duration_ms;
use crate::ratelimit::RateLimiter;
use crate::tasks::handle::{stopped, BackgroundTask};

/// Spawns the periodic sweep.
///
/// The first sweep runs one full interval after spawning. Sweeps never run
/// on the request path.
///
/// # Example
/// ```ignore
/// let task = spawn_cleanup_task(cache.clone(), limiter.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// task.shutdown().await;
/// ```
pub fn spawn_cleanup_task(
    cache: Arc<CacheManager>,
    limiter: Arc<RateLimiter>,
    every: Duration,
) -> BackgroundTask {
    let (tx, mut rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(interval_ms = duration_ms(every), "starting expiry sweep task");
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stopped(&mut rx) => break,
                _ = ticker.tick() => {
                    let entries = cache.cleanup_expired().await;
                    let windows = limiter.cleanup().await;
                    if entries > 0 || windows > 0 {
                        info!(entries, windows, "expiry sweep removed stale state");
                    } else {
                        debug!("expiry sweep found nothing to remove");
                    }
                }
            }
        }
    });

    BackgroundTask::new("expiry-sweep", tx, handle)
}

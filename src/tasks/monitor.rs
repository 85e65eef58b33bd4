//! Monitor Polling Task
//!
//! Drives the performance monitor's sampling cycle on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::clock::duration_ms;
use crate::monitor::PerformanceMonitor;
use crate::tasks::handle::{stopped, BackgroundTask};

/// Spawns the polling loop. The first sample is taken immediately.
pub fn spawn_monitor_task(monitor: Arc<PerformanceMonitor>, every: Duration) -> BackgroundTask {
    let (tx, mut rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(interval_ms = duration_ms(every), "starting performance monitor task");
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stopped(&mut rx) => break,
                _ = ticker.tick() => {
                    monitor.poll().await;
                }
            }
        }
    });

    BackgroundTask::new("performance-monitor", tx, handle)
}

//! Background Tasks Module
//!
//! Periodic loops that run beside request handling.
//!
//! # Tasks
//! - Expiry sweep: removes expired cache entries and idle rate limit windows
//! - Monitor polling: records performance samples and evaluates alerts

mod cleanup;
mod handle;
mod monitor;

pub use cleanup::spawn_cleanup_task;
pub use handle::BackgroundTask;
pub use monitor::spawn_monitor_task;

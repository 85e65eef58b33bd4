//! Perf Layer - in-process performance management
//!
//! A multi-layer TTL cache, a sliding-window rate limiter, a cache-aside
//! query optimizer and a sampling performance monitor, shared across request
//! handlers within one process.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod optimizer;
pub mod ratelimit;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{CacheManager, LayerConfig};
pub use config::Config;
pub use error::{LayerError, Result};
pub use monitor::{PerformanceMonitor, RequestRecorder};
pub use optimizer::QueryOptimizer;
pub use ratelimit::{RateLimitRule, RateLimiter, RequestIdentity};
pub use tasks::{spawn_cleanup_task, spawn_monitor_task, BackgroundTask};

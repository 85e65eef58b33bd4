//! Performance Monitoring Module
//!
//! Samples cache, limiter, request and process counters on a fixed cadence,
//! keeps a rolling history and evaluates alert thresholds.

mod alert;
mod performance;
mod recommend;
mod recorder;
mod resources;
mod sample;

pub use alert::{evaluate_all, Alert, AlertThreshold, Comparison, Severity};
pub use performance::{
    compute_trends, DashboardSnapshot, MonitorConfig, MonitorState, PerformanceMonitor, Trend,
    TrendDirection, DEFAULT_HISTORY_RETENTION,
};
pub use recommend::{recommend, RecommendationLimits};
pub use recorder::{RequestRecorder, DEFAULT_RESPONSE_WINDOW};
pub use resources::{ProcfsProbe, ResourceProbe, ResourceUsage, StaticProbe};
pub use sample::{Metric, PerformanceSample};

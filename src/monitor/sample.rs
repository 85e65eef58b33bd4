//! Performance samples and the metrics they carry.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Metric ==
/// Metrics tracked per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ResponseTime,
    MemoryUsage,
    CpuSeconds,
    RequestsPerSec,
    ErrorRate,
    CacheHitRatio,
    RateLimitRejection,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::ResponseTime,
        Metric::MemoryUsage,
        Metric::CpuSeconds,
        Metric::RequestsPerSec,
        Metric::ErrorRate,
        Metric::CacheHitRatio,
        Metric::RateLimitRejection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::ResponseTime => "response_time_ms",
            Metric::MemoryUsage => "memory_usage_pct",
            Metric::CpuSeconds => "cpu_seconds",
            Metric::RequestsPerSec => "requests_per_sec",
            Metric::ErrorRate => "error_rate_pct",
            Metric::CacheHitRatio => "cache_hit_ratio_pct",
            Metric::RateLimitRejection => "rate_limit_rejection_pct",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// == Performance Sample ==
/// One polling-interval snapshot. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSample {
    pub timestamp: DateTime<Utc>,
    pub avg_response_time_ms: f64,
    pub memory_usage_pct: f64,
    pub cpu_seconds: f64,
    pub requests_per_sec: f64,
    pub error_rate_pct: f64,
    pub cache_hit_ratio_pct: f64,
    pub rate_limit_rejection_pct: f64,
    /// Cache operations seen so far; a zero here makes the hit ratio meaningless
    pub cache_total_ops: u64,
    pub cache_entries: usize,
}

impl PerformanceSample {
    /// A sample with every metric at zero.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            avg_response_time_ms: 0.0,
            memory_usage_pct: 0.0,
            cpu_seconds: 0.0,
            requests_per_sec: 0.0,
            error_rate_pct: 0.0,
            cache_hit_ratio_pct: 0.0,
            rate_limit_rejection_pct: 0.0,
            cache_total_ops: 0,
            cache_entries: 0,
        }
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::ResponseTime => self.avg_response_time_ms,
            Metric::MemoryUsage => self.memory_usage_pct,
            Metric::CpuSeconds => self.cpu_seconds,
            Metric::RequestsPerSec => self.requests_per_sec,
            Metric::ErrorRate => self.error_rate_pct,
            Metric::CacheHitRatio => self.cache_hit_ratio_pct,
            Metric::RateLimitRejection => self.rate_limit_rejection_pct,
        }
    }
}

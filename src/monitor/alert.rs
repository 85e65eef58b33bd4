//! Alert thresholds and the transient alerts they raise.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::monitor::{Metric, PerformanceSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Which side of the threshold is a breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Above,
    Below,
}

// == Alert Threshold ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertThreshold {
    pub metric: Metric,
    pub threshold: f64,
    pub comparison: Comparison,
    pub severity: Severity,
}

impl AlertThreshold {
    pub fn above(metric: Metric, threshold: f64, severity: Severity) -> Self {
        Self {
            metric,
            threshold,
            comparison: Comparison::Above,
            severity,
        }
    }

    pub fn below(metric: Metric, threshold: f64, severity: Severity) -> Self {
        Self {
            metric,
            threshold,
            comparison: Comparison::Below,
            severity,
        }
    }

    /// Stock thresholds: slow responses, high memory, high error rate and a
    /// poor cache hit ratio.
    pub fn defaults() -> Vec<AlertThreshold> {
        vec![
            Self::above(Metric::ResponseTime, 1000.0, Severity::Warning),
            Self::above(Metric::MemoryUsage, 85.0, Severity::Critical),
            Self::above(Metric::ErrorRate, 5.0, Severity::Critical),
            Self::below(Metric::CacheHitRatio, 70.0, Severity::Warning),
        ]
    }

    // == Evaluate ==
    /// Returns an alert when `sample` breaches this threshold.
    ///
    /// A hit-ratio threshold is skipped until the cache has served at least
    /// one operation.
    pub fn evaluate(&self, sample: &PerformanceSample) -> Option<Alert> {
        if self.metric == Metric::CacheHitRatio && sample.cache_total_ops == 0 {
            return None;
        }

        let value = sample.value(self.metric);
        let breached = match self.comparison {
            Comparison::Above => value > self.threshold,
            Comparison::Below => value < self.threshold,
        };
        if !breached {
            return None;
        }

        let side = match self.comparison {
            Comparison::Above => "above",
            Comparison::Below => "below",
        };
        Some(Alert {
            metric: self.metric,
            value,
            threshold: self.threshold,
            severity: self.severity,
            message: format!(
                "{} is {:.2}, {} threshold {:.2}",
                self.metric, value, side, self.threshold
            ),
            raised_at: sample.timestamp,
        })
    }
}

// == Alert ==
/// A threshold breach. Surfaced through logs and the dashboard, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Checks every threshold against `sample`, most severe alerts first.
pub fn evaluate_all(thresholds: &[AlertThreshold], sample: &PerformanceSample) -> Vec<Alert> {
    let mut alerts: Vec<Alert> = thresholds.iter().filter_map(|t| t.evaluate(sample)).collect();
    alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
    alerts
}

//! Advisory text derived from the latest sample. Pure functions only.

use crate::monitor::PerformanceSample;

/// Levels past which a recommendation is produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationLimits {
    pub response_time_ms: f64,
    pub memory_usage_pct: f64,
    pub min_cache_hit_ratio_pct: f64,
    pub error_rate_pct: f64,
    pub rate_limit_rejection_pct: f64,
}

impl Default for RecommendationLimits {
    fn default() -> Self {
        Self {
            response_time_ms: 500.0,
            memory_usage_pct: 80.0,
            min_cache_hit_ratio_pct: 80.0,
            error_rate_pct: 2.0,
            rate_limit_rejection_pct: 10.0,
        }
    }
}

/// Recommendations for `sample`, in a fixed order.
pub fn recommend(sample: &PerformanceSample, limits: &RecommendationLimits) -> Vec<String> {
    let mut out = Vec::new();

    if sample.avg_response_time_ms > limits.response_time_ms {
        out.push(format!(
            "Average response time is {:.0}ms; cache more read paths or lengthen TTLs on hot query results",
            sample.avg_response_time_ms
        ));
    }
    if sample.memory_usage_pct > limits.memory_usage_pct {
        out.push(format!(
            "Memory usage is {:.1}%; lower max entries on large layers or shorten their TTLs",
            sample.memory_usage_pct
        ));
    }
    if sample.cache_total_ops > 0 && sample.cache_hit_ratio_pct < limits.min_cache_hit_ratio_pct {
        out.push(format!(
            "Cache hit ratio is {:.1}%; review key design and TTLs so repeated reads land on the same keys",
            sample.cache_hit_ratio_pct
        ));
    }
    if sample.error_rate_pct > limits.error_rate_pct {
        out.push(format!(
            "Error rate is {:.1}%; check failing backends before they push load onto uncached paths",
            sample.error_rate_pct
        ));
    }
    if sample.rate_limit_rejection_pct > limits.rate_limit_rejection_pct {
        out.push(format!(
            "{:.1}% of checks hit a rate limit; inspect top offenders or revisit rule limits",
            sample.rate_limit_rejection_pct
        ));
    }

    out
}

//! Performance monitor: periodic sampling, alert evaluation, trends,
//! recommendations and the dashboard snapshot.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::{CacheManager, CacheStatsSnapshot};
use crate::monitor::{
    evaluate_all, recommend, Alert, AlertThreshold, Metric, PerformanceSample, ProcfsProbe,
    RecommendationLimits, RequestRecorder, ResourceProbe, Severity,
};
use crate::ratelimit::{Offender, RateLimiter, RateLimiterStats};

/// Default history window.
pub const DEFAULT_HISTORY_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Changes smaller than this (in percent) count as stable.
const STABLE_BAND_PCT: f64 = 1.0;

const TOP_OFFENDERS: usize = 10;

// == Monitor State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Sampling,
    Evaluating,
}

// == Monitor Config ==
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub thresholds: Vec<AlertThreshold>,
    pub history_retention: Duration,
    pub recommendation_limits: RecommendationLimits,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            thresholds: AlertThreshold::defaults(),
            history_retention: DEFAULT_HISTORY_RETENTION,
            recommendation_limits: RecommendationLimits::default(),
        }
    }
}

// == Trend ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Change of one metric between the two most recent samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub metric: Metric,
    pub direction: TrendDirection,
    pub change_pct: f64,
}

/// Per-metric trends; every metric is "stable / 0%" with fewer than two
/// samples.
pub fn compute_trends(previous: Option<&PerformanceSample>, current: Option<&PerformanceSample>) -> Vec<Trend> {
    Metric::ALL
        .iter()
        .map(|&metric| {
            let change_pct = match (previous, current) {
                (Some(prev), Some(cur)) => percent_change(prev.value(metric), cur.value(metric)),
                _ => 0.0,
            };
            let direction = if change_pct.abs() < STABLE_BAND_PCT {
                TrendDirection::Stable
            } else if change_pct > 0.0 {
                TrendDirection::Up
            } else {
                TrendDirection::Down
            };
            Trend {
                metric,
                direction,
                change_pct,
            }
        })
        .collect()
}

fn percent_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        if current == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

// == Dashboard Snapshot ==
/// Read-only view for an operational endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub state: MonitorState,
    pub current: Option<PerformanceSample>,
    pub cache: CacheStatsSnapshot,
    pub cache_layers: BTreeMap<String, CacheStatsSnapshot>,
    pub rate_limiter: RateLimiterStats,
    pub top_offenders: Vec<Offender>,
    pub alerts: Vec<Alert>,
    pub trends: Vec<Trend>,
    pub recommendations: Vec<String>,
    pub samples_retained: usize,
}

impl DashboardSnapshot {
    /// Highest severity among the active alerts.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.alerts.iter().map(|a| a.severity).max()
    }
}

#[derive(Debug, Clone, Copy)]
struct PollMark {
    at_ms: i64,
    total_requests: u64,
}

// == Performance Monitor ==
/// Aggregates cache, limiter, request and process metrics.
///
/// Reads other components' counters only; never mutates them.
#[derive(Debug)]
pub struct PerformanceMonitor {
    cache: Arc<CacheManager>,
    limiter: Arc<RateLimiter>,
    recorder: Arc<RequestRecorder>,
    probe: Box<dyn ResourceProbe>,
    config: MonitorConfig,
    state: RwLock<MonitorState>,
    history: RwLock<VecDeque<PerformanceSample>>,
    alerts: RwLock<Vec<Alert>>,
    last_poll: Mutex<Option<PollMark>>,
}

impl PerformanceMonitor {
    // == Constructor ==
    pub fn new(
        cache: Arc<CacheManager>,
        limiter: Arc<RateLimiter>,
        recorder: Arc<RequestRecorder>,
        config: MonitorConfig,
    ) -> Self {
        Self::with_probe(cache, limiter, recorder, config, Box::new(ProcfsProbe::default()))
    }

    pub fn with_probe(
        cache: Arc<CacheManager>,
        limiter: Arc<RateLimiter>,
        recorder: Arc<RequestRecorder>,
        config: MonitorConfig,
        probe: Box<dyn ResourceProbe>,
    ) -> Self {
        Self {
            cache,
            limiter,
            recorder,
            probe,
            config,
            state: RwLock::new(MonitorState::Idle),
            history: RwLock::new(VecDeque::new()),
            alerts: RwLock::new(Vec::new()),
            last_poll: Mutex::new(None),
        }
    }

    pub fn recorder(&self) -> &Arc<RequestRecorder> {
        &self.recorder
    }

    pub async fn state(&self) -> MonitorState {
        *self.state.read().await
    }

    // == Poll ==
    /// Runs one Sampling -> Evaluating -> Idle cycle and returns the new
    /// sample with the alerts it raised.
    pub async fn poll(&self) -> (PerformanceSample, Vec<Alert>) {
        self.poll_at(Utc::now()).await
    }

    pub async fn poll_at(&self, now: DateTime<Utc>) -> (PerformanceSample, Vec<Alert>) {
        *self.state.write().await = MonitorState::Sampling;
        let sample = self.collect_sample(now).await;
        self.append_sample(sample.clone()).await;

        *self.state.write().await = MonitorState::Evaluating;
        let alerts = evaluate_all(&self.config.thresholds, &sample);
        for alert in &alerts {
            warn!(
                metric = %alert.metric,
                value = alert.value,
                threshold = alert.threshold,
                severity = ?alert.severity,
                "performance alert"
            );
        }
        *self.alerts.write().await = alerts.clone();

        *self.state.write().await = MonitorState::Idle;
        debug!(
            response_ms = sample.avg_response_time_ms,
            hit_ratio = sample.cache_hit_ratio_pct,
            alerts = alerts.len(),
            "performance sample recorded"
        );
        (sample, alerts)
    }

    async fn collect_sample(&self, now: DateTime<Utc>) -> PerformanceSample {
        let cache = self.cache.stats().await;
        let limiter = self.limiter.stats().await;
        let resources = self.probe.read();

        let total_requests = self.recorder.total_requests();
        let now_ms = now.timestamp_millis();
        let requests_per_sec = {
            let mut last = self.last_poll.lock().await;
            let rate = match *last {
                Some(mark) if now_ms > mark.at_ms => {
                    let elapsed_secs = (now_ms - mark.at_ms) as f64 / 1000.0;
                    total_requests.saturating_sub(mark.total_requests) as f64 / elapsed_secs
                }
                _ => 0.0,
            };
            *last = Some(PollMark {
                at_ms: now_ms,
                total_requests,
            });
            rate
        };

        PerformanceSample {
            timestamp: now,
            avg_response_time_ms: self.recorder.average_response_ms(),
            memory_usage_pct: resources.memory_usage_pct,
            cpu_seconds: resources.cpu_seconds,
            requests_per_sec,
            error_rate_pct: self.recorder.error_rate_pct(),
            cache_hit_ratio_pct: cache.hit_ratio,
            rate_limit_rejection_pct: limiter.rejection_rate(),
            cache_total_ops: cache.total_ops,
            cache_entries: cache.total_entries,
        }
    }

    /// Appends and prunes to the retention window. A retention reaching past
    /// the representable time range keeps everything.
    async fn append_sample(&self, sample: PerformanceSample) {
        let floor = chrono::Duration::from_std(self.config.history_retention)
            .ok()
            .and_then(|retention| sample.timestamp.checked_sub_signed(retention));

        let mut history = self.history.write().await;
        history.push_back(sample);
        if let Some(floor) = floor {
            while history.front().is_some_and(|s| s.timestamp < floor) {
                history.pop_front();
            }
        }
    }

    // == Queries ==
    pub async fn latest(&self) -> Option<PerformanceSample> {
        self.history.read().await.back().cloned()
    }

    /// The most recent `last_n` samples, oldest first.
    pub async fn history(&self, last_n: usize) -> Vec<PerformanceSample> {
        let history = self.history.read().await;
        let skip = history.len().saturating_sub(last_n);
        history.iter().skip(skip).cloned().collect()
    }

    /// Alerts raised by the most recent evaluation.
    pub async fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.clone()
    }

    pub async fn trends(&self) -> Vec<Trend> {
        let history = self.history.read().await;
        let n = history.len();
        let previous = if n >= 2 { history.get(n - 2) } else { None };
        compute_trends(previous, history.back())
    }

    pub async fn recommendations(&self) -> Vec<String> {
        match self.latest().await {
            Some(sample) => recommend(&sample, &self.config.recommendation_limits),
            None => Vec::new(),
        }
    }

    // == Dashboard ==
    pub async fn dashboard(&self) -> DashboardSnapshot {
        let current = self.latest().await;
        let recommendations = current
            .as_ref()
            .map(|s| recommend(s, &self.config.recommendation_limits))
            .unwrap_or_default();

        DashboardSnapshot {
            generated_at: Utc::now(),
            state: self.state().await,
            current,
            cache: self.cache.stats().await,
            cache_layers: self.cache.layer_stats().await,
            rate_limiter: self.limiter.stats().await,
            top_offenders: self.limiter.top_offenders(TOP_OFFENDERS).await,
            alerts: self.active_alerts().await,
            trends: self.trends().await,
            recommendations,
            samples_retained: self.history.read().await.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::layer::HOT;
    use crate::monitor::{ResourceUsage, StaticProbe};
    use crate::ratelimit::{KeyStrategy, RateLimitRule, RequestIdentity, DEFAULT_RETENTION};

    struct Fixture {
        cache: Arc<CacheManager>,
        limiter: Arc<RateLimiter>,
        recorder: Arc<RequestRecorder>,
        monitor: PerformanceMonitor,
    }

    fn fixture(memory_pct: f64) -> Fixture {
        let cache = Arc::new(CacheManager::with_defaults());
        let limiter = Arc::new(RateLimiter::new(DEFAULT_RETENTION));
        let recorder = Arc::new(RequestRecorder::default());
        let probe = StaticProbe(ResourceUsage {
            memory_usage_pct: memory_pct,
            cpu_seconds: 2.0,
            resident_bytes: 1 << 20,
        });
        let monitor = PerformanceMonitor::with_probe(
            cache.clone(),
            limiter.clone(),
            recorder.clone(),
            MonitorConfig::default(),
            Box::new(probe),
        );
        Fixture {
            cache,
            limiter,
            recorder,
            monitor,
        }
    }

    #[tokio::test]
    async fn test_huge_history_retention_keeps_samples() {
        let config = MonitorConfig {
            history_retention: Duration::from_secs(10_000_000_000_000),
            ..MonitorConfig::default()
        };
        let monitor = PerformanceMonitor::with_probe(
            Arc::new(CacheManager::with_defaults()),
            Arc::new(RateLimiter::new(DEFAULT_RETENTION)),
            Arc::new(RequestRecorder::default()),
            config,
            Box::new(StaticProbe(ResourceUsage::default())),
        );
        let start = Utc::now();

        monitor.poll_at(start).await;
        monitor.poll_at(start + chrono::Duration::days(400)).await;

        assert_eq!(monitor.history(10).await.len(), 2);
        assert_eq!(monitor.state().await, MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_poll_collects_component_stats() {
        let f = fixture(10.0);
        f.cache.set("k", &1, None, HOT).await.unwrap();
        f.cache.get::<i32>("k", HOT).await;
        f.cache.get::<i32>("missing", HOT).await;
        f.recorder.record_request(Duration::from_millis(40), false);

        let (sample, alerts) = f.monitor.poll().await;

        assert_eq!(sample.cache_hit_ratio_pct, 50.0);
        assert_eq!(sample.cache_entries, 1);
        assert_eq!(sample.memory_usage_pct, 10.0);
        assert!((sample.avg_response_time_ms - 40.0).abs() < 1e-6);
        assert_eq!(alerts.len(), 1, "hit ratio below 70% should alert");
        assert_eq!(alerts[0].metric, Metric::CacheHitRatio);
        assert_eq!(f.monitor.state().await, MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_alerts_are_replaced_each_poll() {
        let f = fixture(95.0);

        let (_, alerts) = f.monitor.poll().await;
        assert_eq!(alerts[0].metric, Metric::MemoryUsage);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(f.monitor.active_alerts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_trends_stable_with_one_sample() {
        let f = fixture(10.0);
        f.monitor.poll().await;

        let trends = f.monitor.trends().await;
        assert_eq!(trends.len(), Metric::ALL.len());
        assert!(trends
            .iter()
            .all(|t| t.direction == TrendDirection::Stable && t.change_pct == 0.0));
    }

    #[tokio::test]
    async fn test_requests_per_sec_between_polls() {
        let f = fixture(10.0);
        let start = Utc::now();
        f.monitor.poll_at(start).await;

        for _ in 0..20 {
            f.recorder.record_request(Duration::from_millis(1), false);
        }
        let (sample, _) = f.monitor.poll_at(start + chrono::Duration::seconds(10)).await;

        assert!((sample.requests_per_sec - 2.0).abs() < 1e-9);
        let trends = f.monitor.trends().await;
        let rps = trends.iter().find(|t| t.metric == Metric::RequestsPerSec).unwrap();
        assert_eq!(rps.direction, TrendDirection::Up);
        assert_eq!(rps.change_pct, 100.0);
    }

    #[tokio::test]
    async fn test_history_pruned_to_retention() {
        let f = fixture(10.0);
        let start = Utc::now();

        f.monitor.poll_at(start).await;
        f.monitor.poll_at(start + chrono::Duration::hours(12)).await;
        f.monitor.poll_at(start + chrono::Duration::hours(25)).await;

        let history = f.monitor.history(10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].timestamp, start + chrono::Duration::hours(12));
        assert_eq!(f.monitor.history(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_dashboard_snapshot() {
        let f = fixture(10.0);
        f.limiter
            .register(RateLimitRule::new("api", Duration::from_secs(60), 1, KeyStrategy::Subject))
            .await;
        let who = RequestIdentity::subject("noisy");
        f.limiter.check("api", &who).await;
        f.limiter.check("api", &who).await;
        f.monitor.poll().await;

        let dash = f.monitor.dashboard().await;

        assert!(dash.current.is_some());
        assert_eq!(dash.cache_layers.len(), 4);
        assert_eq!(dash.rate_limiter.rejected, 1);
        assert_eq!(dash.top_offenders[0].key, "api:noisy");
        assert_eq!(dash.samples_retained, 1);
        assert!(dash.recommendations.iter().any(|r| r.contains("rate limit")));
        assert!(serde_json::to_value(&dash).is_ok());
    }

    #[tokio::test]
    async fn test_dashboard_before_first_poll() {
        let f = fixture(10.0);
        let dash = f.monitor.dashboard().await;

        assert!(dash.current.is_none());
        assert!(dash.alerts.is_empty());
        assert!(dash.recommendations.is_empty());
        assert_eq!(dash.worst_severity(), None);
    }
}

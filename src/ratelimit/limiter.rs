//! Sliding-window rate limiter.
//!
//! Windows live in a `DashMap` keyed by window key. A check holds the entry
//! guard for its key, so the read-prune-decide-append sequence is atomic per
//! key without serializing unrelated keys.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::clock::{current_timestamp_ms, duration_ms};
use crate::ratelimit::{RateLimitDecision, RateLimitRule, RateLimitWindow, RequestIdentity, RuleSummary};

/// Windows idle longer than this are dropped by [`RateLimiter::cleanup`].
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

// == Stats ==
/// Counters exposed to the monitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateLimiterStats {
    pub total_checks: u64,
    pub allowed: u64,
    pub rejected: u64,
    /// Checks against names with no registered rule (admitted)
    pub unregistered: u64,
    pub active_windows: usize,
    pub rules: Vec<RuleSummary>,
}

impl RateLimiterStats {
    /// Rejected checks as a percentage of all checks.
    pub fn rejection_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.rejected as f64 / self.total_checks as f64 * 100.0
        }
    }
}

/// A window key and how many requests it has inside its window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Offender {
    pub key: String,
    pub hits: usize,
}

#[derive(Debug, Default)]
struct Counters {
    total_checks: AtomicU64,
    allowed: AtomicU64,
    rejected: AtomicU64,
    unregistered: AtomicU64,
}

// == Rate Limiter ==
#[derive(Debug)]
pub struct RateLimiter {
    rules: RwLock<HashMap<String, RateLimitRule>>,
    windows: DashMap<String, RateLimitWindow>,
    counters: Counters,
    warned_rules: Mutex<HashSet<String>>,
    retention: Duration,
}

impl RateLimiter {
    // == Constructor ==
    /// Creates a limiter with no rules.
    pub fn new(retention: Duration) -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
            windows: DashMap::new(),
            counters: Counters::default(),
            warned_rules: Mutex::new(HashSet::new()),
            retention,
        }
    }

    /// Creates a limiter with the auth, api and generation rules registered.
    pub fn with_default_rules(retention: Duration) -> Self {
        let rules = RateLimitRule::defaults()
            .into_iter()
            .map(|rule| (rule.name.clone(), rule))
            .collect();
        Self {
            rules: RwLock::new(rules),
            ..Self::new(retention)
        }
    }

    // == Register ==
    /// Adds or replaces a rule by name.
    ///
    /// Replacing a rule keeps existing windows; their timestamps are judged
    /// against the new window and limit from the next check on.
    pub async fn register(&self, rule: RateLimitRule) {
        info!(
            rule = %rule.name,
            window_ms = rule.window_ms(),
            max_requests = rule.max_requests,
            "registered rate limit rule"
        );
        self.rules.write().await.insert(rule.name.clone(), rule);
    }

    pub async fn rule(&self, name: &str) -> Option<RateLimitRule> {
        self.rules.read().await.get(name).cloned()
    }

    // == Check ==
    /// Decides whether the caller may proceed under `rule_name`.
    ///
    /// Never fails. An unregistered rule admits the request and logs a
    /// configuration warning the first time it is seen.
    pub async fn check(&self, rule_name: &str, identity: &RequestIdentity) -> RateLimitDecision {
        self.check_at(rule_name, identity, current_timestamp_ms()).await
    }

    pub async fn check_at(
        &self,
        rule_name: &str,
        identity: &RequestIdentity,
        now: u64,
    ) -> RateLimitDecision {
        self.counters.total_checks.fetch_add(1, Ordering::Relaxed);

        let Some(rule) = self.rule(rule_name).await else {
            self.counters.unregistered.fetch_add(1, Ordering::Relaxed);
            if self.warned_rules.lock().await.insert(rule_name.to_string()) {
                warn!(rule = rule_name, "rate limit rule not registered, admitting request");
            }
            return RateLimitDecision::unenforced();
        };

        let key = rule.window_key(identity);
        let decision = {
            let mut window = self
                .windows
                .entry(key.clone())
                .or_insert_with(|| RateLimitWindow::new(key.clone(), rule.window_ms()));
            window.set_window_ms(rule.window_ms());
            window.try_admit(now, rule.max_requests)
        };

        if decision.allowed {
            self.counters.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, reset_ms = decision.reset_ms, "rate limit exceeded");
        }
        decision
    }

    // == Clear ==
    /// Drops the window stored under `key` (as produced by
    /// [`RateLimitRule::window_key`]). Returns whether one existed.
    pub async fn clear(&self, key: &str) -> bool {
        let removed = self.windows.remove(key).is_some();
        if removed {
            info!(key, "cleared rate limit window");
        }
        removed
    }

    /// Clears the window `identity` maps to under `rule_name`.
    pub async fn reset(&self, rule_name: &str, identity: &RequestIdentity) -> bool {
        match self.rule(rule_name).await {
            Some(rule) => self.clear(&rule.window_key(identity)).await,
            None => false,
        }
    }

    // == Cleanup ==
    /// Drops windows with no timestamp newer than the retention ceiling.
    /// Returns the number of windows removed.
    pub async fn cleanup(&self) -> usize {
        self.cleanup_at(current_timestamp_ms()).await
    }

    pub async fn cleanup_at(&self, now: u64) -> usize {
        let floor = now.saturating_sub(duration_ms(self.retention));
        let mut removed = 0;
        self.windows.retain(|_, window| {
            let keep = window.latest().is_some_and(|t| t >= floor);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    // == Stats ==
    pub async fn stats(&self) -> RateLimiterStats {
        let mut rules: Vec<RuleSummary> = self
            .rules
            .read()
            .await
            .values()
            .map(RateLimitRule::summary)
            .collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));

        RateLimiterStats {
            total_checks: self.counters.total_checks.load(Ordering::Relaxed),
            allowed: self.counters.allowed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            unregistered: self.counters.unregistered.load(Ordering::Relaxed),
            active_windows: self.windows.len(),
            rules,
        }
    }

    // == Top Offenders ==
    /// The `limit` keys with the most requests inside their current window.
    pub async fn top_offenders(&self, limit: usize) -> Vec<Offender> {
        self.top_offenders_at(limit, current_timestamp_ms()).await
    }

    pub async fn top_offenders_at(&self, limit: usize, now: u64) -> Vec<Offender> {
        let mut all: Vec<Offender> = self
            .windows
            .iter()
            .map(|window| Offender {
                key: window.key.clone(),
                hits: window.hits_at(now),
            })
            .filter(|o| o.hits > 0)
            .collect();
        all.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| a.key.cmp(&b.key)));
        all.truncate(limit);
        all
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::with_default_rules(DEFAULT_RETENTION)
    }
}

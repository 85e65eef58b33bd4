//! Sliding window backed by a log of admission timestamps.

use std::collections::VecDeque;

use serde::Serialize;

// == Rate Limit Decision ==
/// Outcome of a single admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Configured `max_requests` of the rule, 0 when no rule applied
    pub limit: u32,
    pub remaining: u32,
    /// Milliseconds until the oldest counted request leaves the window
    pub reset_ms: u64,
    /// Requests counted in the window after this decision
    pub total_hits: u32,
    /// False when the rule was not registered and the request passed unchecked
    pub enforced: bool,
}

impl RateLimitDecision {
    /// Decision for a rule nobody registered.
    pub fn unenforced() -> Self {
        Self {
            allowed: true,
            limit: 0,
            remaining: 0,
            reset_ms: 0,
            total_hits: 0,
            enforced: false,
        }
    }

    /// Whole seconds a rejected caller should wait, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_ms.div_ceil(1000)
    }
}

// == Rate Limit Window ==
/// Admission timestamps for one key, oldest first.
#[derive(Debug, Clone)]
pub struct RateLimitWindow {
    pub key: String,
    window_ms: u64,
    timestamps: VecDeque<u64>,
}

impl RateLimitWindow {
    pub fn new(key: impl Into<String>, window_ms: u64) -> Self {
        Self {
            key: key.into(),
            window_ms,
            timestamps: VecDeque::new(),
        }
    }

    /// Adopts the window length of a replaced rule.
    pub fn set_window_ms(&mut self, window_ms: u64) {
        self.window_ms = window_ms;
    }

    // == Prune ==
    /// Drops timestamps older than `now - window_ms`.
    pub fn prune(&mut self, now: u64) {
        let floor = now.saturating_sub(self.window_ms);
        while self.timestamps.front().is_some_and(|&t| t < floor) {
            self.timestamps.pop_front();
        }
    }

    // == Try Admit ==
    /// Prunes, then admits and records `now` if fewer than `max_requests`
    /// timestamps remain. A rejection leaves the window unchanged.
    pub fn try_admit(&mut self, now: u64, max_requests: u32) -> RateLimitDecision {
        self.prune(now);

        let allowed = (self.timestamps.len() as u64) < u64::from(max_requests);
        if allowed {
            self.timestamps.push_back(now);
        }

        let total_hits = self.timestamps.len() as u32;
        RateLimitDecision {
            allowed,
            limit: max_requests,
            remaining: max_requests.saturating_sub(total_hits),
            reset_ms: self.reset_ms(now),
            total_hits,
            enforced: true,
        }
    }

    /// Time until the oldest retained timestamp exits the window.
    pub fn reset_ms(&self, now: u64) -> u64 {
        self.timestamps
            .front()
            .map(|&oldest| oldest.saturating_add(self.window_ms).saturating_sub(now))
            .unwrap_or(0)
    }

    /// Timestamps currently inside the window, without mutating.
    pub fn hits_at(&self, now: u64) -> usize {
        let floor = now.saturating_sub(self.window_ms);
        self.timestamps.iter().filter(|&&t| t >= floor).count()
    }

    pub fn latest(&self) -> Option<u64> {
        self.timestamps.back().copied()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

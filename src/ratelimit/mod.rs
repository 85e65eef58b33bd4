//! Rate Limiting Module
//!
//! Named rules and per-key sliding windows for admission control.

mod limiter;
mod rule;
mod window;

pub use limiter::{Offender, RateLimiter, RateLimiterStats, DEFAULT_RETENTION};
pub use rule::{KeyStrategy, RateLimitRule, RequestIdentity, RuleSummary};
pub use window::{RateLimitDecision, RateLimitWindow};

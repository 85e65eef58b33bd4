//! Wall-clock helpers shared by the cache, limiter and monitor.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as 0 rather than panicking.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ms)
        .unwrap_or(0)
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

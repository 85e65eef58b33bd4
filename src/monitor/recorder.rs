//! Request timing and error accounting fed by the request boundary.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::current_timestamp_ms;

/// Durations kept for the moving average.
pub const DEFAULT_RESPONSE_WINDOW: usize = 1000;

const MINUTE_MS: u64 = 60_000;

#[derive(Debug, Default, Clone, Copy)]
struct MinuteBucket {
    minute: u64,
    requests: u64,
    errors: u64,
}

// == Request Recorder ==
/// Bounded ring of recent request durations plus per-minute error counts.
#[derive(Debug)]
pub struct RequestRecorder {
    capacity: usize,
    durations: Mutex<VecDeque<f64>>,
    bucket: Mutex<MinuteBucket>,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
}

impl RequestRecorder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            durations: Mutex::new(VecDeque::with_capacity(capacity)),
            bucket: Mutex::new(MinuteBucket::default()),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    // == Record ==
    pub fn record_request(&self, duration: Duration, is_error: bool) {
        self.record_request_at(duration, is_error, current_timestamp_ms());
    }

    pub fn record_request_at(&self, duration: Duration, is_error: bool, now: u64) {
        {
            let mut durations = self.durations.lock();
            if durations.len() == self.capacity {
                durations.pop_front();
            }
            durations.push_back(duration.as_secs_f64() * 1000.0);
        }

        {
            let minute = now / MINUTE_MS;
            let mut bucket = self.bucket.lock();
            if bucket.minute != minute {
                *bucket = MinuteBucket {
                    minute,
                    ..MinuteBucket::default()
                };
            }
            bucket.requests += 1;
            if is_error {
                bucket.errors += 1;
            }
        }

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    // == Derived Metrics ==
    /// Mean of the retained durations in milliseconds, 0 with no data.
    pub fn average_response_ms(&self) -> f64 {
        let durations = self.durations.lock();
        if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        }
    }

    /// errors / requests * 100 for the current minute, 0 when the minute has
    /// no requests yet.
    pub fn error_rate_pct(&self) -> f64 {
        self.error_rate_pct_at(current_timestamp_ms())
    }

    pub fn error_rate_pct_at(&self, now: u64) -> f64 {
        let bucket = *self.bucket.lock();
        if bucket.minute != now / MINUTE_MS || bucket.requests == 0 {
            return 0.0;
        }
        bucket.errors as f64 / bucket.requests as f64 * 100.0
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }
}

impl Default for RequestRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_of_recent_durations() {
        let recorder = RequestRecorder::new(3);
        for ms in [100, 200, 300, 400] {
            recorder.record_request_at(Duration::from_millis(ms), false, 0);
        }

        // 100ms fell out of the ring.
        assert!((recorder.average_response_ms() - 300.0).abs() < 1e-9);
        assert_eq!(recorder.total_requests(), 4);
    }

    #[test]
    fn test_empty_recorder() {
        let recorder = RequestRecorder::default();
        assert_eq!(recorder.average_response_ms(), 0.0);
        assert_eq!(recorder.error_rate_pct_at(0), 0.0);
    }

    #[test]
    fn test_error_rate_for_current_minute() {
        let recorder = RequestRecorder::default();
        recorder.record_request_at(Duration::from_millis(5), true, 1_000);
        recorder.record_request_at(Duration::from_millis(5), false, 2_000);
        recorder.record_request_at(Duration::from_millis(5), false, 3_000);
        recorder.record_request_at(Duration::from_millis(5), false, 4_000);

        assert_eq!(recorder.error_rate_pct_at(5_000), 25.0);
        assert_eq!(recorder.total_errors(), 1);
    }

    #[test]
    fn test_error_bucket_rolls_over() {
        let recorder = RequestRecorder::default();
        recorder.record_request_at(Duration::from_millis(5), true, 1_000);

        assert_eq!(recorder.error_rate_pct_at(61_000), 0.0);

        recorder.record_request_at(Duration::from_millis(5), false, 61_000);
        assert_eq!(recorder.error_rate_pct_at(61_500), 0.0);
    }

    #[test]
    fn test_recording_survives_a_panicking_thread() {
        let recorder = std::sync::Arc::new(RequestRecorder::new(10));
        recorder.record_request_at(Duration::from_millis(10), false, 1_000);

        let held = recorder.clone();
        let result = std::thread::spawn(move || {
            let _guard = held.durations.lock();
            panic!("handler crashed while recording");
        })
        .join();
        assert!(result.is_err());

        recorder.record_request_at(Duration::from_millis(30), true, 2_000);
        assert!((recorder.average_response_ms() - 20.0).abs() < 1e-9);
        assert_eq!(recorder.error_rate_pct_at(3_000), 50.0);
    }
}

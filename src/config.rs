//! Configuration Module
//!
//! Loads layer sizing, sweep cadence and server settings from environment
//! variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::LayerConfig;
use crate::monitor::{MonitorConfig, DEFAULT_RESPONSE_WINDOW};

/// Runtime configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Interval in seconds between expiry sweeps
    pub cleanup_interval: u64,
    /// Interval in seconds between monitor samples
    pub monitor_interval: u64,
    /// Seconds of sample history kept by the monitor
    pub history_retention: u64,
    /// Seconds an idle rate limit window is kept
    pub rate_limit_retention: u64,
    /// Request durations averaged for the response time metric
    pub response_window: usize,
    /// Whether `x-forwarded-for` and `x-user-id` come from a trusted proxy
    pub trust_proxy_headers: bool,
    /// Cache layers
    pub layers: Vec<LayerConfig>,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `MONITOR_INTERVAL` - Sampling frequency in seconds (default: 30)
    /// - `HISTORY_RETENTION` - Sample history in seconds (default: 86400)
    /// - `RATE_LIMIT_RETENTION` - Idle window retention in seconds (default: 86400)
    /// - `RESPONSE_WINDOW` - Durations kept for averaging (default: 1000)
    /// - `TRUST_PROXY_HEADERS` - Key rate limits on forwarding headers (default: false)
    /// - `CACHE_<LAYER>_TTL` / `CACHE_<LAYER>_MAX_ENTRIES` - per-layer overrides,
    ///   e.g. `CACHE_HOT_TTL=7200`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let layers = defaults
            .layers
            .into_iter()
            .map(|layer| {
                let prefix = format!("CACHE_{}", layer.name.to_uppercase());
                let ttl = env_or(&format!("{}_TTL", prefix), layer.default_ttl.as_secs());
                let max_entries = env_or(&format!("{}_MAX_ENTRIES", prefix), layer.max_entries);
                LayerConfig::new(layer.name, Duration::from_secs(ttl), max_entries)
            })
            .collect();

        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            monitor_interval: env_or("MONITOR_INTERVAL", defaults.monitor_interval),
            history_retention: env_or("HISTORY_RETENTION", defaults.history_retention),
            rate_limit_retention: env_or("RATE_LIMIT_RETENTION", defaults.rate_limit_retention),
            response_window: env_or("RESPONSE_WINDOW", defaults.response_window),
            trust_proxy_headers: env_or("TRUST_PROXY_HEADERS", defaults.trust_proxy_headers),
            layers,
        }
    }

    pub fn cleanup_every(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval.max(1))
    }

    pub fn monitor_every(&self) -> Duration {
        Duration::from_secs(self.monitor_interval.max(1))
    }

    pub fn rate_limit_retention(&self) -> Duration {
        Duration::from_secs(self.rate_limit_retention)
    }

    /// Monitor settings with the default thresholds and this retention.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            history_retention: Duration::from_secs(self.history_retention),
            ..MonitorConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 60,
            monitor_interval: 30,
            history_retention: 24 * 60 * 60,
            rate_limit_retention: 24 * 60 * 60,
            response_window: DEFAULT_RESPONSE_WINDOW,
            trust_proxy_headers: false,
            layers: LayerConfig::defaults(),
        }
    }
}

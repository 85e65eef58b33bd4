//! Layer Configuration Module
//!
//! Each layer is an independently sized and timed cache region.

use std::time::Duration;

use serde::Serialize;

/// Long-lived lookups (users, settings, reference data).
pub const HOT: &str = "hot";
/// Results of read-heavy queries.
pub const QUERY: &str = "query";
/// Per-session state.
pub const SESSION: &str = "session";
/// Aggregates and report rollups; stale quickly.
pub const ANALYTICS: &str = "analytics";

// == Layer Config ==
/// TTL and capacity policy for one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerConfig {
    /// Layer name used for lookups
    pub name: String,
    /// TTL applied when a write doesn't specify one
    pub default_ttl: Duration,
    /// Maximum resident entries (at least 1)
    pub max_entries: usize,
}

impl LayerConfig {
    pub fn new(name: impl Into<String>, default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            name: name.into(),
            default_ttl,
            max_entries: max_entries.max(1),
        }
    }

    // == Default Layers ==
    /// The stock layer set: hot, query, session and analytics.
    pub fn defaults() -> Vec<LayerConfig> {
        vec![
            LayerConfig::new(HOT, Duration::from_secs(3600), 10_000),
            LayerConfig::new(QUERY, Duration::from_secs(600), 5_000),
            LayerConfig::new(SESSION, Duration::from_secs(1800), 2_000),
            LayerConfig::new(ANALYTICS, Duration::from_secs(300), 1_000),
        ]
    }
}

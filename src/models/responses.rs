//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStatsSnapshot;
use crate::ratelimit::RateLimiterStats;

/// Response body for `GET /cache/:layer/:key`
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub layer: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, layer: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            layer: layer.into(),
            value,
        }
    }
}

/// Response body for `PUT /cache/:layer`
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    pub key: String,
    pub layer: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, layer: impl Into<String>) -> Self {
        let key = key.into();
        let layer = layer.into();
        Self {
            message: format!("Key '{}' set in layer '{}'", key, layer),
            key,
            layer,
        }
    }
}

/// Response body for `DELETE /cache/:layer/:key`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub key: String,
    pub layer: String,
    /// Entries removed, 0 or 1
    pub deleted: usize,
}

/// Response body for `POST /cache/invalidate`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub pattern: String,
    pub removed: usize,
}

/// Response body for the stats endpoint (`GET /stats`)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Aggregate over all layers
    pub cache: CacheStatsSnapshot,
    pub layers: BTreeMap<String, CacheStatsSnapshot>,
    pub rate_limiter: RateLimiterStats,
}

/// Response body for the health endpoint (`GET /health`)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

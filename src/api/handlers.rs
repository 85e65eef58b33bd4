//! API Handlers
//!
//! HTTP request handlers for the admin endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::CacheManager;
use crate::config::Config;
use crate::error::{LayerError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, InvalidateRequest, InvalidateResponse,
    SetRequest, SetResponse, StatsResponse,
};
use crate::monitor::{DashboardSnapshot, PerformanceMonitor, RequestRecorder};
use crate::ratelimit::RateLimiter;

/// Application state shared across all handlers.
///
/// Every component is behind an `Arc` and synchronizes internally, so
/// handlers never take a state-wide lock.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
    pub limiter: Arc<RateLimiter>,
    pub recorder: Arc<RequestRecorder>,
    pub monitor: Arc<PerformanceMonitor>,
    /// Key rate limits on forwarding headers set by a proxy
    pub trust_proxy_headers: bool,
}

impl AppState {
    /// Creates a new AppState around an existing monitor.
    ///
    /// The recorder is taken from the monitor so timed requests show up in
    /// its samples.
    pub fn new(
        cache: Arc<CacheManager>,
        limiter: Arc<RateLimiter>,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            cache,
            limiter,
            recorder: monitor.recorder().clone(),
            monitor,
            trust_proxy_headers: false,
        }
    }

    /// Honours `x-forwarded-for` and the subject header when rate limiting.
    /// Only enable behind a proxy that overwrites both.
    pub fn with_trusted_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the configured cache layers, a limiter with the default rules
    /// and a monitor wired to both.
    pub fn from_config(config: &Config) -> Self {
        let cache = Arc::new(CacheManager::new(config.layers.clone()));
        let limiter = Arc::new(RateLimiter::with_default_rules(config.rate_limit_retention()));
        let recorder = Arc::new(RequestRecorder::new(config.response_window));
        let monitor = Arc::new(PerformanceMonitor::new(
            cache.clone(),
            limiter.clone(),
            recorder,
            config.monitor_config(),
        ));
        Self::new(cache, limiter, monitor).with_trusted_proxy(config.trust_proxy_headers)
    }

    fn require_layer(&self, layer: &str) -> Result<()> {
        if self.cache.has_layer(layer) {
            Ok(())
        } else {
            Err(LayerError::UnknownLayer(layer.to_string()))
        }
    }
}

/// Handler for PUT /cache/:layer
///
/// Stores a JSON value in the layer with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(layer): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(LayerError::InvalidRequest(error_msg));
    }
    state.require_layer(&layer)?;

    let ttl = req.ttl.map(Duration::from_secs);
    state.cache.set(&req.key, &req.value, ttl, &layer).await?;

    Ok(Json(SetResponse::new(req.key, layer)))
}

/// Handler for GET /cache/:layer/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path((layer, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    state.require_layer(&layer)?;

    let value: Value = state
        .cache
        .get(&key, &layer)
        .await
        .ok_or_else(|| LayerError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, layer, value)))
}

/// Handler for DELETE /cache/:layer/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((layer, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    state.require_layer(&layer)?;

    let deleted = state.cache.delete(&key, &layer).await;
    if deleted == 0 {
        return Err(LayerError::NotFound(key));
    }

    Ok(Json(DeleteResponse { key, layer, deleted }))
}

/// Handler for POST /cache/invalidate
///
/// Removes every key containing the pattern, in one layer or all of them.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if req.pattern.is_empty() {
        return Err(LayerError::InvalidRequest(
            "Pattern cannot be empty".to_string(),
        ));
    }
    if let Some(layer) = req.layer.as_deref() {
        state.require_layer(layer)?;
    }

    let removed = state
        .cache
        .invalidate_pattern(&req.pattern, req.layer.as_deref())
        .await;

    Ok(Json(InvalidateResponse {
        pattern: req.pattern,
        removed,
    }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        cache: state.cache.stats().await,
        layers: state.cache.layer_stats().await,
        rate_limiter: state.limiter.stats().await,
    })
}

/// Handler for GET /dashboard
pub async fn dashboard_handler(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.monitor.dashboard().await)
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

//! API Routes
//!
//! Configures the Axum router with the admin endpoints and middleware.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    dashboard_handler, delete_handler, get_handler, health_handler, invalidate_handler,
    set_handler, stats_handler, AppState,
};
use super::middleware::{rate_limit, record_timing};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /cache/:layer` - Store a JSON value in a layer
/// - `GET /cache/:layer/:key` - Retrieve a value
/// - `DELETE /cache/:layer/:key` - Delete a key
/// - `POST /cache/invalidate` - Remove keys containing a pattern
/// - `GET /stats` - Cache and rate limiter statistics
/// - `GET /dashboard` - Monitor snapshot
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - Rate limiting: the `api` rule guards everything except `/health`
/// - Timing: every request is recorded for the monitor
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/cache/:layer", put(set_handler))
        .route(
            "/cache/:layer/:key",
            get(get_handler).delete(delete_handler),
        )
        .route("/stats", get(stats_handler))
        .route("/dashboard", get(dashboard_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(state.clone(), record_timing))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

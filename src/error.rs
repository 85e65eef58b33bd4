//! Error types for the performance layer
//!
//! Read paths (cache lookups, cache-aside fetches, rate-limit checks) never
//! surface these; they degrade to a miss or fail open. Errors are reserved for
//! rejected caller input on write paths and for the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Layer Error Enum ==
/// Unified error type for the performance layer.
#[derive(Error, Debug)]
pub enum LayerError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Named cache layer does not exist
    #[error("Unknown cache layer: {0}")]
    UnknownLayer(String),

    /// Value could not be encoded for storage
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Caller exceeded a rate limit rule
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for LayerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LayerError::NotFound(_) => StatusCode::NOT_FOUND,
            LayerError::UnknownLayer(_) => StatusCode::NOT_FOUND,
            LayerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            LayerError::Serialization(_) => StatusCode::BAD_REQUEST,
            LayerError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            LayerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the performance layer.
pub type Result<T> = std::result::Result<T, LayerError>;

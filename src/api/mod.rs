//! API Module
//!
//! A thin admin surface over the performance layer.
//!
//! # Endpoints
//! - `PUT /cache/:layer` - Store a JSON value
//! - `GET /cache/:layer/:key` - Retrieve a value by key
//! - `DELETE /cache/:layer/:key` - Delete a key
//! - `POST /cache/invalidate` - Pattern invalidation
//! - `GET /stats` - Cache and limiter statistics
//! - `GET /dashboard` - Monitor snapshot
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use middleware::{identity_of, API_RULE, SUBJECT_HEADER};
pub use routes::create_router;

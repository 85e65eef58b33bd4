//! Request middleware: admission control and request timing.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::handlers::AppState;
use crate::error::LayerError;
use crate::ratelimit::{RateLimitDecision, RequestIdentity};

/// Rule applied to every rate-limited route.
pub const API_RULE: &str = "api";

/// Header carrying the authenticated caller, set by a trusted proxy.
pub const SUBJECT_HEADER: &str = "x-user-id";

static LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Builds the limiter identity from the peer address and the matched route.
///
/// `x-forwarded-for` and the subject header are client-controlled, so they
/// are read only when `trust_proxy_headers` says a proxy in front of this
/// service sets them. Otherwise the address comes from `ConnectInfo` alone
/// and the subject stays unset.
pub fn identity_of(request: &Request, trust_proxy_headers: bool) -> RequestIdentity {
    let mut identity = RequestIdentity::new();

    let forwarded = if trust_proxy_headers {
        request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    } else {
        None
    };
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    if let Some(address) = forwarded.or(peer) {
        identity = identity.with_address(address);
    }

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    identity = identity.with_route(format!("{} {}", request.method(), route));

    if trust_proxy_headers {
        if let Some(subject) = request
            .headers()
            .get(SUBJECT_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            identity = identity.with_subject(subject);
        }
    }

    identity
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(LIMIT_HEADER.clone(), HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER.clone(), HeaderValue::from(decision.remaining));
    headers.insert(
        RESET_HEADER.clone(),
        HeaderValue::from(decision.retry_after_secs()),
    );
}

/// Checks the `api` rule before the handler runs.
///
/// Rejections short-circuit with 429 and a `retry-after` header. When the
/// rule isn't registered the request passes without rate limit headers.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let identity = identity_of(&request, state.trust_proxy_headers);
    let decision = state.limiter.check(API_RULE, &identity).await;

    if !decision.enforced {
        return next.run(request).await;
    }

    if !decision.allowed {
        debug!(route = ?identity.route, address = ?identity.source_address, "request rate limited");
        let mut response = LayerError::RateLimited(format!(
            "retry in {} seconds",
            decision.retry_after_secs()
        ))
        .into_response();
        let headers = response.headers_mut();
        apply_rate_limit_headers(headers, &decision);
        headers.insert(RETRY_AFTER, HeaderValue::from(decision.retry_after_secs()));
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Feeds every request's duration and outcome to the monitor's recorder.
///
/// Only server errors count toward the error rate.
pub async fn record_timing(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    state
        .recorder
        .record_request(started.elapsed(), response.status().is_server_error());
    response
}

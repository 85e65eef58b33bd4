//! Talks to a real listener over HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use perf_layer::ratelimit::KeyStrategy;
use perf_layer::{create_router, spawn_cleanup_task, AppState, Config, RateLimitRule};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio::net::TcpListener;

/// Serves the router on an ephemeral port and returns its base URL.
async fn start_test_server(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);

    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_cache_roundtrip_over_http() {
    let base = start_test_server(AppState::from_config(&Config::default())).await;
    let client = Client::new();

    let response = client
        .put(format!("{}/cache/query", base))
        .json(&json!({"key": "top_posts", "value": [1, 2, 3], "ttl": 60}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(format!("{}/cache/query/top_posts", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["value"], json!([1, 2, 3]));
}

#[tokio::test]
async fn test_rate_limit_by_peer_address() {
    let state = AppState::from_config(&Config::default());
    state
        .limiter
        .register(RateLimitRule::new(
            "api",
            Duration::from_secs(60),
            3,
            KeyStrategy::SourceAddress,
        ))
        .await;
    let base = start_test_server(state.clone()).await;
    let client = Client::new();

    let mut statuses = Vec::new();
    let mut retry_after = None;
    for _ in 0..4 {
        let response = client
            .get(format!("{}/stats", base))
            .send()
            .await
            .unwrap();
        statuses.push(response.status());
        retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
    }

    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );
    assert!(matches!(retry_after, Some(secs) if (1..=60).contains(&secs)));

    let offenders = state.limiter.top_offenders(1).await;
    assert_eq!(offenders[0].key, "api:127.0.0.1");

    // Health stays reachable while the caller is limited
    let response = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_background_sweep_with_live_server() {
    let state = AppState::from_config(&Config::default());
    let sweep = spawn_cleanup_task(
        state.cache.clone(),
        state.limiter.clone(),
        Duration::from_millis(200),
    );
    let base = start_test_server(state.clone()).await;
    let client = Client::new();

    client
        .put(format!("{}/cache/session", base))
        .json(&json!({"key": "sess:1", "value": {"user": 1}, "ttl": 1}))
        .send()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let stats = state.cache.layer_stats().await;
    assert_eq!(stats["session"].total_entries, 0);
    assert_eq!(stats["session"].expirations, 1);

    sweep.shutdown().await;
}

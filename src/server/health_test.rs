//! Tests for the admin endpoints

use super::*;
use crate::lifecycle::{LifecycleState, Phase};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Start the admin router on an ephemeral port
async fn start_admin(
    lifecycle: LifecycleState,
    metrics: SharedMetrics,
) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind admin listener");
    let addr = listener.local_addr().expect("local addr");
    let shutdown = CancellationToken::new();
    tokio::spawn(serve(
        listener,
        admin_router(lifecycle, metrics),
        shutdown.clone(),
    ));
    (addr, shutdown)
}

async fn get(addr: SocketAddr, path: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("http://{}{}", addr, path))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to connect to admin server")
}

/// Test that /healthz returns 200 in every phase
#[tokio::test]
async fn test_healthz_returns_200() {
    let lifecycle = LifecycleState::new();
    let metrics = create_metrics().expect("create metrics");
    let (addr, shutdown) = start_admin(lifecycle.clone(), metrics).await;

    assert_eq!(get(addr, "/healthz").await.status(), 200);

    lifecycle.advance(Phase::Draining);
    assert_eq!(
        get(addr, "/healthz").await.status(),
        200,
        "Liveness does not depend on the phase"
    );

    shutdown.cancel();
}

/// Test that /readyz tracks the lifecycle phase
#[tokio::test]
async fn test_readyz_follows_lifecycle() {
    let lifecycle = LifecycleState::new();
    let metrics = create_metrics().expect("create metrics");
    let (addr, shutdown) = start_admin(lifecycle.clone(), metrics).await;

    assert_eq!(
        get(addr, "/readyz").await.status(),
        503,
        "Readiness probe should return 503 while starting"
    );

    lifecycle.advance(Phase::Serving);
    assert_eq!(get(addr, "/readyz").await.status(), 200);

    lifecycle.advance(Phase::Draining);
    assert_eq!(
        get(addr, "/readyz").await.status(),
        503,
        "Readiness probe should return 503 while draining"
    );

    shutdown.cancel();
}

/// Test that /metrics returns Prometheus format
#[tokio::test]
async fn test_metrics_returns_prometheus_format() {
    let lifecycle = LifecycleState::new();
    let metrics = create_metrics().expect("create metrics");
    metrics.record_request("backend", 500, 0.002);
    metrics.record_poll_success(true);
    let (addr, shutdown) = start_admin(lifecycle, metrics).await;

    let response = get(addr, "/metrics").await;

    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .expect("should have content-type")
        .to_str()
        .expect("content-type should be string")
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = response.text().await.expect("should have body");
    assert!(body.contains("disaster_requests_total{mode=\"backend\",status=\"500\"} 1"));
    assert!(body.contains("disaster_state 1"));

    shutdown.cancel();
}

/// Test that unknown admin paths are not served
#[tokio::test]
async fn test_admin_unknown_path_is_404() {
    let metrics = create_metrics().expect("create metrics");
    let (addr, shutdown) = start_admin(LifecycleState::new(), metrics).await;

    assert_eq!(get(addr, "/").await.status(), 404);

    shutdown.cancel();
}

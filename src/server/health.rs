//! Probe and metrics endpoints for the admin listener
//!
//! - `/healthz` - Liveness: Is the process alive?
//! - `/readyz` - Readiness: Is the public listener serving?
//! - `/metrics` - Prometheus text exposition

use super::metrics::SharedMetrics;
use crate::lifecycle::LifecycleState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::error;

#[derive(Clone)]
struct AdminState {
    lifecycle: LifecycleState,
    metrics: SharedMetrics,
}

/// Liveness probe handler
///
/// Always returns 200 OK, independent of the disaster flag.
async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler
///
/// Returns 200 OK while serving, 503 while starting or draining.
async fn readyz(State(state): State<AdminState>) -> StatusCode {
    if state.lifecycle.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics_handler(State(state): State<AdminState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Build the admin router
pub fn admin_router(lifecycle: LifecycleState, metrics: SharedMetrics) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(AdminState { lifecycle, metrics })
}

//! HTTP surface
//!
//! - Public listener: one route for every path (see [`app_router`])
//! - Admin listener (optional): `/healthz`, `/readyz`, `/metrics`

mod app;
mod health;
mod history;
mod metrics;
mod page;

pub use app::{
    app_router, backend_reply, backend_url, forwarded_headers, AppState, ProxyError,
    DOWNSTREAM_TIMEOUT, FORWARDED_HEADER_PREFIX,
};
pub use health::admin_router;
pub use history::{HistoryEntry, HistoryRing, SharedHistory};
pub use metrics::{create_metrics, ServiceMetrics, SharedMetrics};
pub use page::{escape_html, StatusPage};

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serve `app` on `listener` until `shutdown` is cancelled
///
/// After cancellation no new connections are accepted and the future
/// resolves once in-flight requests have completed.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
}

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "app_test.rs"]
mod app_tests;

#[cfg(test)]
#[path = "metrics_test.rs"]
mod metrics_tests;

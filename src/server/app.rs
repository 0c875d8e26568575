//! Request handling for the single public route
//!
//! Every path and method lands on the same handler. In backend mode it
//! answers from the disaster flag; in frontend mode it proxies a GET to the
//! backend tier and renders the status page.

use super::history::{HistoryEntry, SharedHistory};
use super::metrics::SharedMetrics;
use super::page::StatusPage;
use crate::config::{Config, Mode};
use crate::disaster::DisasterFlag;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::any,
    Router,
};
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound for a single backend call
pub const DOWNSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Inbound headers with this prefix are copied onto the backend request
pub const FORWARDED_HEADER_PREFIX: &str = "x-";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("backend {addr} request failed: {source}")]
    Downstream {
        addr: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend call aborted by shutdown")]
    Cancelled,
}

/// Pod identity shown in responses
#[derive(Debug, Clone)]
struct Identity {
    pod_name: String,
    node_name: String,
}

/// Frontend-only state: the backend client and the response history
struct Frontend {
    client: reqwest::Client,
    backend_addr: String,
    history: SharedHistory,
    time_format: String,
    refresh_secs: Option<u32>,
    shutdown: CancellationToken,
}

#[derive(Clone)]
enum Tier {
    Backend,
    Frontend(Arc<Frontend>),
}

/// State injected into the request handler
#[derive(Clone)]
pub struct AppState {
    identity: Arc<Identity>,
    flag: DisasterFlag,
    metrics: SharedMetrics,
    tier: Tier,
}

impl AppState {
    /// Build handler state for the mode selected by `config`
    ///
    /// `shutdown` aborts in-flight backend calls so they don't hold the
    /// drain window open.
    pub fn new(
        config: &Config,
        flag: DisasterFlag,
        metrics: SharedMetrics,
        shutdown: CancellationToken,
    ) -> Result<Self, ProxyError> {
        let tier = match config.mode() {
            Mode::Backend => Tier::Backend,
            Mode::Frontend { backend_addr } => {
                let client = reqwest::Client::builder()
                    .timeout(DOWNSTREAM_TIMEOUT)
                    .build()
                    .map_err(ProxyError::ClientBuild)?;
                Tier::Frontend(Arc::new(Frontend {
                    client,
                    backend_addr: backend_addr.trim_end_matches('/').to_string(),
                    history: SharedHistory::new(config.history_size),
                    time_format: config.time_format.clone(),
                    refresh_secs: config.auto_refresh.then_some(config.auto_refresh_interval),
                    shutdown,
                }))
            }
        };

        Ok(Self {
            identity: Arc::new(Identity {
                pod_name: config.pod_name.clone(),
                node_name: config.node_name.clone(),
            }),
            flag,
            metrics,
            tier,
        })
    }

    /// Label used for metrics and logs
    pub fn mode_label(&self) -> &'static str {
        match self.tier {
            Tier::Backend => "backend",
            Tier::Frontend(_) => "frontend",
        }
    }

    /// Frontend response history, newest first (empty in backend mode)
    pub fn history(&self) -> Vec<HistoryEntry> {
        match &self.tier {
            Tier::Backend => Vec::new(),
            Tier::Frontend(frontend) => frontend.history.snapshot(),
        }
    }
}

/// Build the public router: one handler for every path and method
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(handle))
        .route("/{*path}", any(handle))
        .layer(middleware::from_fn_with_state(state.clone(), access_log))
        .with_state(state)
}

async fn handle(State(state): State<AppState>, request: Request) -> Response {
    match &state.tier {
        Tier::Backend => {
            let disaster = state.flag.is_active();
            debug!(disaster, "Disaster annotation exists: {}", disaster);
            backend_reply(&state.identity.pod_name, &state.identity.node_name, disaster)
                .into_response()
        }
        Tier::Frontend(frontend) => {
            let (parts, _body) = request.into_parts();
            frontend_reply(&state, frontend, &parts.uri, &parts.headers).await
        }
    }
}

/// Backend answer for a given disaster state
pub fn backend_reply(pod_name: &str, node_name: &str, disaster: bool) -> (StatusCode, String) {
    if disaster {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{} - I feel bad...\n", node_name),
        )
    } else {
        (StatusCode::OK, format!("{} {}\n", pod_name, node_name))
    }
}

async fn frontend_reply(
    state: &AppState,
    frontend: &Frontend,
    uri: &Uri,
    headers: &HeaderMap,
) -> Response {
    let entry = match frontend.call_backend(uri, headers).await {
        Ok(entry) => entry,
        Err(ProxyError::Cancelled) => {
            info!(backend = %frontend.backend_addr, "Backend call aborted by shutdown");
            return (StatusCode::SERVICE_UNAVAILABLE, "Shutting down\n").into_response();
        }
        Err(e) => {
            error!(backend = %frontend.backend_addr, error = %e, "Can't reach backend");
            return (
                StatusCode::BAD_GATEWAY,
                format!("Can't reach backend {}: {}\n", frontend.backend_addr, e),
            )
                .into_response();
        }
    };

    info!(
        backend = %frontend.backend_addr,
        status = entry.status,
        "Got response from backend"
    );

    let history = frontend.history.record(entry.clone());
    state.metrics.set_history_entries(history.len());

    let page = StatusPage {
        pod_name: &state.identity.pod_name,
        node_name: &state.identity.node_name,
        refresh_secs: frontend.refresh_secs,
        history_size: frontend.history.capacity(),
        last: &entry,
        history: &history,
    };
    Html(page.render()).into_response()
}

impl Frontend {
    /// Issue one GET to the backend and capture the response
    async fn call_backend(
        &self,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<HistoryEntry, ProxyError> {
        let url = backend_url(&self.backend_addr, uri);
        let request = self
            .client
            .get(&url)
            .headers(forwarded_headers(headers));

        let downstream = |source| ProxyError::Downstream {
            addr: self.backend_addr.clone(),
            source,
        };

        let response = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(ProxyError::Cancelled),
            result = request.send() => result.map_err(downstream)?,
        };

        let status = response.status().as_u16();
        let body = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(ProxyError::Cancelled),
            result = response.text() => result.map_err(downstream)?,
        };

        Ok(HistoryEntry {
            timestamp: self.timestamp(),
            status,
            body,
        })
    }

    fn timestamp(&self) -> String {
        let now = chrono::Local::now();
        let mut out = String::new();
        if write!(out, "{}", now.format(&self.time_format)).is_err() {
            warn!(format = %self.time_format, "Invalid time format, using RFC 3339");
            return now.to_rfc3339();
        }
        out
    }
}

/// Backend address joined with the inbound path and query
pub fn backend_url(backend_addr: &str, uri: &Uri) -> String {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("{}{}", backend_addr.trim_end_matches('/'), path)
}

/// Inbound headers that are copied onto the backend request unchanged
pub fn forwarded_headers(inbound: &HeaderMap) -> HeaderMap {
    inbound
        .iter()
        .filter(|(name, _)| name.as_str().starts_with(FORWARDED_HEADER_PREFIX))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Access log and request metrics for the public route
async fn access_log(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let url = request.uri().to_string();
    let headers = request.headers();
    let host = header_str(headers, header::HOST);
    let user_agent = header_str(headers, header::USER_AGENT);
    let content_length = header_str(headers, header::CONTENT_LENGTH);
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    state
        .metrics
        .record_request(state.mode_label(), status, elapsed.as_secs_f64());
    info!(
        url = %url,
        host = %host,
        user_agent = %user_agent,
        method = %method,
        remote_addr = %remote_addr,
        content_length = %content_length,
        status,
        duration = ?elapsed,
        "Handled request"
    );

    response
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

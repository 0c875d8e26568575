//! Process lifecycle: startup, serving, draining, stopped
//!
//! ```text
//! Starting ──bind──▶ Serving ──signal──▶ Draining ──drained / grace expired──▶ Stopped
//! ```
//!
//! The annotation poller and both listeners share one cancellation token.
//! Cancelling it stops accepting connections, aborts in-flight backend calls
//! and ends the poller; the supervisor then waits up to
//! [`SHUTDOWN_GRACE_PERIOD`] for the listeners to drain. The poller task is
//! not joined.

use crate::config::Config;
use crate::disaster::{run_poller, DisasterFlag, MetadataSource, PodMetadata};
use crate::server::{
    self, admin_router, app_router, create_metrics, AppState, ProxyError, SharedMetrics,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long in-flight requests may take to finish after a shutdown signal
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("failed to build Kubernetes client: {0}")]
    KubeClient(#[from] kube::Error),

    #[error("failed to set up request handling: {0}")]
    Proxy(#[from] ProxyError),

    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("in-flight requests did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Lifecycle phase of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Serving = 1,
    Draining = 2,
    Stopped = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Phase::Starting,
            1 => Phase::Serving,
            2 => Phase::Draining,
            _ => Phase::Stopped,
        }
    }
}

/// Shared lifecycle phase
///
/// Phases only move forward; clones share the same phase.
#[derive(Debug, Clone)]
pub struct LifecycleState {
    phase: Arc<AtomicU8>,
}

impl LifecycleState {
    /// Create a new state in [`Phase::Starting`]
    pub fn new() -> Self {
        Self {
            phase: Arc::new(AtomicU8::new(Phase::Starting as u8)),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Move to `phase` unless a later phase was already reached
    pub fn advance(&self, phase: Phase) {
        self.phase.fetch_max(phase as u8, Ordering::SeqCst);
    }

    pub fn is_serving(&self) -> bool {
        self.phase() == Phase::Serving
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a pod metadata source when running inside a cluster
///
/// Outside a cluster there is nothing to poll and the service stays
/// healthy forever. Must be called from within a tokio runtime.
pub fn in_cluster_source(
    config: &Config,
) -> Result<Option<Arc<dyn MetadataSource>>, LifecycleError> {
    let kube_config = match kube::Config::incluster() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Not in cluster, annotation poller disabled");
            return Ok(None);
        }
    };
    let client = kube::Client::try_from(kube_config)?;

    if config.pod_name.is_empty() || config.pod_namespace.is_empty() {
        warn!(
            pod = %config.pod_name,
            namespace = %config.pod_namespace,
            "POD_NAME or POD_NAMESPACE not set, annotation polls will fail"
        );
    }

    Ok(Some(Arc::new(PodMetadata::new(
        client,
        &config.pod_namespace,
        &config.pod_name,
    ))))
}

/// Owns everything the process runs: poller, public and admin listeners
pub struct Supervisor {
    config: Config,
    flag: DisasterFlag,
    metrics: SharedMetrics,
    lifecycle: LifecycleState,
    source: Option<Arc<dyn MetadataSource>>,
}

impl Supervisor {
    pub fn new(config: Config) -> Result<Self, LifecycleError> {
        Ok(Self {
            config,
            flag: DisasterFlag::new(),
            metrics: create_metrics()?,
            lifecycle: LifecycleState::new(),
            source: None,
        })
    }

    /// Poll `source` for the disaster annotation while serving
    pub fn with_metadata_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn flag(&self) -> DisasterFlag {
        self.flag.clone()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle.clone()
    }

    pub fn metrics(&self) -> SharedMetrics {
        self.metrics.clone()
    }

    /// Bind the public listener and, if configured, the admin listener
    ///
    /// Bind failures are fatal startup errors.
    pub async fn bind(self) -> Result<BoundSupervisor, LifecycleError> {
        let listener = bind(&self.config.listen_addr()).await?;
        let admin_listener = match self.config.admin_listen_addr() {
            Some(addr) => Some(bind(&addr).await?),
            None => None,
        };
        Ok(BoundSupervisor {
            supervisor: self,
            listener,
            admin_listener,
        })
    }
}

async fn bind(addr: &str) -> Result<TcpListener, LifecycleError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| LifecycleError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// A supervisor whose listeners are bound but not yet serving
pub struct BoundSupervisor {
    supervisor: Supervisor,
    listener: TcpListener,
    admin_listener: Option<TcpListener>,
}

impl BoundSupervisor {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
    }

    /// Serve until `shutdown` is cancelled, then drain
    ///
    /// Returns `Ok(())` when every listener drained within the grace period.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), LifecycleError> {
        let BoundSupervisor {
            supervisor,
            listener,
            admin_listener,
        } = self;
        let Supervisor {
            config,
            flag,
            metrics,
            lifecycle,
            source,
        } = supervisor;

        let state = AppState::new(
            &config,
            flag.clone(),
            metrics.clone(),
            shutdown.child_token(),
        )?;

        match source {
            Some(source) => {
                // Detached: the poller ends on its own once `shutdown` fires.
                tokio::spawn(run_poller(
                    source,
                    flag,
                    config.poll_interval,
                    metrics.clone(),
                    shutdown.child_token(),
                ));
            }
            None => info!("No metadata source, disaster flag stays off"),
        }

        let addr = listener.local_addr().map_err(LifecycleError::Serve)?;
        info!(address = %addr, mode = state.mode_label(), "Starting http");
        let mut main_task = tokio::spawn(server::serve(
            listener,
            app_router(state),
            shutdown.clone(),
        ));

        let admin_task = admin_listener.map(|admin_listener| {
            if let Ok(admin_addr) = admin_listener.local_addr() {
                info!(address = %admin_addr, "Admin server listening");
            }
            tokio::spawn(server::serve(
                admin_listener,
                admin_router(lifecycle.clone(), metrics),
                shutdown.clone(),
            ))
        });

        lifecycle.advance(Phase::Serving);

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {}
            result = &mut main_task => {
                // Listener ended without a shutdown request
                lifecycle.advance(Phase::Stopped);
                shutdown.cancel();
                if let Some(admin_task) = admin_task {
                    admin_task.abort();
                }
                flatten(result)?;
                return Err(LifecycleError::Serve(std::io::Error::other(
                    "HTTP server exited unexpectedly",
                )));
            }
        }

        lifecycle.advance(Phase::Draining);
        info!(grace_period = ?SHUTDOWN_GRACE_PERIOD, "Draining in-flight requests");

        let main_abort = main_task.abort_handle();
        let admin_abort = admin_task.as_ref().map(|t| t.abort_handle());
        let drain = async move {
            let main_result = flatten(main_task.await);
            let admin_result = match admin_task {
                Some(task) => flatten(task.await),
                None => Ok(()),
            };
            main_result.and(admin_result)
        };

        let result = match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, drain).await {
            Ok(result) => result,
            Err(_) => {
                main_abort.abort();
                if let Some(admin_abort) = admin_abort {
                    admin_abort.abort();
                }
                error!(grace_period = ?SHUTDOWN_GRACE_PERIOD, "HTTP server shutdown timed out");
                Err(LifecycleError::ShutdownTimeout(SHUTDOWN_GRACE_PERIOD))
            }
        };

        lifecycle.advance(Phase::Stopped);
        if result.is_ok() {
            info!("App stopped");
        }
        result
    }
}

fn flatten(
    result: Result<Result<(), std::io::Error>, tokio::task::JoinError>,
) -> Result<(), LifecycleError> {
    match result {
        Ok(inner) => inner.map_err(LifecycleError::Serve),
        Err(e) => Err(LifecycleError::Serve(std::io::Error::other(e))),
    }
}

/// Run the service until `shutdown` is cancelled
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), LifecycleError> {
    let source = in_cluster_source(&config)?;
    let mut supervisor = Supervisor::new(config)?;
    if let Some(source) = source {
        supervisor = supervisor.with_metadata_source(source);
    }
    supervisor.bind().await?.serve(shutdown).await
}

/// Termination signals that trigger a graceful shutdown
pub struct ShutdownSignals {
    #[cfg(unix)]
    signals: Vec<(&'static str, tokio::signal::unix::Signal)>,
}

impl ShutdownSignals {
    /// Register handlers for SIGHUP, SIGINT, SIGTERM and SIGQUIT
    ///
    /// # Errors
    ///
    /// Returns an error if a signal handler cannot be installed.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            signals: vec![
                ("SIGHUP", signal(SignalKind::hangup())?),
                ("SIGINT", signal(SignalKind::interrupt())?),
                ("SIGTERM", signal(SignalKind::terminate())?),
                ("SIGQUIT", signal(SignalKind::quit())?),
            ],
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the first signal and return its name
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        let waits = self.signals.iter_mut().map(|(name, signal)| {
            Box::pin(async move {
                signal.recv().await;
                *name
            })
        });
        let (name, _, _) = futures::future::select_all(waits).await;
        name
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "Ctrl-C",
            Err(_) => std::future::pending().await,
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;

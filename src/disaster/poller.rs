use super::flag::DisasterFlag;
use super::source::{has_disaster_marker, MetadataSource};
use crate::server::SharedMetrics;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),
}

/// Run a single poll cycle
///
/// On success the flag is overwritten with the marker's presence and the
/// new value is returned. On failure the flag keeps its last known value.
pub async fn poll_once(
    source: &dyn MetadataSource,
    flag: &DisasterFlag,
    metrics: &SharedMetrics,
) -> Result<bool, PollError> {
    match source.annotations().await {
        Ok(annotations) => {
            let active = has_disaster_marker(annotations.as_ref());
            flag.set(active);
            metrics.record_poll_success(active);
            Ok(active)
        }
        Err(e) => {
            metrics.record_poll_error();
            Err(PollError::KubeError(e))
        }
    }
}

/// Run the annotation poll loop
///
/// Polls immediately, then once per `interval` until `shutdown` is
/// cancelled. Query errors are logged and never end the loop.
pub async fn run_poller(
    source: Arc<dyn MetadataSource>,
    flag: DisasterFlag,
    interval: Duration,
    metrics: SharedMetrics,
    shutdown: CancellationToken,
) {
    let target = source.describe();
    info!(
        pod = %target,
        interval = ?interval,
        "Starting annotation poller"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let was_active = flag.is_active();
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = poll_once(source.as_ref(), &flag, &metrics) => match result {
                Ok(active) if active != was_active => {
                    if active {
                        warn!(pod = %target, "Disaster annotation found, reporting failures");
                    } else {
                        info!(pod = %target, "Disaster annotation removed, reporting healthy");
                    }
                }
                Ok(active) => {
                    debug!(pod = %target, disaster = active, "Annotation poll complete");
                }
                Err(e) => {
                    warn!(pod = %target, error = %e, "Can't get pod metadata, keeping last state");
                }
            }
        }
    }

    info!(pod = %target, "Annotation poller shutting down");
}

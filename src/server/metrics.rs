//! Prometheus metrics for the disaster pod
//!
//! Exposes request and poller activity:
//! - Request counts and durations per serving mode
//! - Annotation poll outcomes and the current disaster state
//! - Frontend history depth

use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Service metrics registry
///
/// Thread-safe container for all Prometheus metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    /// Total requests by mode (backend, frontend) and response status
    pub requests_total: IntCounterVec,
    /// Request duration in seconds by mode
    pub request_duration_seconds: HistogramVec,
    /// Annotation polls by result (success, error)
    pub annotation_polls_total: IntCounterVec,
    /// 1 while the disaster annotation is present
    pub disaster_state: IntGauge,
    /// Entries currently held in the frontend history
    pub history_entries: IntGauge,
}

impl ServiceMetrics {
    /// Create a new metrics registry with all service metrics
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("disaster_requests_total", "Total number of handled requests"),
            &["mode", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "disaster_request_duration_seconds",
                "Duration of request handling in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["mode"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let annotation_polls_total = IntCounterVec::new(
            Opts::new(
                "disaster_annotation_polls_total",
                "Total number of pod annotation polls",
            ),
            &["result"],
        )?;
        registry.register(Box::new(annotation_polls_total.clone()))?;

        let disaster_state = IntGauge::new(
            "disaster_state",
            "Whether the disaster annotation is currently present (0 or 1)",
        )?;
        registry.register(Box::new(disaster_state.clone()))?;

        let history_entries = IntGauge::new(
            "disaster_history_entries",
            "Number of backend responses kept in the frontend history",
        )?;
        registry.register(Box::new(history_entries.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration_seconds,
            annotation_polls_total,
            disaster_state,
            history_entries,
        })
    }

    /// Record a handled request
    pub fn record_request(&self, mode: &str, status: u16, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[mode, &status.to_string()])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[mode])
            .observe(duration_secs);
    }

    /// Record a successful annotation poll and the state it produced
    pub fn record_poll_success(&self, disaster: bool) {
        self.annotation_polls_total
            .with_label_values(&["success"])
            .inc();
        self.disaster_state.set(i64::from(disaster));
    }

    /// Record a failed annotation poll
    pub fn record_poll_error(&self) {
        self.annotation_polls_total.with_label_values(&["error"]).inc();
    }

    /// Update the history depth gauge
    pub fn set_history_entries(&self, count: usize) {
        self.history_entries.set(count as i64);
    }

    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
        })
    }
}

/// Shared metrics handle for the poller and both listeners
pub type SharedMetrics = Arc<ServiceMetrics>;

/// Create a new shared metrics instance
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(ServiceMetrics::new()?))
}

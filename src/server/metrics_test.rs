//! Tests for service metrics

use super::metrics::{create_metrics, ServiceMetrics};

#[test]
fn test_metrics_creation() {
    let metrics = ServiceMetrics::new().expect("should create metrics");

    // Vec metrics only appear once a label set has a value
    metrics.record_request("backend", 200, 0.01);
    metrics.record_poll_success(false);

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("disaster_requests_total"));
    assert!(output.contains("disaster_request_duration_seconds"));
    assert!(output.contains("disaster_annotation_polls_total"));
    assert!(output.contains("disaster_state"));
    assert!(output.contains("disaster_history_entries"));
}

#[test]
fn test_record_request() {
    let metrics = ServiceMetrics::new().expect("should create metrics");

    metrics.record_request("backend", 200, 0.001);
    metrics.record_request("backend", 200, 0.002);
    metrics.record_request("backend", 500, 0.003);
    metrics.record_request("frontend", 502, 0.5);

    let output = metrics.encode().expect("should encode metrics");

    assert!(output.contains("disaster_requests_total{mode=\"backend\",status=\"200\"} 2"));
    assert!(output.contains("disaster_requests_total{mode=\"backend\",status=\"500\"} 1"));
    assert!(output.contains("disaster_requests_total{mode=\"frontend\",status=\"502\"} 1"));
    assert!(output.contains("disaster_request_duration_seconds_count{mode=\"backend\"} 3"));
    assert!(output.contains("disaster_request_duration_seconds_count{mode=\"frontend\"} 1"));
}

#[test]
fn test_record_polls_tracks_disaster_state() {
    let metrics = ServiceMetrics::new().expect("should create metrics");

    metrics.record_poll_success(true);
    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("disaster_state 1"));

    metrics.record_poll_error();
    metrics.record_poll_success(false);
    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("disaster_state 0"));
    assert!(output.contains("disaster_annotation_polls_total{result=\"success\"} 2"));
    assert!(output.contains("disaster_annotation_polls_total{result=\"error\"} 1"));
}

#[test]
fn test_history_entries_gauge() {
    let metrics = ServiceMetrics::new().expect("should create metrics");

    metrics.set_history_entries(7);

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("disaster_history_entries 7"));
}

#[test]
fn test_shared_metrics_clone() {
    let metrics = create_metrics().expect("should create shared metrics");
    let metrics2 = metrics.clone();

    metrics.record_poll_error();
    metrics2.record_poll_error();

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("disaster_annotation_polls_total{result=\"error\"} 2"));
}

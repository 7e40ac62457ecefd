//! Metrics definitions for the group viewing service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gv_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `operation`: coordinator operation names (~20 values)
//! - `status`: `success` or `error`
//! - `error_type`: `GvError::error_type_label` (15 values)
//! - `endpoint`: request path with ids replaced by placeholders
//!
//! Session ids are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Operations include a store write; p99 target 50ms
        .set_buckets_for_metric(
            Matcher::Prefix("gv_session_operation".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set operation duration buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gv_store".to_string()),
            &[
                0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500,
            ],
        )
        .map_err(|e| format!("Failed to set store latency buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("gv_actor_mailbox_depth".to_string()),
            &[1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0],
        )
        .map_err(|e| format!("Failed to set mailbox depth buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gv_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Set the number of sessions with a live actor.
///
/// Metric: `gv_sessions_active`
pub fn set_sessions_active(count: usize) {
    // usize to f64 is exact for realistic session counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("gv_sessions_active").set(count as f64);
}

/// Record one coordinator operation.
///
/// Metrics: `gv_session_operations_total{operation,status}`,
/// `gv_session_operation_duration_seconds{operation}`
pub fn record_session_operation(operation: &'static str, status: &'static str, duration: Duration) {
    counter!(
        "gv_session_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    histogram!("gv_session_operation_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record a session store call.
///
/// Metric: `gv_store_latency_seconds{operation}` (load, save, list)
pub fn record_store_latency(operation: &'static str, duration: Duration) {
    histogram!("gv_store_latency_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record an error returned to a caller.
///
/// Metric: `gv_errors_total{error_type}`
pub fn record_error(error_type: &'static str) {
    counter!("gv_errors_total", "error_type" => error_type).increment(1);
}

/// Record a session actor that terminated by panicking.
///
/// Metric: `gv_actor_panics_total`
pub fn record_actor_panic() {
    counter!("gv_actor_panics_total").increment(1);
}

/// Record the mailbox depth observed when a message is dequeued.
///
/// Metric: `gv_actor_mailbox_depth` (histogram)
pub fn record_mailbox_depth(depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    histogram!("gv_actor_mailbox_depth").record(depth as f64);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metrics: `gv_http_requests_total{method,endpoint,status_code}`,
/// `gv_http_request_duration_seconds{method,endpoint,status}`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gv_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gv_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Replace identifiers in a request path with placeholders.
///
/// `/v1/sessions/{uuid}/events/{uuid}/reactions/clap` becomes
/// `/v1/sessions/{id}/events/{id}/reactions/{kind}`. Paths outside the API
/// collapse to `/other`.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" => return path.to_string(),
        _ if !path.starts_with("/v1/sessions") => return "/other".to_string(),
        _ => {}
    }

    let mut previous = "";
    let segments: Vec<&str> = path
        .split('/')
        .map(|segment| {
            let normalized = if previous == "reactions" {
                "{kind}"
            } else if uuid::Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            };
            previous = segment;
            normalized
        })
        .collect();
    segments.join("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_recording_without_recorder_is_noop() {
        set_sessions_active(3);
        record_session_operation("join", "success", Duration::from_millis(2));
        record_store_latency("save", Duration::from_micros(300));
        record_error("session_ended");
        record_actor_panic();
        record_mailbox_depth(4);
    }

    #[test]
    fn test_metric_names_and_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            set_sessions_active(2);
            record_session_operation("post_event", "success", Duration::from_millis(3));
            record_session_operation("post_event", "error", Duration::from_millis(1));
            record_store_latency("save", Duration::from_millis(1));
            record_error("feature_disabled");
            record_actor_panic();
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let names: Vec<String> = snapshot
            .iter()
            .map(|(key, _, _, _)| key.key().name().to_string())
            .collect();

        for expected in [
            "gv_sessions_active",
            "gv_session_operations_total",
            "gv_session_operation_duration_seconds",
            "gv_store_latency_seconds",
            "gv_errors_total",
            "gv_actor_panics_total",
        ] {
            assert!(
                names.iter().any(|n| n == expected),
                "missing metric {expected}, got {names:?}"
            );
        }

        let error_ops: u64 = snapshot
            .iter()
            .filter(|(key, _, _, _)| {
                key.key().name() == "gv_session_operations_total"
                    && key
                        .key()
                        .labels()
                        .any(|l| l.key() == "status" && l.value() == "error")
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(c) => *c,
                _ => 0,
            })
            .sum();
        assert_eq!(error_ops, 1);
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/v1/sessions"), "/v1/sessions");
        assert_eq!(
            normalize_endpoint("/v1/sessions/0190f5a4-7b1e-7c3a-9d2e-4f5a6b7c8d9e/participants/me"),
            "/v1/sessions/{id}/participants/me"
        );
        assert_eq!(
            normalize_endpoint(
                "/v1/sessions/0190f5a4-7b1e-7c3a-9d2e-4f5a6b7c8d9e/events/0190f5a4-7b1e-7c3a-9d2e-4f5a6b7c8d9f/reactions/clap"
            ),
            "/v1/sessions/{id}/events/{id}/reactions/{kind}"
        );
        assert_eq!(normalize_endpoint("/wp-admin/login.php"), "/other");
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(201), "success");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(410), "error");
    }
}

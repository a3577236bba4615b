//! Prometheus metrics for the to-do service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `todo_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! Labels are bounded: `status` is `success`/`error`, `reason` and `operation`
//! come from fixed sets in code.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime, before any metric is recorded.
///
/// # Errors
///
/// Returns error if bucket configuration fails or a recorder is already installed.
pub fn init_metrics_recorder(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        // bcrypt dominates login latency; buckets centred on cost 10-14
        .set_buckets_for_metric(
            Matcher::Suffix("login_duration_seconds".to_string()),
            &[0.050, 0.100, 0.200, 0.300, 0.500, 1.000, 2.000],
        )
        .map_err(|e| format!("Failed to set login buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("todo_store_operation".to_string()),
            &[0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000],
        )
        .map_err(|e| format!("Failed to set store operation buckets: {e}"))?
        .install()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record a login attempt and its latency.
pub fn record_login(status: &str, duration: Duration) {
    histogram!("todo_login_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());
    counter!("todo_login_total", "status" => status.to_string()).increment(1);
}

/// Record a session token validation outcome.
pub fn record_token_validation(status: &str) {
    counter!("todo_token_validations_total", "status" => status.to_string()).increment(1);
}

/// Record a session token revocation outcome.
pub fn record_token_revocation(status: &str) {
    counter!("todo_token_revocations_total", "status" => status.to_string()).increment(1);
}

/// Record a call rejected by the auth gate.
pub fn record_gate_rejection(reason: &str) {
    counter!("todo_gate_rejections_total", "reason" => reason.to_string()).increment(1);
}

/// Record a credential store call.
pub fn record_store_operation(operation: &str, status: &str, duration: Duration) {
    histogram!("todo_store_operation_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
    counter!("todo_store_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record time spent in a bcrypt hash or verify.
pub fn record_bcrypt_duration(operation: &str, duration: Duration) {
    histogram!("todo_bcrypt_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    type SnapshotEntry = (
        metrics_util::CompositeKey,
        Option<metrics::Unit>,
        Option<metrics::SharedString>,
        DebugValue,
    );

    fn counter_value(snapshot: &[SnapshotEntry], name: &str) -> u64 {
        snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(v) => *v,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_login_metrics_recorded() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_login("success", Duration::from_millis(210));
            record_login("wrong_secret", Duration::from_millis(190));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(counter_value(&snapshot, "todo_login_total"), 2);
    }

    #[test]
    fn test_gate_and_token_metrics_recorded() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_gate_rejection("missing_credential");
            record_gate_rejection("invalid_token");
            record_token_validation("success");
            record_token_revocation("success");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(&snapshot, "todo_gate_rejections_total"),
            2
        );
        assert_eq!(
            counter_value(&snapshot, "todo_token_validations_total"),
            1
        );
        assert_eq!(counter_value(&snapshot, "todo_token_revocations_total"), 1);
    }

    #[test]
    fn test_store_metrics_recorded() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_store_operation("get_item", "success", Duration::from_millis(3));
            record_store_operation("get_item", "error", Duration::from_millis(5000));
            record_bcrypt_duration("verify", Duration::from_millis(200));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert!(snapshot
            .iter()
            .any(|(key, _, _, _)| key.key().name() == "todo_bcrypt_duration_seconds"));
        assert_eq!(counter_value(&snapshot, "todo_store_operations_total"), 2);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_login("success", Duration::from_millis(1));
        record_store_operation("list_items", "success", Duration::from_millis(1));
    }
}

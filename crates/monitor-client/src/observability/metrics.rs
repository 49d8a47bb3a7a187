//! Metrics definitions for the monitor client.
//!
//! All metrics follow Prometheus naming conventions:
//! - `monitor_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `state`: 5 values (live, reconnected, offline_never_sighted,
//!   offline_departed, offline_session_failed)
//! - `direction`: 2 values (sent, received)
//! - `command`: 5 values (one per control command)
//! - `view`: 3 values (preview, viewer, capture)
//!
//! The library records through the `metrics` facade only; installing an
//! exporter is up to the embedding application.

use metrics::{counter, gauge};

/// Record a presence transition of a tracked camera.
///
/// Metric: `monitor_presence_transitions_total`
/// Labels: `state`
pub fn record_presence_transition(state: &'static str) {
    counter!("monitor_presence_transitions_total", "state" => state).increment(1);
}

/// Record a control command sent or received.
///
/// Metric: `monitor_commands_total`
/// Labels: `direction`, `command`
pub fn record_command(direction: &'static str, command: &'static str) {
    counter!(
        "monitor_commands_total",
        "direction" => direction,
        "command" => command
    )
    .increment(1);
}

/// Record a signaling reconnect attempt.
///
/// Metric: `monitor_signaling_reconnects_total`
/// Labels: `status` (success, error)
pub fn record_signaling_reconnect(status: &'static str) {
    counter!("monitor_signaling_reconnects_total", "status" => status).increment(1);
}

/// Set whether the signaling channel is connected.
///
/// Metric: `monitor_signaling_connected`
pub fn set_signaling_connected(connected: bool) {
    gauge!("monitor_signaling_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record a view that ended in a failure state.
///
/// Metric: `monitor_session_failures_total`
/// Labels: `view`
pub fn record_session_failure(view: &'static str) {
    counter!("monitor_session_failures_total", "view" => view).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    fn counter_value(
        snapshot: &[(
            metrics_util::CompositeKey,
            Option<metrics::Unit>,
            Option<metrics::SharedString>,
            DebugValue,
        )],
        name: &str,
    ) -> u64 {
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
    fn test_metrics_are_recorded() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_presence_transition("live");
            record_presence_transition("offline_departed");
            record_command("sent", "join-room");
            record_command("received", "play-audio");
            record_signaling_reconnect("success");
            set_signaling_connected(true);
            record_session_failure("preview");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(counter_value(&snapshot, "monitor_presence_transitions_total"), 2);
        assert_eq!(counter_value(&snapshot, "monitor_commands_total"), 2);
        assert_eq!(counter_value(&snapshot, "monitor_signaling_reconnects_total"), 1);
        assert_eq!(counter_value(&snapshot, "monitor_session_failures_total"), 1);
        assert!(snapshot
            .iter()
            .any(|(key, _, _, _)| key.key().name() == "monitor_signaling_connected"));
    }
}

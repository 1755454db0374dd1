//! Metric definitions for the signaling relay.
//!
//! Prometheus naming conventions: `ps_` prefix, `_total` suffix for
//! counters. Label values are bounded by enums in this crate, so
//! cardinality stays small:
//! - `kind`: 3 values (offer, answer, candidate)
//! - `reason`: bounded by [`crate::errors::RoomError`] variants

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the handle used to render
/// the `/metrics` endpoint.
///
/// Must be called once, before any metric is recorded.
///
/// # Errors
///
/// Returns an error if a recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Set the number of connected clients.
///
/// Metric: `ps_clients_connected`
pub fn set_clients_connected(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("ps_clients_connected").set(count as f64);
}

/// Set the number of active rooms.
///
/// Metric: `ps_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("ps_rooms_active").set(count as f64);
}

/// Record a relayed signaling payload.
///
/// Metric: `ps_signals_relayed_total`
/// Labels: `kind` (offer, answer, candidate)
pub fn record_signal_relayed(kind: &str) {
    counter!("ps_signals_relayed_total", "kind" => kind.to_string()).increment(1);
}

/// Record a rejected join attempt.
///
/// Metric: `ps_joins_rejected_total`
/// Labels: `reason` (already_member, wrong_password, room_full, banned)
pub fn record_join_rejected(reason: &str) {
    counter!("ps_joins_rejected_total", "reason" => reason.to_string()).increment(1);
}

/// Record the end of a transport session.
///
/// Metric: `ps_disconnects_total`
/// Labels: `reason` (client_closed, transport_error)
pub fn record_disconnect(reason: &str) {
    counter!("ps_disconnects_total", "reason" => reason.to_string()).increment(1);
}

//! Health endpoints and Prometheus metrics.
//!
//! All metrics carry the `ps_` prefix:
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `ps_clients_connected` | Gauge | none | Currently connected WebSocket clients |
//! | `ps_rooms_active` | Gauge | none | Currently active rooms |
//! | `ps_signals_relayed_total` | Counter | `kind` | Offers, answers and candidates forwarded |
//! | `ps_joins_rejected_total` | Counter | `reason` | Join attempts turned away |
//! | `ps_disconnects_total` | Counter | `reason` | Transport sessions ended |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::{
    init_metrics_recorder, record_disconnect, record_join_rejected, record_signal_relayed,
    set_clients_connected, set_rooms_active,
};

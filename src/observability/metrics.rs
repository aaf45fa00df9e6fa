//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rendezvous_connections_total` (counter): accepted connections
//! - `rendezvous_active_connections` (gauge): connections currently open
//! - `rendezvous_lifecycle_state` (gauge): 0=initialized .. 3=stopped, 4=aborted
//!
//! Recording is a no-op until a recorder is installed.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

use crate::lifecycle::LifecycleState;

/// Install the Prometheus exporter. Must run inside a Tokio runtime.
pub fn init_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection_opened() {
    counter!("rendezvous_connections_total").increment(1);
}

pub fn record_active_connections(active: u64) {
    gauge!("rendezvous_active_connections").set(active as f64);
}

pub fn record_lifecycle_state(state: LifecycleState) {
    let value = match state {
        LifecycleState::Initialized => 0.0,
        LifecycleState::Serving => 1.0,
        LifecycleState::ShuttingDown => 2.0,
        LifecycleState::Stopped => 3.0,
        LifecycleState::Aborted => 4.0,
    };
    gauge!("rendezvous_lifecycle_state").set(value);
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `atc_module_state` (gauge): per module, 0=Created .. 4=Terminated, 5=Failed
//! - `atc_module_failures_total` (counter): genuine failures per module
//! - `atc_cascading_shutdowns_total` (counter): failures that stopped everything
//!
//! # Design Decisions
//! - The binary installs a Prometheus recorder; without one these are no-ops
//! - Exposed on the main listener at `/metrics` by the server module

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::lifecycle::ServiceState;

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn state_value(state: ServiceState) -> f64 {
    match state {
        ServiceState::Created => 0.0,
        ServiceState::Starting => 1.0,
        ServiceState::Running => 2.0,
        ServiceState::Stopping => 3.0,
        ServiceState::Terminated => 4.0,
        ServiceState::Failed => 5.0,
    }
}

/// Record the current state of a module.
pub fn record_module_state(module: &str, state: ServiceState) {
    metrics::gauge!("atc_module_state", "module" => module.to_string()).set(state_value(state));
}

/// Record a genuine module failure.
pub fn record_module_failure(module: &str) {
    metrics::counter!("atc_module_failures_total", "module" => module.to_string()).increment(1);
}

/// Record a cascading shutdown.
pub fn record_cascade() {
    metrics::counter!("atc_cascading_shutdowns_total").increment(1);
}

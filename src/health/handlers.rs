//! Probe endpoints.
//!
//! - `GET /health`, `GET /ready`: 200 "OK" when ready, 503 otherwise
//! - `GET /services`: plain-text table of every module

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use tabled::{Table, Tabled};

use crate::health::surface::{HealthSurface, Readiness};

pub const STOPPING_MESSAGE: &str = "Application is stopping";

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "service name")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "failure case")]
    failure: String,
}

/// Router serving the probe endpoints for `surface`.
pub fn router(surface: HealthSurface) -> Router {
    Router::new()
        .route("/health", get(ready))
        .route("/ready", get(ready))
        .route("/services", get(services))
        .with_state(surface)
}

pub async fn ready(State(surface): State<HealthSurface>) -> impl IntoResponse {
    match surface.readiness() {
        Readiness::Ready => (StatusCode::OK, "OK".to_string()),
        Readiness::Stopping => {
            tracing::debug!("Readiness probe rejected: stopping");
            (StatusCode::SERVICE_UNAVAILABLE, STOPPING_MESSAGE.to_string())
        }
        Readiness::NotRunning(modules) => {
            tracing::debug!(count = modules.len(), "Readiness probe rejected");
            let mut body = String::from("Some services are not Running:\n");
            for (name, state) in modules {
                body.push_str(&format!("{}: {}\n", name, state));
            }
            (StatusCode::SERVICE_UNAVAILABLE, body)
        }
    }
}

pub async fn services(State(surface): State<HealthSurface>) -> impl IntoResponse {
    let rows = surface.snapshot().into_iter().map(|s| ServiceRow {
        name: s.name,
        status: s.state.to_string(),
        failure: s.failure,
    });
    let mut table = Table::new(rows).to_string();
    table.push('\n');
    (StatusCode::OK, table)
}

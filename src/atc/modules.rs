//! The module table: names, visibility, dependencies and factories.

use std::time::Duration;

use axum::{routing::get, Router};

use crate::atc::server::ServerService;
use crate::atc::watcher::Watcher;
use crate::atc::Wiring;
use crate::lifecycle::Service;
use crate::modules::{FactoryResult, GraphError, ModuleGraph, ModuleGraphBuilder};

pub const SERVER: &str = "server";
pub const API: &str = "api";
pub const AUTOSCALER: &str = "autoscaler";
pub const DEPLOYER: &str = "deployer";
pub const EVENT_SINK: &str = "event_sink";
pub const FORWARDER: &str = "forwarder";
pub const REDIRECTER: &str = "redirecter";
pub const CONSUL: &str = "consul";
pub const NOMAD: &str = "nomad";
pub const ALL: &str = "all";

const INDEX: &str = "\
atc

GET /health    aggregate health
GET /ready     readiness probe
GET /services  module states
";

const METRICS_INDEX: &str = "GET /metrics   Prometheus metrics\n";

/// Build the module graph every process run resolves against.
pub fn module_graph() -> Result<ModuleGraph<Wiring>, GraphError> {
    ModuleGraphBuilder::<Wiring>::new()
        .internal(SERVER, init_server)
        .internal(API, init_api)
        .module(AUTOSCALER, |w| watcher(w, AUTOSCALER))
        .module(DEPLOYER, |w| watcher(w, DEPLOYER))
        .module(EVENT_SINK, |w| watcher(w, EVENT_SINK))
        .module(FORWARDER, |w| watcher(w, FORWARDER))
        .module(REDIRECTER, |w| watcher(w, REDIRECTER))
        .virtual_module(CONSUL)
        .virtual_module(NOMAD)
        .virtual_module(ALL)
        .depends(API, &[SERVER])
        .depends(AUTOSCALER, &[SERVER])
        .depends(CONSUL, &[FORWARDER, REDIRECTER])
        .depends(DEPLOYER, &[API])
        .depends(EVENT_SINK, &[SERVER])
        .depends(NOMAD, &[DEPLOYER, EVENT_SINK])
        .depends(ALL, &[API, DEPLOYER, EVENT_SINK, FORWARDER, REDIRECTER])
        .build()
}

fn init_server(wiring: &mut Wiring) -> FactoryResult {
    if let Some(handle) = wiring.metrics.clone() {
        wiring.routes.merge(Router::new().route(
            "/metrics",
            get(move || std::future::ready(handle.render())),
        ));
    }

    let server = ServerService::new(
        wiring.config.server.clone(),
        wiring.routes.clone(),
        wiring.flag.clone(),
        wiring.drain.clone(),
    );
    Ok(Some(Box::new(server)))
}

fn init_api(wiring: &mut Wiring) -> FactoryResult {
    let page = index_page(wiring.metrics.is_some());
    wiring.routes.merge(
        Router::new().route("/", get(move || std::future::ready(page.clone()))),
    );
    Ok(None)
}

fn index_page(metrics: bool) -> String {
    let mut page = INDEX.to_string();
    if metrics {
        page.push_str(METRICS_INDEX);
    }
    page
}

fn watcher(wiring: &mut Wiring, name: &'static str) -> FactoryResult {
    let interval = Duration::from_secs(wiring.config.modules.watch_interval_secs);
    Ok(Some(Box::new(Watcher::new(name, interval)) as Box<dyn Service>))
}

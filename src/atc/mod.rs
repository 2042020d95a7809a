//! Application wiring: the concrete module table and the run loop.
//!
//! # Data Flow
//! ```text
//! AtcConfig.target
//!     → TargetResolver (module table in modules.rs)
//!     → LifecycleManager::initialize (factories mutate Wiring)
//!     → probe routes merged, ShutdownCoordinator spawned
//!     → start_all → await_stopped → Result
//! ```

pub mod modules;
pub mod server;
pub mod watcher;

use std::future::Future;
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;

use crate::config::{validate_config, AtcConfig, ConfigError};
use crate::health::{self, HealthSurface};
use crate::http::RouteTable;
use crate::lifecycle::{
    signals, InitError, LifecycleManager, ModuleFailure, ShutdownCoordinator, ShutdownFlag,
};
use crate::modules::{GraphError, ModuleGraph, ResolveError, TargetResolver};

use self::server::DrainSet;

/// Errors surfaced by [`Atc::run`].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Run(#[from] ModuleFailure),
}

/// Context handed to every factory during initialization.
pub struct Wiring {
    pub config: AtcConfig,
    pub routes: RouteTable,
    pub flag: ShutdownFlag,
    pub metrics: Option<PrometheusHandle>,
    pub(crate) drain: DrainSet,
}

/// The orchestrator process.
pub struct Atc {
    config: AtcConfig,
    graph: ModuleGraph<Wiring>,
    metrics: Option<PrometheusHandle>,
}

impl Atc {
    /// Validates `config` and builds the module graph. Nothing starts here.
    pub fn new(config: AtcConfig) -> Result<Self, Error> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(Self {
            config,
            graph: modules::module_graph()?,
            metrics: None,
        })
    }

    /// Serve `/metrics` from this Prometheus handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn graph(&self) -> &ModuleGraph<Wiring> {
        &self.graph
    }

    /// Run until SIGTERM/SIGINT or until the modules stop on their own.
    pub async fn run(self) -> Result<(), Error> {
        self.run_until(signals::termination_signal()).await
    }

    /// Run until `signal` resolves or until the modules stop on their own.
    pub async fn run_until<S>(self, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let plan = TargetResolver::new(&self.graph).resolve(&self.config.target)?;
        tracing::info!(
            service = %self.config.service,
            modules = ?plan.modules(),
            "Resolved initialization order"
        );

        let flag = ShutdownFlag::new();
        let drain: DrainSet = Arc::new(OnceLock::new());
        let mut wiring = Wiring {
            config: self.config.clone(),
            routes: RouteTable::new(),
            flag: flag.clone(),
            metrics: self.metrics.clone(),
            drain: drain.clone(),
        };

        let manager = Arc::new(LifecycleManager::initialize(
            &self.graph,
            &plan,
            &mut wiring,
        )?);
        let registry = manager.registry();

        // The listener stays open until everything it does not depend on is done.
        let server_deps = self.graph.dependencies_of(modules::SERVER);
        let _ = drain.set(
            registry
                .iter()
                .filter(|h| h.name() != modules::SERVER && !server_deps.contains(h.name()))
                .cloned()
                .collect(),
        );

        wiring
            .routes
            .merge(health::router(HealthSurface::new(registry, flag.clone())));

        let coordinator = ShutdownCoordinator::new(flag).spawn(signal, manager.clone());
        manager.start_all();

        let result = manager.await_stopped().await;
        let _ = coordinator.await;

        match &result {
            Ok(()) => tracing::info!("Shutdown complete"),
            Err(failure) => tracing::error!(error = %failure, "Stopped after module failure"),
        }
        result.map_err(Error::from)
    }
}

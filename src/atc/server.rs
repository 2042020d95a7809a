//! The `server` module: owns the external HTTP listener.
//!
//! Binds in `start`, so a port conflict fails the module before anything
//! reports ready. Serves routes contributed by other modules in `run`.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::http::{HttpServer, RouteTable};
use crate::lifecycle::{BoxError, Service, ServiceHandle, ShutdownFlag};

/// Instances the listener must outlive, filled in after initialization.
pub type DrainSet = Arc<OnceLock<Vec<ServiceHandle>>>;

pub struct ServerService {
    config: ServerConfig,
    routes: RouteTable,
    flag: ShutdownFlag,
    drain: DrainSet,
    listener: Option<TcpListener>,
}

impl ServerService {
    pub fn new(config: ServerConfig, routes: RouteTable, flag: ShutdownFlag, drain: DrainSet) -> Self {
        Self {
            config,
            routes,
            flag,
            drain,
            listener: None,
        }
    }
}

#[async_trait]
impl Service for ServerService {
    async fn start(&mut self, _cancel: &CancellationToken) -> Result<(), BoxError> {
        let listener = TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Listening for connections");
        self.listener = Some(listener);
        Ok(())
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), BoxError> {
        let listener = self
            .listener
            .take()
            .ok_or("server module ran without a bound listener")?;
        let server = HttpServer::new(self.routes.take(), &self.config, self.flag.clone());
        let drain = self.drain.get().cloned().unwrap_or_default();

        let shutdown = async move {
            cancel.cancelled().await;
            tracing::debug!(modules = drain.len(), "Waiting for modules before closing listener");
            for handle in &drain {
                handle.wait_terminal().await;
            }
        };

        server.run(listener, shutdown).await?;
        Ok(())
    }
}

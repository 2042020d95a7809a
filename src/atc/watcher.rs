//! Placeholder for the domain modules (autoscaler, deployer, ...).
//!
//! Each ticks at the configured interval until cancelled. The real work of
//! these modules lives outside the orchestrator.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::{BoxError, Service, ServiceFailure};

pub struct Watcher {
    name: &'static str,
    interval: Duration,
}

impl Watcher {
    pub fn new(name: &'static str, interval: Duration) -> Self {
        Self { name, interval }
    }
}

#[async_trait]
impl Service for Watcher {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), BoxError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    tracing::trace!(watcher = self.name, "Tick");
                }
            }
        }
    }

    async fn stop(&mut self, failure: Option<&ServiceFailure>) -> Result<(), BoxError> {
        match failure {
            Some(failure) => {
                tracing::debug!(watcher = self.name, trigger = %failure, "Watcher stopped")
            }
            None => tracing::debug!(watcher = self.name, "Watcher stopped"),
        }
        Ok(())
    }
}

//! The contract every supervised module implements.
//!
//! # States
//! ```text
//! Created → Starting → Running → Stopping → Terminated | Failed
//!              └──────── start fails ─────────────────→ Failed
//! Created ─────── stopped before start ──→ Terminated
//! ```
//!
//! # Design Decisions
//! - Transitions only move forward; a terminal state is final
//! - `run` observes a `CancellationToken` and returns promptly once it fires
//! - Graceful termination is signalled by returning [`StopProcess`], possibly
//!   wrapped; detection walks the error's `source()` chain

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Error type returned by module code.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// A recorded failure, shared between the registry, probes and the result.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Sentinel returned from [`Service::run`] to stop the process on purpose.
///
/// It ends the instance without counting as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stop process")]
pub struct StopProcess;

/// True if `err` is [`StopProcess`] or has it somewhere in its source chain.
pub fn is_graceful_stop(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<StopProcess>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Lifecycle of one module instance.
///
/// The manager calls `start`, then `run`, then `stop`, all from the
/// instance's own task, so implementations can keep plain `&mut self` state.
#[async_trait]
pub trait Service: Send + 'static {
    /// Prepare the module. May wait until the module is ready.
    async fn start(&mut self, _cancel: &CancellationToken) -> Result<(), BoxError> {
        Ok(())
    }

    /// Operate until `cancel` fires (return `Ok(())`) or something goes wrong.
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), BoxError>;

    /// Clean up. Receives the instance's own failure, or the failure that
    /// triggered the cascading shutdown.
    async fn stop(&mut self, _failure: Option<&ServiceFailure>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Observable state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Created,
    Starting,
    Running,
    Stopping,
    Terminated,
    Failed,
}

impl ServiceState {
    fn rank(self) -> u8 {
        match self {
            ServiceState::Created => 0,
            ServiceState::Starting => 1,
            ServiceState::Running => 2,
            ServiceState::Stopping => 3,
            ServiceState::Terminated | ServiceState::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 4
    }

    /// Whether moving from `self` to `next` keeps the state machine monotonic.
    pub fn can_transition_to(self, next: ServiceState) -> bool {
        next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::Created => "Created",
            ServiceState::Starting => "Starting",
            ServiceState::Running => "Running",
            ServiceState::Stopping => "Stopping",
            ServiceState::Terminated => "Terminated",
            ServiceState::Failed => "Failed",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A module together with the error it failed with.
#[derive(Debug, Clone)]
pub struct ServiceFailure {
    pub module: String,
    pub error: SharedError,
}

impl ServiceFailure {
    pub fn new(module: impl Into<String>, error: SharedError) -> Self {
        Self {
            module: module.into(),
            error,
        }
    }
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module {} failed: {}", self.module, self.error)
    }
}

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (manager.rs):
//!     ResolvedPlan → initialize (factories, in order) → ServiceRegistry
//!     → start_all: one task per instance (start → run → stop)
//!
//! Failure (manager.rs):
//!     run returns error → supervisor records trigger → cancel everyone
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → set shutdown flag → stop_all → await_stopped
//! ```
//!
//! # Design Decisions
//! - Initialization is sequential; execution is concurrent
//! - Cancellation is cooperative only; there is no forced shutdown deadline
//! - The overall result is derived from final instance states

pub mod manager;
pub mod registry;
pub mod service;
pub mod shutdown;
pub mod signals;

pub use manager::{InitError, LifecycleManager, ModuleFailure};
pub use registry::{ServiceHandle, ServiceRegistry};
pub use service::{
    is_graceful_stop, BoxError, Service, ServiceFailure, ServiceState, SharedError, StopProcess,
};
pub use shutdown::{ShutdownCoordinator, ShutdownFlag};

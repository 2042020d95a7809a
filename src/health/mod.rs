//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceRegistry (instance states) + ShutdownFlag
//!     → surface.rs (aggregate health, readiness, sorted snapshot)
//!     → handlers.rs (/health, /ready, /services)
//! ```
//!
//! # Design Decisions
//! - Health is derived on every query, never cached
//! - The registry is read-only after initialization, so probes need no lock
//! - The shutdown flag fails readiness before instances finish stopping

pub mod handlers;
pub mod surface;

pub use handlers::router;
pub use surface::{HealthSurface, Readiness, ServiceStatus};

//! Module orchestrator.
//!
//! Boots a configurable subset of interdependent modules in dependency
//! order, supervises them concurrently, stops everything when one fails and
//! reports aggregate health to external probes.

pub mod atc;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod modules;
pub mod observability;

pub use crate::atc::{Atc, Error, Wiring};
pub use config::schema::AtcConfig;
pub use lifecycle::{LifecycleManager, Service, ServiceState, StopProcess};
pub use modules::{ModuleGraph, ModuleGraphBuilder, TargetResolver};

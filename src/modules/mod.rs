//! Module graph subsystem.
//!
//! # Data Flow
//! ```text
//! Declarative table (builder.rs)
//!     → ModuleGraph (graph.rs): descriptors + dependency edges
//!     → TargetResolver (resolver.rs): requested targets → ResolvedPlan
//!     → LifecycleManager::initialize (lifecycle/manager.rs)
//! ```
//!
//! # Design Decisions
//! - The graph is built once, explicitly, at startup; nothing registers itself
//! - Plans are deterministic: ties between ready modules go to the smallest name
//! - Graph problems surface as `GraphError`, never as panics

pub mod builder;
pub mod error;
pub mod graph;
pub mod resolver;

pub use builder::ModuleGraphBuilder;
pub use error::{GraphError, ResolveError};
pub use graph::{Factory, FactoryResult, ModuleDescriptor, ModuleGraph, Visibility};
pub use resolver::{ResolvedPlan, TargetResolver};

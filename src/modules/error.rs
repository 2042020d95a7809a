//! Error types for module graph construction and target resolution.

use thiserror::Error;

/// Structural problems with the module graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A module with this name was already registered.
    #[error("module {0} is already registered")]
    DuplicateModule(String),

    /// A dependency edge references a module that was never registered.
    #[error("unknown module {0}")]
    UnknownModule(String),

    /// The listed modules could not be ordered because they depend on each other.
    #[error("dependency cycle detected between modules: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Errors returned while turning a target set into an initialization plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A requested target is unknown or internal.
    #[error("selected target ({target}) is an internal or unknown module, which is not allowed")]
    Configuration { target: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

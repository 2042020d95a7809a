//! Declarative construction of a [`ModuleGraph`].

use std::collections::BTreeSet;

use crate::modules::error::GraphError;
use crate::modules::graph::{FactoryResult, ModuleDescriptor, ModuleGraph, Visibility};
use crate::modules::resolver::TargetResolver;

/// Collects modules and edges, then validates them all at once in [`build`].
///
/// Errors are deferred so a table reads top to bottom without `?` on every
/// line; the first problem found is returned.
///
/// [`build`]: ModuleGraphBuilder::build
pub struct ModuleGraphBuilder<C> {
    modules: Vec<ModuleDescriptor<C>>,
    edges: Vec<(String, String)>,
}

impl<C> ModuleGraphBuilder<C> {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Public module with a factory.
    pub fn module<F>(self, name: &str, factory: F) -> Self
    where
        F: Fn(&mut C) -> FactoryResult + Send + Sync + 'static,
    {
        self.descriptor(ModuleDescriptor::new(name, Visibility::Public, factory))
    }

    /// Module that cannot be requested as a target.
    pub fn internal<F>(self, name: &str, factory: F) -> Self
    where
        F: Fn(&mut C) -> FactoryResult + Send + Sync + 'static,
    {
        self.descriptor(ModuleDescriptor::new(name, Visibility::Internal, factory))
    }

    /// Grouping module without a factory.
    pub fn virtual_module(self, name: &str) -> Self {
        self.descriptor(ModuleDescriptor::virtual_module(name))
    }

    pub fn descriptor(mut self, descriptor: ModuleDescriptor<C>) -> Self {
        self.modules.push(descriptor);
        self
    }

    /// `from` depends on each of `to`.
    pub fn depends(mut self, from: &str, to: &[&str]) -> Self {
        self.edges
            .extend(to.iter().map(|dep| (from.to_string(), dep.to_string())));
        self
    }

    /// Register everything, validate every edge and reject cycles.
    pub fn build(self) -> Result<ModuleGraph<C>, GraphError> {
        let mut graph = ModuleGraph::new();
        for descriptor in self.modules {
            graph.register(descriptor)?;
        }
        for (from, to) in &self.edges {
            graph.add_dependency(from, to)?;
        }

        // Ordering the whole graph surfaces cycles at configuration time.
        let everything: BTreeSet<String> = graph.module_names().map(str::to_string).collect();
        TargetResolver::new(&graph).order(&everything)?;
        Ok(graph)
    }
}

impl<C> Default for ModuleGraphBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

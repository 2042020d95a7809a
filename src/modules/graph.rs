//! Module registry and dependency edges.
//!
//! # Responsibilities
//! - Hold one descriptor per module name
//! - Record directed `dependent → dependency` edges
//! - Answer closure and visibility queries
//!
//! # Design Decisions
//! - Sorted maps everywhere so every query is deterministic
//! - Cycles are not rejected here; `TargetResolver` and the builder report them
//! - Read-only after the first resolve by convention, not enforcement

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::lifecycle::{BoxError, Service};
use crate::modules::error::GraphError;

/// What a factory produces: an instance to supervise, or `None` when the
/// module only contributes wiring.
pub type FactoryResult = Result<Option<Box<dyn Service>>, BoxError>;

/// Constructor invoked once per module during sequential initialization.
///
/// The context `C` is the wiring shared between factories; earlier modules
/// in the plan may leave resources in it for later ones.
pub type Factory<C> = Box<dyn Fn(&mut C) -> FactoryResult + Send + Sync>;

/// Whether a module may be requested as a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Internal,
}

/// Static description of a module.
pub struct ModuleDescriptor<C> {
    pub name: String,
    pub visibility: Visibility,
    /// `None` marks a virtual grouping module.
    pub factory: Option<Factory<C>>,
}

impl<C> ModuleDescriptor<C> {
    pub fn new<F>(name: impl Into<String>, visibility: Visibility, factory: F) -> Self
    where
        F: Fn(&mut C) -> FactoryResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            visibility,
            factory: Some(Box::new(factory)),
        }
    }

    /// A public module without a factory that only aggregates dependencies.
    pub fn virtual_module(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            factory: None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.factory.is_none()
    }
}

impl<C> fmt::Debug for ModuleDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("virtual", &self.is_virtual())
            .finish()
    }
}

/// Registry of module descriptors and their direct dependencies.
pub struct ModuleGraph<C> {
    modules: BTreeMap<String, ModuleDescriptor<C>>,
    deps: BTreeMap<String, BTreeSet<String>>,
}

impl<C> ModuleGraph<C> {
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
            deps: BTreeMap::new(),
        }
    }

    /// Register a descriptor. Names must be unique.
    pub fn register(&mut self, descriptor: ModuleDescriptor<C>) -> Result<(), GraphError> {
        if self.modules.contains_key(&descriptor.name) {
            return Err(GraphError::DuplicateModule(descriptor.name));
        }
        self.deps.insert(descriptor.name.clone(), BTreeSet::new());
        self.modules.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Declare that `from` depends on `to`; `to` must be initialized first.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        if !self.modules.contains_key(to) {
            return Err(GraphError::UnknownModule(to.to_string()));
        }
        let edges = self
            .deps
            .get_mut(from)
            .ok_or_else(|| GraphError::UnknownModule(from.to_string()))?;
        edges.insert(to.to_string());
        Ok(())
    }

    /// Direct dependencies of `name`. Empty for unknown modules.
    pub fn direct_dependencies(&self, name: &str) -> impl Iterator<Item = &str> {
        self.deps
            .get(name)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Transitive closure of everything `name` depends on, excluding `name`.
    ///
    /// Terminates on cyclic graphs; a module on a cycle through `name` is
    /// simply not reported as its own dependency.
    pub fn dependencies_of(&self, name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self.direct_dependencies(name).collect();

        while let Some(current) = stack.pop() {
            if current == name || !seen.insert(current.to_string()) {
                continue;
            }
            stack.extend(self.direct_dependencies(current));
        }
        seen
    }

    /// True iff the module exists and may be requested as a target.
    pub fn is_targetable(&self, name: &str) -> bool {
        self.modules
            .get(name)
            .is_some_and(|m| m.visibility == Visibility::Public)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor<C>> {
        self.modules.get(name)
    }

    /// All registered names in sorted order.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Sorted names of the modules users may select as targets.
    pub fn user_visible_module_names(&self) -> Vec<&str> {
        self.modules
            .values()
            .filter(|m| m.visibility == Visibility::Public)
            .map(|m| m.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl<C> Default for ModuleGraph<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for ModuleGraph<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleGraph")
            .field("modules", &self.modules.values().collect::<Vec<_>>())
            .field("deps", &self.deps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> ModuleDescriptor<()> {
        ModuleDescriptor::new("noop", Visibility::Public, |_| Ok(None))
    }

    fn graph(names: &[&str]) -> ModuleGraph<()> {
        let mut g = ModuleGraph::new();
        for name in names {
            g.register(ModuleDescriptor::virtual_module(*name)).unwrap();
        }
        g
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut g = ModuleGraph::new();
        g.register(noop()).unwrap();
        assert_eq!(
            g.register(noop()),
            Err(GraphError::DuplicateModule("noop".into()))
        );
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_add_dependency_requires_both_ends() {
        let mut g = graph(&["a"]);
        assert_eq!(
            g.add_dependency("a", "missing"),
            Err(GraphError::UnknownModule("missing".into()))
        );
        assert_eq!(
            g.add_dependency("missing", "a"),
            Err(GraphError::UnknownModule("missing".into()))
        );
    }

    #[test]
    fn test_dependencies_of_is_transitive_and_excludes_self() {
        let mut g = graph(&["a", "b", "c", "d"]);
        g.add_dependency("d", "c").unwrap();
        g.add_dependency("c", "b").unwrap();
        g.add_dependency("b", "a").unwrap();

        let deps: Vec<_> = g.dependencies_of("d").into_iter().collect();
        assert_eq!(deps, vec!["a", "b", "c"]);
        assert!(g.dependencies_of("a").is_empty());
        assert!(g.dependencies_of("unknown").is_empty());
    }

    #[test]
    fn test_dependencies_of_terminates_on_cycle() {
        let mut g = graph(&["a", "b"]);
        g.add_dependency("a", "b").unwrap();
        g.add_dependency("b", "a").unwrap();

        let deps: Vec<_> = g.dependencies_of("a").into_iter().collect();
        assert_eq!(deps, vec!["b"]);
    }

    #[test]
    fn test_targetable_respects_visibility() {
        let mut g: ModuleGraph<()> = ModuleGraph::new();
        g.register(ModuleDescriptor::new("server", Visibility::Internal, |_| Ok(None)))
            .unwrap();
        g.register(ModuleDescriptor::virtual_module("all")).unwrap();

        assert!(!g.is_targetable("server"));
        assert!(g.is_targetable("all"));
        assert!(!g.is_targetable("nope"));
        assert_eq!(g.user_visible_module_names(), vec!["all"]);
    }
}

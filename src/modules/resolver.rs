//! Target resolution.
//!
//! Turns the requested target names into a deterministic initialization
//! order: the closure of the targets over the dependency relation, sorted
//! topologically with the lexicographically smallest ready module first.

use std::collections::{BTreeMap, BTreeSet};

use crate::modules::error::{GraphError, ResolveError};
use crate::modules::graph::ModuleGraph;

/// Ordered list of modules to initialize. Every module appears after all of
/// its transitive dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlan {
    order: Vec<String>,
}

impl ResolvedPlan {
    pub fn modules(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|m| m == name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Computes initialization plans against a module graph.
pub struct TargetResolver<'g, C> {
    graph: &'g ModuleGraph<C>,
}

impl<'g, C> TargetResolver<'g, C> {
    pub fn new(graph: &'g ModuleGraph<C>) -> Self {
        Self { graph }
    }

    /// Resolve `targets` into a plan.
    ///
    /// Fails with [`ResolveError::Configuration`] for the first (sorted)
    /// target that is unknown or internal, and with [`GraphError::Cycle`] if
    /// the closure cannot be ordered.
    pub fn resolve<I, S>(&self, targets: I) -> Result<ResolvedPlan, ResolveError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: BTreeSet<String> = targets
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .collect();

        if let Some(bad) = targets.iter().find(|t| !self.graph.is_targetable(t)) {
            return Err(ResolveError::Configuration {
                target: bad.clone(),
            });
        }

        let mut closure = BTreeSet::new();
        for target in &targets {
            closure.extend(self.graph.dependencies_of(target));
            closure.insert(target.clone());
        }

        let order = self.order(&closure)?;
        Ok(ResolvedPlan { order })
    }

    /// Kahn's algorithm over `closure` with a sorted ready set.
    pub(crate) fn order(&self, closure: &BTreeSet<String>) -> Result<Vec<String>, GraphError> {
        // Every dependency of a closure member is itself in the closure.
        let mut pending: BTreeMap<&str, BTreeSet<&str>> = closure
            .iter()
            .map(|name| {
                let deps = self
                    .graph
                    .direct_dependencies(name)
                    .filter(|d| closure.contains(*d))
                    .collect();
                (name.as_str(), deps)
            })
            .collect();

        let mut order = Vec::with_capacity(closure.len());
        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(name, _)| *name)
            .collect();

        while let Some(next) = ready.pop_first() {
            pending.remove(next);
            order.push(next.to_string());

            for (name, deps) in pending.iter_mut() {
                if deps.remove(next) && deps.is_empty() {
                    ready.insert(*name);
                }
            }
        }

        if !pending.is_empty() {
            let stuck = pending.keys().map(|name| name.to_string()).collect();
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::graph::{ModuleDescriptor, Visibility};

    fn graph(names: &[&str], edges: &[(&str, &str)]) -> ModuleGraph<()> {
        let mut g = ModuleGraph::new();
        for name in names {
            g.register(ModuleDescriptor::virtual_module(*name)).unwrap();
        }
        for (from, to) in edges {
            g.add_dependency(from, to).unwrap();
        }
        g
    }

    #[test]
    fn test_siblings_break_ties_lexicographically() {
        let g = graph(&["A", "B", "C"], &[("C", "A"), ("C", "B")]);
        let plan = TargetResolver::new(&g).resolve(["C"]).unwrap();
        assert_eq!(plan.modules(), ["A", "B", "C"]);
    }

    #[test]
    fn test_plan_respects_transitive_dependencies() {
        let g = graph(
            &["a", "b", "c", "d", "e", "z"],
            &[("a", "z"), ("b", "a"), ("c", "b"), ("c", "e"), ("d", "c"), ("e", "z")],
        );
        let plan = TargetResolver::new(&g).resolve(["d"]).unwrap();
        assert_eq!(plan.modules(), ["z", "a", "b", "e", "c", "d"]);

        let position = |m: &str| plan.iter().position(|p| p == m).unwrap();
        for name in plan.iter() {
            for dep in g.dependencies_of(name) {
                assert!(position(&dep) < position(name), "{dep} must precede {name}");
            }
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let g = graph(
            &["m1", "m2", "m3", "m4", "m5"],
            &[("m5", "m1"), ("m5", "m3"), ("m4", "m2"), ("m3", "m2")],
        );
        let resolver = TargetResolver::new(&g);
        let first = resolver.resolve(["m5", "m4"]).unwrap();
        for _ in 0..10 {
            assert_eq!(resolver.resolve(["m4", "m5"]).unwrap(), first);
        }
    }

    #[test]
    fn test_closure_excludes_unrequested_modules() {
        let g = graph(&["a", "b", "c"], &[("b", "a")]);
        let plan = TargetResolver::new(&g).resolve(["b"]).unwrap();
        assert_eq!(plan.modules(), ["a", "b"]);
        assert!(!plan.contains("c"));
    }

    #[test]
    fn test_cycle_is_reported() {
        let g = graph(&["a", "b", "c", "x"], &[("a", "b"), ("b", "c"), ("c", "a"), ("x", "a")]);
        let err = TargetResolver::new(&g).resolve(["x"]).unwrap_err();
        assert_eq!(
            err,
            ResolveError::Graph(GraphError::Cycle(vec![
                "a".into(),
                "b".into(),
                "c".into(),
                "x".into()
            ]))
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let g = graph(&["a"], &[("a", "a")]);
        let err = TargetResolver::new(&g).resolve(["a"]).unwrap_err();
        assert!(matches!(err, ResolveError::Graph(GraphError::Cycle(_))));
    }

    #[test]
    fn test_unknown_target_is_configuration_error() {
        let g = graph(&["a"], &[]);
        let err = TargetResolver::new(&g).resolve(["unknown"]).unwrap_err();
        assert_eq!(
            err,
            ResolveError::Configuration {
                target: "unknown".into()
            }
        );
        assert!(err.to_string().contains("selected target (unknown)"));
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn test_internal_target_is_rejected() {
        let mut g: ModuleGraph<()> = ModuleGraph::new();
        g.register(ModuleDescriptor::new("server", Visibility::Internal, |_| Ok(None)))
            .unwrap();
        let err = TargetResolver::new(&g).resolve(["server"]).unwrap_err();
        assert!(matches!(err, ResolveError::Configuration { target } if target == "server"));
    }

    #[test]
    fn test_internal_dependency_is_pulled_in() {
        let mut g: ModuleGraph<()> = ModuleGraph::new();
        g.register(ModuleDescriptor::new("server", Visibility::Internal, |_| Ok(None)))
            .unwrap();
        g.register(ModuleDescriptor::virtual_module("web")).unwrap();
        g.add_dependency("web", "server").unwrap();

        let plan = TargetResolver::new(&g).resolve(["web"]).unwrap();
        assert_eq!(plan.modules(), ["server", "web"]);
    }

    #[test]
    fn test_empty_targets_yield_empty_plan() {
        let g = graph(&["a"], &[]);
        let plan = TargetResolver::new(&g).resolve(Vec::<String>::new()).unwrap();
        assert!(plan.is_empty());
    }
}

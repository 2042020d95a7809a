//! Aggregate and per-module health derived from the service registry.
//!
//! Nothing here is stored: every query reads the current instance states
//! and the shutdown flag.

use crate::lifecycle::{ServiceRegistry, ServiceState, ShutdownFlag};

/// Answer to a readiness query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Shutdown was requested; reported even while instances still run.
    Stopping,
    /// Instances that are not Running, sorted by name.
    NotRunning(Vec<(String, ServiceState)>),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// One row of the per-module snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    /// Failure message, empty when the module has not failed.
    pub failure: String,
}

#[derive(Clone, Debug)]
pub struct HealthSurface {
    registry: ServiceRegistry,
    flag: ShutdownFlag,
}

impl HealthSurface {
    pub fn new(registry: ServiceRegistry, flag: ShutdownFlag) -> Self {
        Self { registry, flag }
    }

    /// True iff every instance is Running and no shutdown was requested.
    pub fn is_healthy(&self) -> bool {
        !self.flag.is_requested() && self.registry.all_running()
    }

    pub fn readiness(&self) -> Readiness {
        if self.flag.is_requested() {
            return Readiness::Stopping;
        }

        let not_running: Vec<_> = self
            .registry
            .sorted()
            .map(|h| (h.name().to_string(), h.state()))
            .filter(|(_, state)| *state != ServiceState::Running)
            .collect();

        if not_running.is_empty() {
            Readiness::Ready
        } else {
            Readiness::NotRunning(not_running)
        }
    }

    /// Every instance with its state and failure case, sorted by name.
    pub fn snapshot(&self) -> Vec<ServiceStatus> {
        self.registry
            .sorted()
            .map(|h| ServiceStatus {
                name: h.name().to_string(),
                state: h.state(),
                failure: h
                    .failure_case()
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::registry::ServiceHandle;
    use crate::lifecycle::BoxError;
    use std::sync::Arc;

    fn surface(states: &[(&str, ServiceState)]) -> (HealthSurface, Vec<ServiceHandle>) {
        let handles: Vec<_> = states
            .iter()
            .map(|(name, state)| {
                let handle = ServiceHandle::new(*name);
                if *state == ServiceState::Failed {
                    handle.fail(Arc::from(BoxError::from("boom")));
                } else {
                    handle.transition(*state);
                }
                handle
            })
            .collect();
        let registry = ServiceRegistry::from_handles(handles.clone());
        (HealthSurface::new(registry, ShutdownFlag::new()), handles)
    }

    #[test]
    fn test_ready_when_everything_runs() {
        let (surface, _) = surface(&[
            ("b", ServiceState::Running),
            ("a", ServiceState::Running),
        ]);
        assert!(surface.is_healthy());
        assert_eq!(surface.readiness(), Readiness::Ready);
    }

    #[test]
    fn test_lists_modules_that_are_not_running() {
        let (surface, _) = surface(&[
            ("zeta", ServiceState::Starting),
            ("alpha", ServiceState::Running),
            ("mid", ServiceState::Failed),
        ]);
        assert!(!surface.is_healthy());
        assert_eq!(
            surface.readiness(),
            Readiness::NotRunning(vec![
                ("mid".to_string(), ServiceState::Failed),
                ("zeta".to_string(), ServiceState::Starting),
            ])
        );
    }

    #[test]
    fn test_shutdown_flag_wins_over_running_states() {
        let (surface, _) = surface(&[("a", ServiceState::Running)]);
        surface.flag.request();
        assert!(!surface.is_healthy());
        assert_eq!(surface.readiness(), Readiness::Stopping);
    }

    #[test]
    fn test_snapshot_is_sorted_and_reflects_current_state() {
        let (surface, handles) = surface(&[
            ("b", ServiceState::Running),
            ("a", ServiceState::Failed),
        ]);
        let snapshot = surface.snapshot();
        assert_eq!(snapshot[0].name, "a");
        assert_eq!(snapshot[0].failure, "boom");
        assert_eq!(snapshot[1].name, "b");
        assert_eq!(snapshot[1].failure, "");

        handles[0].transition(ServiceState::Stopping);
        assert_eq!(surface.snapshot()[1].state, ServiceState::Stopping);
    }
}

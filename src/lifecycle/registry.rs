//! Registry of initialized module instances.
//!
//! Populated once by `LifecycleManager::initialize`, read-only afterwards.
//! Handles expose state and failure case; the `Service` objects themselves
//! stay with the manager.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::lifecycle::service::{ServiceState, SharedError};
use crate::observability::metrics;

/// Shared, read-only view of one instance.
#[derive(Clone)]
pub struct ServiceHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    name: String,
    state: watch::Sender<ServiceState>,
    failure: Mutex<Option<SharedError>>,
}

impl ServiceHandle {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ServiceState::Created);
        Self {
            inner: Arc::new(HandleInner {
                name: name.into(),
                state,
                failure: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> ServiceState {
        *self.inner.state.borrow()
    }

    /// Error the instance failed with, if any.
    pub fn failure_case(&self) -> Option<SharedError> {
        self.inner
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Wait until the instance reaches Terminated or Failed.
    pub async fn wait_terminal(&self) -> ServiceState {
        let mut rx = self.inner.state.subscribe();
        let reached = rx.wait_for(|s| s.is_terminal()).await.map(|state| *state);
        // The sender lives in `self`, so the channel cannot close here.
        reached.unwrap_or_else(|_| self.state())
    }

    /// Move forward to `next`. Returns false if that would go backwards.
    pub(crate) fn transition(&self, next: ServiceState) -> bool {
        let changed = self.inner.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });

        if changed {
            tracing::debug!(module = %self.name(), state = %next, "Module state changed");
            metrics::record_module_state(self.name(), next);
        }
        changed
    }

    /// Record `error` and move to Failed. The first recorded failure wins.
    pub(crate) fn fail(&self, error: SharedError) -> bool {
        {
            let mut failure = self
                .inner
                .failure
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if failure.is_none() {
                *failure = Some(error);
            }
        }
        self.transition(ServiceState::Failed)
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Module name → instance handle, in initialization order.
#[derive(Clone, Debug, Default)]
pub struct ServiceRegistry {
    services: Arc<Vec<ServiceHandle>>,
    index: Arc<BTreeMap<String, usize>>,
}

impl ServiceRegistry {
    pub(crate) fn from_handles(handles: Vec<ServiceHandle>) -> Self {
        let index = handles
            .iter()
            .enumerate()
            .map(|(i, h)| (h.name().to_string(), i))
            .collect();
        Self {
            services: Arc::new(handles),
            index: Arc::new(index),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServiceHandle> {
        self.index.get(name).map(|&i| &self.services[i])
    }

    /// Handles in initialization order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceHandle> {
        self.services.iter()
    }

    /// Handles sorted by module name.
    pub fn sorted(&self) -> impl Iterator<Item = &ServiceHandle> {
        self.index.values().map(move |&i| &self.services[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(ServiceHandle::name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// True iff every instance is Running.
    pub fn all_running(&self) -> bool {
        self.services
            .iter()
            .all(|h| h.state() == ServiceState::Running)
    }

    pub fn all_terminal(&self) -> bool {
        self.services.iter().all(|h| h.state().is_terminal())
    }
}

//! Lifecycle manager: sequential initialization, concurrent supervision.
//!
//! # Data Flow
//! ```text
//! initialize(plan):  factory(ctx) for each module, strictly in plan order
//!                    → ServiceRegistry (one handle per produced instance)
//! start_all():       spawn one task per instance: start → run → stop
//!                    + one supervisor task collecting run exits
//! run exit:          graceful sentinel → stop everything, not a failure
//!                    genuine error     → record trigger, stop everything
//! await_stopped():   resolves once every instance is terminal
//! ```

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::lifecycle::registry::{ServiceHandle, ServiceRegistry};
use crate::lifecycle::service::{
    is_graceful_stop, BoxError, Service, ServiceFailure, ServiceState, SharedError,
};
use crate::modules::{ModuleGraph, ResolvedPlan};
use crate::observability::metrics;

/// Errors from the sequential initialization phase.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("module {0} in the initialization plan is not registered")]
    UnknownModule(String),

    #[error("failed to initialize module {module}: {source}")]
    Factory {
        module: String,
        #[source]
        source: BoxError,
    },
}

/// Aggregated result of a run in which at least one module genuinely failed.
#[derive(Debug, Clone, Error)]
#[error("{}", render_failures(.failures))]
pub struct ModuleFailure {
    pub failures: Vec<ServiceFailure>,
}

impl ModuleFailure {
    /// Names of the failed modules, sorted.
    pub fn modules(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.module.as_str()).collect()
    }
}

fn render_failures(failures: &[ServiceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
enum TaskError {
    #[error("module task panicked")]
    Panicked,
    #[error("module task was cancelled by the runtime")]
    Aborted,
}

type Outcome = Result<(), ModuleFailure>;

/// State shared between the manager, the supervisor and instance tasks.
struct Shared {
    cancel: CancellationToken,
    /// First genuine failure; handed to `stop` of every other instance.
    trigger: Mutex<Option<ServiceFailure>>,
    outcome: watch::Sender<Option<Outcome>>,
}

impl Shared {
    fn trigger(&self) -> Option<ServiceFailure> {
        self.trigger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn cascade(&self, failure: ServiceFailure) {
        {
            let mut trigger = self
                .trigger
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if trigger.is_none() {
                tracing::warn!(module = %failure.module, "Stopping all modules after module failure");
                metrics::record_cascade();
                *trigger = Some(failure);
            }
        }
        self.cancel.cancel();
    }
}

enum ExitKind {
    Completed,
    GracefulStop,
    Failed(SharedError),
}

struct Exit {
    module: String,
    kind: ExitKind,
}

type Instance = (ServiceHandle, Box<dyn Service>);

/// Owns every module instance for the lifetime of the process.
pub struct LifecycleManager {
    registry: ServiceRegistry,
    pending: Mutex<Option<Vec<Instance>>>,
    shared: Arc<Shared>,
}

impl LifecycleManager {
    /// Invoke each module's factory exactly once, in plan order.
    ///
    /// Virtual modules and factories returning `None` produce no instance.
    /// A factory error aborts immediately; nothing has started yet, so there
    /// is nothing to roll back.
    pub fn initialize<C>(
        graph: &ModuleGraph<C>,
        plan: &ResolvedPlan,
        ctx: &mut C,
    ) -> Result<Self, InitError> {
        let mut instances: Vec<Instance> = Vec::with_capacity(plan.len());

        for name in plan.iter() {
            let descriptor = graph
                .get(name)
                .ok_or_else(|| InitError::UnknownModule(name.to_string()))?;

            let Some(factory) = &descriptor.factory else {
                tracing::debug!(module = %name, "Virtual module, nothing to initialize");
                continue;
            };

            tracing::debug!(module = %name, "Initializing module");
            let service = factory(ctx).map_err(|source| InitError::Factory {
                module: name.to_string(),
                source,
            })?;

            match service {
                Some(service) => instances.push((ServiceHandle::new(name), service)),
                None => tracing::debug!(module = %name, "Module registered wiring only"),
            }
        }

        let registry =
            ServiceRegistry::from_handles(instances.iter().map(|(h, _)| h.clone()).collect());
        let (outcome, _) = watch::channel(None);

        tracing::info!(modules = registry.len(), "Modules initialized");
        Ok(Self {
            registry,
            pending: Mutex::new(Some(instances)),
            shared: Arc::new(Shared {
                cancel: CancellationToken::new(),
                trigger: Mutex::new(None),
                outcome,
            }),
        })
    }

    /// Cheap handle to the read-only registry.
    pub fn registry(&self) -> ServiceRegistry {
        self.registry.clone()
    }

    /// Spawn every instance and the supervisor. Returns immediately.
    ///
    /// Must be called from within a Tokio runtime. Later calls are ignored.
    pub fn start_all(&self) {
        let Some(instances) = self.take_pending() else {
            tracing::warn!("Modules were already started or stopped");
            return;
        };

        tracing::info!(modules = instances.len(), "Starting modules");
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();

        for (handle, service) in instances {
            let cancel = self.shared.cancel.child_token();
            tokio::spawn(supervise_instance(
                handle,
                service,
                cancel,
                self.shared.clone(),
                exit_tx.clone(),
            ));
        }
        drop(exit_tx);

        tokio::spawn(supervise(exit_rx, self.shared.clone(), self.registry.clone()));
    }

    /// Request cooperative cancellation of every instance.
    ///
    /// Instances that were never started go straight to Terminated.
    pub fn stop_all(&self) {
        tracing::info!("Stopping all modules");
        self.shared.cancel.cancel();

        if let Some(instances) = self.take_pending() {
            for (handle, _) in instances {
                handle.transition(ServiceState::Terminated);
            }
            self.shared.outcome.send_replace(Some(Ok(())));
        }
    }

    /// Wait until every instance is Terminated or Failed.
    ///
    /// Never returns if a module ignores cancellation.
    pub async fn await_stopped(&self) -> Result<(), ModuleFailure> {
        let mut rx = self.shared.outcome.subscribe();
        let outcome = rx.wait_for(Option::is_some).await.map(|o| o.clone());
        outcome.ok().flatten().unwrap_or(Ok(()))
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.outcome.borrow().is_some()
    }

    /// The failure that triggered the cascading shutdown, if any.
    pub fn trigger(&self) -> Option<ServiceFailure> {
        self.shared.trigger()
    }

    fn take_pending(&self) -> Option<Vec<Instance>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Runs the instance on its own task so a panic can be attributed to it.
async fn supervise_instance(
    handle: ServiceHandle,
    service: Box<dyn Service>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
    exits: mpsc::UnboundedSender<Exit>,
) {
    let span = tracing::info_span!("module", module = %handle.name());
    let task = tokio::spawn(
        run_instance(handle.clone(), service, cancel, shared, exits.clone()).instrument(span),
    );

    if let Err(join_err) = task.await {
        let error: SharedError = if join_err.is_panic() {
            Arc::new(TaskError::Panicked)
        } else {
            Arc::new(TaskError::Aborted)
        };
        handle.fail(error.clone());
        let _ = exits.send(Exit {
            module: handle.name().to_string(),
            kind: ExitKind::Failed(error),
        });
    }
}

async fn run_instance(
    handle: ServiceHandle,
    mut service: Box<dyn Service>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
    exits: mpsc::UnboundedSender<Exit>,
) {
    let module = handle.name().to_string();

    if cancel.is_cancelled() {
        tracing::debug!("Stopped before start");
        handle.transition(ServiceState::Terminated);
        return;
    }

    handle.transition(ServiceState::Starting);
    if let Err(err) = service.start(&cancel).await {
        let error: SharedError = Arc::from(err);
        handle.fail(error.clone());
        let _ = exits.send(Exit {
            module,
            kind: ExitKind::Failed(error),
        });
        return;
    }

    handle.transition(ServiceState::Running);
    let result = {
        let run = service.run(cancel.clone());
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => result,
            _ = cancel.cancelled() => {
                handle.transition(ServiceState::Stopping);
                run.await
            }
        }
    };
    handle.transition(ServiceState::Stopping);

    let (kind, own_failure) = match result {
        Ok(()) => (ExitKind::Completed, None),
        Err(err) if is_graceful_stop(err.as_ref()) => (ExitKind::GracefulStop, None),
        Err(err) => {
            let error: SharedError = Arc::from(err);
            let failure = ServiceFailure::new(module.clone(), error.clone());
            (ExitKind::Failed(error), Some(failure))
        }
    };
    let _ = exits.send(Exit {
        module: module.clone(),
        kind,
    });

    let reason = own_failure.clone().or_else(|| shared.trigger());
    let stopped = service.stop(reason.as_ref()).await;

    match (own_failure, stopped) {
        (Some(failure), Ok(())) => {
            handle.fail(failure.error);
        }
        (Some(failure), Err(stop_err)) => {
            tracing::warn!(error = %stop_err, "Module stop failed after run failure");
            handle.fail(failure.error);
        }
        (None, Ok(())) => {
            handle.transition(ServiceState::Terminated);
        }
        (None, Err(stop_err)) => {
            let error: SharedError = Arc::from(stop_err);
            handle.fail(error.clone());
            let _ = exits.send(Exit {
                module,
                kind: ExitKind::Failed(error),
            });
        }
    }
}

/// Reacts to run exits until every instance task has finished.
async fn supervise(
    mut exits: mpsc::UnboundedReceiver<Exit>,
    shared: Arc<Shared>,
    registry: ServiceRegistry,
) {
    while let Some(Exit { module, kind }) = exits.recv().await {
        match kind {
            ExitKind::Completed => {
                tracing::info!(module = %module, "Module finished");
            }
            ExitKind::GracefulStop => {
                tracing::info!(module = %module, "Received stop signal via return error");
                shared.cancel.cancel();
            }
            ExitKind::Failed(error) => {
                tracing::error!(module = %module, error = %error, "Module failed");
                metrics::record_module_failure(&module);
                shared.cascade(ServiceFailure::new(module, error));
            }
        }
    }

    let outcome = collect_failures(&registry);
    match &outcome {
        Ok(()) => tracing::info!("Application stopped"),
        Err(failure) => tracing::error!(error = %failure, "Application stopped with failed modules"),
    }
    shared.outcome.send_replace(Some(outcome));
}

fn collect_failures(registry: &ServiceRegistry) -> Outcome {
    let failures: Vec<ServiceFailure> = registry
        .sorted()
        .filter(|h| h.state() == ServiceState::Failed)
        .map(|h| {
            let error = h
                .failure_case()
                .unwrap_or_else(|| -> SharedError { Arc::new(TaskError::Aborted) });
            ServiceFailure::new(h.name(), error)
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ModuleFailure { failures })
    }
}

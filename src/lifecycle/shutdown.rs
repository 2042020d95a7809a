//! Shutdown coordination for the orchestrator.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::manager::LifecycleManager;

/// Process-wide "shutdown requested" flag.
///
/// Set before instances finish stopping so readiness probes fail for the
/// whole drain window.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Set the flag. Returns true only for the call that flipped it.
    pub fn request(&self) -> bool {
        !self.0.swap(true, Ordering::Relaxed)
    }
}

/// Waits for a termination request and drains the lifecycle manager.
pub struct ShutdownCoordinator {
    flag: ShutdownFlag,
    /// Programmatic trigger, in addition to the external signal.
    trigger: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(flag: ShutdownFlag) -> Self {
        Self {
            flag,
            trigger: CancellationToken::new(),
        }
    }

    pub fn flag(&self) -> ShutdownFlag {
        self.flag.clone()
    }

    /// Request shutdown without an external signal.
    pub fn trigger(&self) {
        self.trigger.cancel();
    }

    /// Token that fires when [`trigger`](Self::trigger) is called.
    pub fn trigger_token(&self) -> CancellationToken {
        self.trigger.clone()
    }

    /// Wait for `signal` or a trigger, then flag shutdown and stop all modules.
    ///
    /// Returns without doing anything if the manager stops on its own first.
    pub async fn run<S>(self, signal: S, manager: Arc<LifecycleManager>)
    where
        S: Future<Output = ()>,
    {
        tokio::select! {
            _ = signal => {
                tracing::info!("Termination signal received");
            }
            _ = self.trigger.cancelled() => {
                tracing::info!("Shutdown requested");
            }
            _ = manager.await_stopped() => {
                tracing::debug!("Modules stopped before any termination request");
                return;
            }
        }

        if self.flag.request() {
            manager.stop_all();
        }
    }

    /// Run the coordinator on its own task.
    pub fn spawn<S>(self, signal: S, manager: Arc<LifecycleManager>) -> JoinHandle<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run(signal, manager))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{BoxError, Service, ServiceState};
    use crate::modules::{ModuleGraphBuilder, TargetResolver};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Idle;

    #[async_trait]
    impl Service for Idle {
        async fn run(&mut self, cancel: CancellationToken) -> Result<(), BoxError> {
            cancel.cancelled().await;
            Ok(())
        }
    }

    fn manager() -> Arc<LifecycleManager> {
        let graph = ModuleGraphBuilder::<()>::new()
            .module("idle", |_| Ok(Some(Box::new(Idle) as Box<dyn Service>)))
            .build()
            .unwrap();
        let plan = TargetResolver::new(&graph).resolve(["idle"]).unwrap();
        Arc::new(LifecycleManager::initialize(&graph, &plan, &mut ()).unwrap())
    }

    #[test]
    fn test_flag_flips_once() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_requested());
        assert!(flag.request());
        assert!(!flag.request());
        assert!(flag.is_requested());
    }

    #[tokio::test]
    async fn test_signal_sets_flag_then_stops_modules() {
        let manager = manager();
        manager.start_all();

        let coordinator = ShutdownCoordinator::new(ShutdownFlag::new());
        let flag = coordinator.flag();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = coordinator.spawn(
            async move {
                let _ = rx.await;
            },
            manager.clone(),
        );

        assert!(!flag.is_requested());
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(flag.is_requested());
        assert!(manager.await_stopped().await.is_ok());
        assert_eq!(
            manager.registry().get("idle").unwrap().state(),
            ServiceState::Terminated
        );
    }

    #[tokio::test]
    async fn test_trigger_requests_shutdown() {
        let manager = manager();
        manager.start_all();

        let coordinator = ShutdownCoordinator::new(ShutdownFlag::new());
        let flag = coordinator.flag();
        let trigger = coordinator.trigger_token();
        let task = coordinator.spawn(std::future::pending(), manager.clone());

        trigger.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(flag.is_requested());
        let stopped = tokio::time::timeout(Duration::from_secs(5), manager.await_stopped()).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_exits_quietly_when_modules_stop_first() {
        let manager = manager();
        manager.start_all();

        let coordinator = ShutdownCoordinator::new(ShutdownFlag::new());
        let flag = coordinator.flag();
        let task = coordinator.spawn(std::future::pending(), manager.clone());

        manager.stop_all();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!flag.is_requested());
    }
}

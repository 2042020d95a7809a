//! Failure propagation observed through the probe endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atc::health::{self, HealthSurface};
use atc::lifecycle::{BoxError, Service, ServiceFailure, ShutdownFlag};
use atc::{LifecycleManager, ModuleGraphBuilder, TargetResolver};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

mod common;

/// Runs until cancelled and reports what `stop` received.
struct Idle {
    stopped: mpsc::UnboundedSender<Option<String>>,
}

#[async_trait]
impl Service for Idle {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), BoxError> {
        cancel.cancelled().await;
        Ok(())
    }

    async fn stop(&mut self, failure: Option<&ServiceFailure>) -> Result<(), BoxError> {
        let _ = self.stopped.send(failure.map(ToString::to_string));
        Ok(())
    }
}

/// Fails with "E" once told to.
struct Faulty {
    fail: Option<oneshot::Receiver<()>>,
}

#[async_trait]
impl Service for Faulty {
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), BoxError> {
        let fail = self.fail.take().ok_or("ran twice")?;
        tokio::select! {
            _ = cancel.cancelled() => Ok(()),
            _ = fail => Err("E".into()),
        }
    }
}

#[tokio::test]
async fn test_failure_stops_everything_and_shows_in_probes() {
    let (stopped_tx, mut stopped_rx) = mpsc::unbounded_channel();
    let (fail_tx, fail_rx) = oneshot::channel();
    let fail_rx = std::sync::Mutex::new(Some(fail_rx));

    let idle = move |_: &mut ()| -> atc::modules::FactoryResult {
        Ok(Some(Box::new(Idle {
            stopped: stopped_tx.clone(),
        })))
    };
    let graph = ModuleGraphBuilder::<()>::new()
        .module("A", idle.clone())
        .module("B", move |_| {
            Ok(Some(Box::new(Faulty {
                fail: fail_rx.lock().unwrap().take(),
            }) as Box<dyn Service>))
        })
        .module("C", idle)
        .depends("C", &["A", "B"])
        .build()
        .unwrap();

    let plan = TargetResolver::new(&graph).resolve(["C"]).unwrap();
    assert_eq!(plan.modules(), &["A", "B", "C"][..]);

    let manager = Arc::new(LifecycleManager::initialize(&graph, &plan, &mut ()).unwrap());
    let addr = common::serve(health::router(HealthSurface::new(
        manager.registry(),
        ShutdownFlag::new(),
    )))
    .await;

    manager.start_all();
    assert!(common::wait_for_ready(addr, Duration::from_secs(5)).await);

    fail_tx.send(()).unwrap();
    let failure = tokio::time::timeout(Duration::from_secs(5), manager.await_stopped())
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(failure.modules(), vec!["B"]);
    assert_eq!(failure.to_string(), "module B failed: E");

    for _ in 0..2 {
        let received = stopped_rx.recv().await.unwrap();
        assert_eq!(received.as_deref(), Some("module B failed: E"));
    }

    let (status, body) = common::get(addr, "/ready").await.unwrap();
    assert_eq!(status, 503);
    assert_eq!(
        body,
        "Some services are not Running:\nA: Terminated\nB: Failed\nC: Terminated\n"
    );

    let (_, table) = common::get(addr, "/services").await.unwrap();
    assert!(table.contains("Failed"));
    assert!(table.lines().any(|l| l.contains('B') && l.contains('E')));
}

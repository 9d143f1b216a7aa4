use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::oneshot;

use foreman_actor::actor::{ActorAction, ActorContext};

use crate::error::ComputeResult;
use crate::id::{ItemId, WorkerId};
use crate::rpc::FailureCode;
use crate::worker::actor::core::{CurrentComputation, WorkerActor};
use crate::worker::WorkerEvent;

impl WorkerActor {
    pub(super) fn handle_registered(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        worker_id: WorkerId,
    ) -> ActorAction {
        info!("registered with the dispatcher as operative {worker_id}");
        self.worker_id = Some(worker_id);
        ActorAction::Continue
    }

    pub(super) fn handle_run_item(
        &mut self,
        ctx: &mut ActorContext<Self>,
        item_id: ItemId,
        payload: Vec<u8>,
    ) -> ActorAction {
        let Some(worker_id) = self.worker_id else {
            return ActorAction::warn(format!(
                "item {item_id} assigned before registration completed"
            ));
        };
        if self.current.is_some() {
            // The dispatcher assigns one item at a time; refusing the second
            // assignment makes it reclaim and requeue the item.
            self.report_failure(
                ctx,
                worker_id,
                FailureCode::ComputationFailed,
                format!("operative is already computing; refusing item {item_id}"),
            );
            return ActorAction::Continue;
        }
        debug!("computing item {item_id}");
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.current = Some(CurrentComputation {
            item_id,
            cancel: cancel_tx,
        });
        let solver = Arc::clone(&self.options().solver);
        let handle = ctx.handle().clone();
        ctx.spawn(async move {
            tokio::select! {
                _ = cancel_rx => {
                    debug!("computation of item {item_id} abandoned");
                }
                outcome = solver.solve(payload) => {
                    let _ = handle
                        .send(WorkerEvent::ItemComputed { item_id, outcome })
                        .await;
                }
            }
        });
        ActorAction::Continue
    }

    pub(super) fn handle_stop_item(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        item_id: ItemId,
    ) -> ActorAction {
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.item_id == item_id)
        {
            if let Some(current) = self.current.take() {
                let _ = current.cancel.send(());
                debug!("stopped computation of item {item_id}");
            }
        } else {
            debug!("no computation of item {item_id} to stop");
        }
        ActorAction::Continue
    }

    pub(super) fn handle_item_computed(
        &mut self,
        ctx: &mut ActorContext<Self>,
        item_id: ItemId,
        outcome: ComputeResult<Vec<u8>>,
    ) -> ActorAction {
        if !self
            .current
            .as_ref()
            .is_some_and(|current| current.item_id == item_id)
        {
            // The computation was stopped before it finished; its result is
            // stale and must not reach the dispatcher.
            debug!("dropping stale result for item {item_id}");
            return ActorAction::Continue;
        }
        self.current = None;
        let Some(worker_id) = self.worker_id else {
            return ActorAction::warn(format!("no identity to return item {item_id} with"));
        };
        match outcome {
            Ok(result) => {
                let dispatcher = Arc::clone(&self.options().dispatcher);
                let retry = self.options().result_retry.clone();
                ctx.spawn(async move {
                    let out = retry
                        .run(|| dispatcher.return_result(worker_id, item_id, result.clone()))
                        .await;
                    if let Err(e) = out {
                        error!("failed to return the solution for item {item_id}: {e}");
                        if let Err(e) = dispatcher
                            .report_failure(
                                worker_id,
                                FailureCode::ResultDeliveryFailed,
                                e.to_string(),
                            )
                            .await
                        {
                            error!("failed to report the delivery failure: {e}");
                        }
                    }
                });
            }
            Err(e) => {
                warn!("computation of item {item_id} failed: {e}");
                self.report_failure(
                    ctx,
                    worker_id,
                    FailureCode::ComputationFailed,
                    e.to_string(),
                );
            }
        }
        ActorAction::Continue
    }

    pub(super) fn handle_probe(
        &mut self,
        _ctx: &mut ActorContext<Self>,
        result: oneshot::Sender<()>,
    ) -> ActorAction {
        let _ = result.send(());
        ActorAction::Continue
    }

    fn report_failure(
        &mut self,
        ctx: &mut ActorContext<Self>,
        worker_id: WorkerId,
        code: FailureCode,
        message: String,
    ) {
        let dispatcher = Arc::clone(&self.options().dispatcher);
        ctx.spawn(async move {
            if let Err(e) = dispatcher.report_failure(worker_id, code, message).await {
                error!("failed to report {code} to the dispatcher: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use foreman_actor::actor::ActorSystem;
    use foreman_actor::RetryStrategy;

    use super::*;
    use crate::error::ComputeError;
    use crate::rpc::{DispatcherClient, OperativeClient};
    use crate::worker::{Operative, PartialSolver, WorkerOptions};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Register,
        Unregister,
        ReturnResult(ItemId, Vec<u8>),
        ReportFailure(FailureCode),
    }

    /// Records every call an operative makes, optionally failing result
    /// returns a configurable number of times.
    struct ScriptedDispatcher {
        calls: Mutex<Vec<Call>>,
        notify: Notify,
        failing_returns: Mutex<usize>,
    }

    impl ScriptedDispatcher {
        fn new(failing_returns: usize) -> Self {
            Self {
                calls: Mutex::new(vec![]),
                notify: Notify::new(),
                failing_returns: Mutex::new(failing_returns),
            }
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
            self.notify.notify_waiters();
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        async fn wait_for(&self, predicate: impl Fn(&[Call]) -> bool) {
            loop {
                let notified = self.notify.notified();
                if predicate(&self.calls()) {
                    return;
                }
                notified.await;
            }
        }
    }

    #[async_trait]
    impl DispatcherClient for ScriptedDispatcher {
        async fn register(&self, _operative: Arc<dyn OperativeClient>) -> ComputeResult<WorkerId> {
            self.record(Call::Register);
            Ok(WorkerId::from(7))
        }

        async fn unregister(&self, _worker_id: WorkerId) -> ComputeResult<()> {
            self.record(Call::Unregister);
            Ok(())
        }

        async fn return_result(
            &self,
            _worker_id: WorkerId,
            item_id: ItemId,
            result: Vec<u8>,
        ) -> ComputeResult<()> {
            let mut failing = self.failing_returns.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(ComputeError::InternalError("transmit failed".to_string()));
            }
            drop(failing);
            self.record(Call::ReturnResult(item_id, result));
            Ok(())
        }

        async fn report_failure(
            &self,
            _worker_id: WorkerId,
            code: FailureCode,
            _message: String,
        ) -> ComputeResult<()> {
            self.record(Call::ReportFailure(code));
            Ok(())
        }
    }

    struct EchoSolver;

    #[async_trait]
    impl PartialSolver for EchoSolver {
        async fn solve(&self, item: Vec<u8>) -> ComputeResult<Vec<u8>> {
            Ok(item)
        }
    }

    struct FailingSolver;

    #[async_trait]
    impl PartialSolver for FailingSolver {
        async fn solve(&self, _item: Vec<u8>) -> ComputeResult<Vec<u8>> {
            Err(ComputeError::InternalError("division by zero".to_string()))
        }
    }

    struct StuckSolver;

    #[async_trait]
    impl PartialSolver for StuckSolver {
        async fn solve(&self, item: Vec<u8>) -> ComputeResult<Vec<u8>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(item)
        }
    }

    fn options(
        dispatcher: &Arc<ScriptedDispatcher>,
        solver: Arc<dyn PartialSolver>,
    ) -> WorkerOptions {
        WorkerOptions {
            dispatcher: Arc::clone(dispatcher) as Arc<dyn DispatcherClient>,
            solver,
            result_retry: RetryStrategy::Fixed {
                max_count: 3,
                delay: Duration::from_secs(3),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_operative_computes_and_returns_result() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(0));
        let mut system = ActorSystem::new();
        let operative = Operative::start(&mut system, options(&dispatcher, Arc::new(EchoSolver)));

        dispatcher
            .wait_for(|calls| calls.contains(&Call::Register))
            .await;
        let client = operative.client();
        client.assign(ItemId::from(1), vec![42]).await.unwrap();
        dispatcher
            .wait_for(|calls| calls.contains(&Call::ReturnResult(ItemId::from(1), vec![42])))
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_operative_retries_delivery_then_reports_failure() {
        // More failures than the retry budget of 1 + 3 attempts.
        let dispatcher = Arc::new(ScriptedDispatcher::new(10));
        let mut system = ActorSystem::new();
        let operative = Operative::start(&mut system, options(&dispatcher, Arc::new(EchoSolver)));

        dispatcher
            .wait_for(|calls| calls.contains(&Call::Register))
            .await;
        let client = operative.client();
        client.assign(ItemId::from(1), vec![1]).await.unwrap();
        dispatcher
            .wait_for(|calls| {
                calls.contains(&Call::ReportFailure(FailureCode::ResultDeliveryFailed))
            })
            .await;
        assert_eq!(*dispatcher.failing_returns.lock().unwrap(), 10 - 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operative_reports_computation_failure() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(0));
        let mut system = ActorSystem::new();
        let operative =
            Operative::start(&mut system, options(&dispatcher, Arc::new(FailingSolver)));

        dispatcher
            .wait_for(|calls| calls.contains(&Call::Register))
            .await;
        let client = operative.client();
        client.assign(ItemId::from(1), vec![1]).await.unwrap();
        dispatcher
            .wait_for(|calls| {
                calls.contains(&Call::ReportFailure(FailureCode::ComputationFailed))
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_canceled_computation_never_returns_a_result() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(0));
        let mut system = ActorSystem::new();
        let operative = Operative::start(&mut system, options(&dispatcher, Arc::new(StuckSolver)));

        dispatcher
            .wait_for(|calls| calls.contains(&Call::Register))
            .await;
        let client = operative.client();
        client.assign(ItemId::from(1), vec![1]).await.unwrap();
        client.cancel(ItemId::from(1)).await.unwrap();
        client.probe().await.unwrap();

        // The stuck solver would have "finished" long before this without
        // the cancellation.
        tokio::time::sleep(Duration::from_secs(7200)).await;
        let calls = dispatcher.calls();
        assert!(!calls
            .iter()
            .any(|call| matches!(call, Call::ReturnResult(..))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminate_unregisters_the_operative() {
        let dispatcher = Arc::new(ScriptedDispatcher::new(0));
        let mut system = ActorSystem::new();
        let operative = Operative::start(&mut system, options(&dispatcher, Arc::new(EchoSolver)));

        dispatcher
            .wait_for(|calls| calls.contains(&Call::Register))
            .await;
        operative.client().terminate().await.unwrap();
        dispatcher
            .wait_for(|calls| calls.contains(&Call::Unregister))
            .await;
        system.join().await;
    }
}

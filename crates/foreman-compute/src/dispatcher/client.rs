use std::sync::Arc;

use async_trait::async_trait;

use foreman_actor::actor::ActorHandle;

use crate::dispatcher::actor::DispatcherActor;
use crate::dispatcher::DispatcherEvent;
use crate::error::{ComputeError, ComputeResult};
use crate::id::{ItemId, WorkerId};
use crate::rpc::{DispatcherClient, FailureCode, OperativeClient};

/// The in-process implementation of [DispatcherClient], backed by the
/// dispatcher actor's mailbox. A network transport would implement the same
/// trait against a remote dispatcher.
pub struct LocalDispatcherClient {
    handle: ActorHandle<DispatcherActor>,
}

impl LocalDispatcherClient {
    pub(crate) fn new(handle: ActorHandle<DispatcherActor>) -> Self {
        Self { handle }
    }

    fn stopped() -> ComputeError {
        ComputeError::InternalError("the dispatcher has stopped".to_string())
    }
}

#[async_trait]
impl DispatcherClient for LocalDispatcherClient {
    async fn register(&self, operative: Arc<dyn OperativeClient>) -> ComputeResult<WorkerId> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.handle
            .send(DispatcherEvent::RegisterOperative {
                client: operative,
                result: tx,
            })
            .await
            .map_err(|_| Self::stopped())?;
        rx.await.map_err(|_| Self::stopped())?
    }

    async fn unregister(&self, worker_id: WorkerId) -> ComputeResult<()> {
        self.handle
            .send(DispatcherEvent::UnregisterOperative { worker_id })
            .await
            .map_err(|_| Self::stopped())
    }

    async fn return_result(
        &self,
        worker_id: WorkerId,
        item_id: ItemId,
        result: Vec<u8>,
    ) -> ComputeResult<()> {
        self.handle
            .send(DispatcherEvent::ReturnPartialSolution {
                worker_id,
                item_id,
                payload: result,
            })
            .await
            .map_err(|_| Self::stopped())
    }

    async fn report_failure(
        &self,
        worker_id: WorkerId,
        code: FailureCode,
        message: String,
    ) -> ComputeResult<()> {
        self.handle
            .send(DispatcherEvent::ReportException {
                worker_id,
                code,
                message,
            })
            .await
            .map_err(|_| Self::stopped())
    }
}

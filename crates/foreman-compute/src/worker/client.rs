use async_trait::async_trait;
use tokio::sync::oneshot;

use foreman_actor::actor::ActorHandle;

use crate::error::{ComputeError, ComputeResult};
use crate::id::ItemId;
use crate::rpc::OperativeClient;
use crate::worker::actor::WorkerActor;
use crate::worker::WorkerEvent;

/// The in-process implementation of [OperativeClient], backed by the worker
/// actor's mailbox. A network transport would implement the same trait
/// against a remote operative.
pub struct LocalOperativeClient {
    handle: ActorHandle<WorkerActor>,
}

impl LocalOperativeClient {
    pub(crate) fn new(handle: ActorHandle<WorkerActor>) -> Self {
        Self { handle }
    }

    fn unreachable() -> ComputeError {
        ComputeError::OperativeUnreachable("the operative has stopped".to_string())
    }
}

#[async_trait]
impl OperativeClient for LocalOperativeClient {
    async fn assign(&self, item_id: ItemId, payload: Vec<u8>) -> ComputeResult<()> {
        self.handle
            .send(WorkerEvent::RunItem { item_id, payload })
            .await
            .map_err(|_| Self::unreachable())
    }

    async fn cancel(&self, item_id: ItemId) -> ComputeResult<()> {
        self.handle
            .send(WorkerEvent::StopItem { item_id })
            .await
            .map_err(|_| Self::unreachable())
    }

    async fn probe(&self) -> ComputeResult<()> {
        let (tx, rx) = oneshot::channel();
        self.handle
            .send(WorkerEvent::Probe { result: tx })
            .await
            .map_err(|_| Self::unreachable())?;
        rx.await.map_err(|_| Self::unreachable())
    }

    async fn terminate(&self) -> ComputeResult<()> {
        self.handle
            .send(WorkerEvent::Shutdown)
            .await
            .map_err(|_| Self::unreachable())
    }
}

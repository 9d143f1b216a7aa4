use std::sync::Arc;

use tokio::sync::oneshot;

use foreman_actor::actor::{ActorHandle, ActorSystem};

use crate::dispatcher::actor::DispatcherActor;
use crate::dispatcher::client::LocalDispatcherClient;
use crate::dispatcher::{DispatcherEvent, DispatcherOptions};
use crate::error::{ComputeError, ComputeResult};
use crate::id::{ProblemId, WorkerId};
use crate::problem::Problem;
use crate::rpc::{DispatcherClient, OperativeClient, TransmitterClient};
use crate::stats::{ProblemReport, SystemReport};

/// The public face of the dispatcher: clients submit and abort problems and
/// read statistics through it, and operatives obtain their callback client
/// from it. All methods are thin asynchronous calls into the dispatcher
/// actor.
pub struct ComputeManager {
    handle: ActorHandle<DispatcherActor>,
}

fn dispatcher_stopped() -> ComputeError {
    ComputeError::InternalError("the dispatcher has stopped".to_string())
}

impl ComputeManager {
    pub fn start(system: &mut ActorSystem, options: DispatcherOptions) -> Self {
        Self {
            handle: system.spawn::<DispatcherActor>(options),
        }
    }

    /// The client through which operatives reach this dispatcher.
    pub fn client(&self) -> Arc<dyn DispatcherClient> {
        Arc::new(LocalDispatcherClient::new(self.handle.clone()))
    }

    pub async fn register_operative(
        &self,
        operative: Arc<dyn OperativeClient>,
    ) -> ComputeResult<WorkerId> {
        let (tx, rx) = oneshot::channel();
        self.handle
            .send(DispatcherEvent::RegisterOperative {
                client: operative,
                result: tx,
            })
            .await
            .map_err(|_| dispatcher_stopped())?;
        rx.await.map_err(|_| dispatcher_stopped())?
    }

    pub async fn unregister_operative(&self, worker_id: WorkerId) -> ComputeResult<()> {
        self.handle
            .send(DispatcherEvent::UnregisterOperative { worker_id })
            .await
            .map_err(|_| dispatcher_stopped())
    }

    /// Submits a problem for distributed computation. The final result and
    /// any out-of-band messages are delivered through `transmitter`.
    pub async fn submit_problem(
        &self,
        problem: Box<dyn Problem>,
        transmitter: Arc<dyn TransmitterClient>,
    ) -> ComputeResult<ProblemId> {
        let (tx, rx) = oneshot::channel();
        self.handle
            .send(DispatcherEvent::SubmitProblem {
                problem,
                transmitter,
                result: tx,
            })
            .await
            .map_err(|_| dispatcher_stopped())?;
        rx.await.map_err(|_| dispatcher_stopped())?
    }

    /// Discards all state of a problem and stops every computation still
    /// running for it.
    pub async fn abort_problem(&self, problem_id: ProblemId) -> ComputeResult<()> {
        let (tx, rx) = oneshot::channel();
        self.handle
            .send(DispatcherEvent::AbortProblem {
                problem_id,
                result: tx,
            })
            .await
            .map_err(|_| dispatcher_stopped())?;
        rx.await.map_err(|_| dispatcher_stopped())?
    }

    pub async fn problem_statistics(&self, problem_id: ProblemId) -> ComputeResult<ProblemReport> {
        let (tx, rx) = oneshot::channel();
        self.handle
            .send(DispatcherEvent::GetProblemStatistics {
                problem_id,
                result: tx,
            })
            .await
            .map_err(|_| dispatcher_stopped())?;
        rx.await.map_err(|_| dispatcher_stopped())?
    }

    pub async fn system_statistics(&self) -> ComputeResult<SystemReport> {
        let (tx, rx) = oneshot::channel();
        self.handle
            .send(DispatcherEvent::GetSystemStatistics { result: tx })
            .await
            .map_err(|_| dispatcher_stopped())?;
        rx.await.map_err(|_| dispatcher_stopped())
    }

    /// Stops the dispatcher, notifying clients and telling every registered
    /// operative to exit, best effort. All problem state is lost.
    pub async fn shutdown(self) -> ComputeResult<()> {
        self.handle
            .send(DispatcherEvent::Shutdown)
            .await
            .map_err(|_| dispatcher_stopped())?;
        self.handle.wait_for_stop().await;
        Ok(())
    }
}

use std::sync::Arc;

use log::{debug, error};
use tokio::sync::oneshot;

use foreman_actor::actor::{Actor, ActorAction, ActorContext};

use crate::id::{ItemId, WorkerId};
use crate::rpc::OperativeClient;
use crate::worker::client::LocalOperativeClient;
use crate::worker::event::WorkerEvent;
use crate::worker::options::WorkerOptions;

/// The operative runtime: computes one assigned item at a time and routes
/// the partial solution back to the dispatcher.
pub struct WorkerActor {
    options: WorkerOptions,
    /// The identity assigned by the dispatcher at registration.
    pub(super) worker_id: Option<WorkerId>,
    pub(super) current: Option<CurrentComputation>,
}

pub(super) struct CurrentComputation {
    pub item_id: ItemId,
    /// Dropping or firing this signal abandons the computation task.
    pub cancel: oneshot::Sender<()>,
}

impl Actor for WorkerActor {
    type Message = WorkerEvent;
    type Options = WorkerOptions;

    fn new(options: WorkerOptions) -> Self {
        Self {
            options,
            worker_id: None,
            current: None,
        }
    }

    fn start(&mut self, ctx: &mut ActorContext<Self>) {
        let operative: Arc<dyn OperativeClient> =
            Arc::new(LocalOperativeClient::new(ctx.handle().clone()));
        let dispatcher = Arc::clone(&self.options.dispatcher);
        let handle = ctx.handle().clone();
        ctx.spawn(async move {
            match dispatcher.register(operative).await {
                Ok(worker_id) => {
                    let _ = handle.send(WorkerEvent::Registered { worker_id }).await;
                }
                Err(e) => {
                    error!("failed to register with the dispatcher: {e}");
                    let _ = handle.send(WorkerEvent::Shutdown).await;
                }
            }
        });
    }

    fn receive(&mut self, ctx: &mut ActorContext<Self>, message: WorkerEvent) -> ActorAction {
        match message {
            WorkerEvent::Registered { worker_id } => self.handle_registered(ctx, worker_id),
            WorkerEvent::RunItem { item_id, payload } => {
                self.handle_run_item(ctx, item_id, payload)
            }
            WorkerEvent::StopItem { item_id } => self.handle_stop_item(ctx, item_id),
            WorkerEvent::ItemComputed { item_id, outcome } => {
                self.handle_item_computed(ctx, item_id, outcome)
            }
            WorkerEvent::Probe { result } => self.handle_probe(ctx, result),
            WorkerEvent::Shutdown => ActorAction::Stop,
        }
    }

    fn stop(self, ctx: &mut ActorContext<Self>) {
        // Dropping `current` fires the cancellation signal of any in-flight
        // computation task.
        if let Some(worker_id) = self.worker_id {
            debug!("operative {worker_id} is exiting");
            let dispatcher = Arc::clone(&self.options.dispatcher);
            ctx.spawn(async move {
                let _ = dispatcher.unregister(worker_id).await;
            });
        }
    }
}

impl WorkerActor {
    pub(super) fn options(&self) -> &WorkerOptions {
        &self.options
    }
}

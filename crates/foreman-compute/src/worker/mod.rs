mod actor;
mod client;
mod event;
mod options;
mod solver;

use std::sync::Arc;

use foreman_actor::actor::{ActorHandle, ActorSystem};

pub(crate) use actor::WorkerActor;
pub use client::LocalOperativeClient;
pub(crate) use event::WorkerEvent;
pub use options::WorkerOptions;
pub use solver::PartialSolver;

use crate::rpc::OperativeClient;

/// An operative running inside this process.
pub struct Operative {
    handle: ActorHandle<WorkerActor>,
}

impl Operative {
    /// Spawns the operative runtime. It registers itself with the
    /// dispatcher as soon as it starts and exits when the dispatcher tells
    /// it to terminate.
    pub fn start(system: &mut ActorSystem, options: WorkerOptions) -> Self {
        Self {
            handle: system.spawn::<WorkerActor>(options),
        }
    }

    /// The client through which the dispatcher reaches this operative.
    pub fn client(&self) -> Arc<dyn OperativeClient> {
        Arc::new(LocalOperativeClient::new(self.handle.clone()))
    }

    pub async fn wait_for_stop(self) {
        self.handle.wait_for_stop().await;
    }
}

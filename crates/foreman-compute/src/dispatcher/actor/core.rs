use futures::future::join_all;
use log::{info, warn};

use foreman_actor::actor::{Actor, ActorAction, ActorContext};

use crate::dispatcher::state::DispatcherState;
use crate::dispatcher::{DispatcherEvent, DispatcherOptions};
use crate::rpc::MessageCode;

/// The coordination core of the dispatcher.
///
/// All shared state lives inside this actor and is mutated only from its
/// event loop; remote calls are issued from spawned tasks against snapshots
/// taken inside the loop, so no lock is ever held across a remote round
/// trip.
pub struct DispatcherActor {
    options: DispatcherOptions,
    pub(super) state: DispatcherState,
}

impl Actor for DispatcherActor {
    type Message = DispatcherEvent;
    type Options = DispatcherOptions;

    fn new(options: DispatcherOptions) -> Self {
        Self {
            options,
            state: DispatcherState::new(),
        }
    }

    fn start(&mut self, _ctx: &mut ActorContext<Self>) {
        info!("dispatcher is ready");
    }

    fn receive(&mut self, ctx: &mut ActorContext<Self>, message: DispatcherEvent) -> ActorAction {
        match message {
            DispatcherEvent::RegisterOperative { client, result } => {
                self.handle_register_operative(ctx, client, result)
            }
            DispatcherEvent::UnregisterOperative { worker_id } => {
                self.handle_unregister_operative(ctx, worker_id)
            }
            DispatcherEvent::SubmitProblem {
                problem,
                transmitter,
                result,
            } => self.handle_submit_problem(ctx, problem, transmitter, result),
            DispatcherEvent::AbortProblem { problem_id, result } => {
                self.handle_abort_problem(ctx, problem_id, result)
            }
            DispatcherEvent::ReturnPartialSolution {
                worker_id,
                item_id,
                payload,
            } => self.handle_return_partial_solution(ctx, worker_id, item_id, payload),
            DispatcherEvent::ReportException {
                worker_id,
                code,
                message,
            } => self.handle_report_exception(ctx, worker_id, code, message),
            DispatcherEvent::AssignmentFailed {
                worker_id,
                item_id,
                message,
            } => self.handle_assignment_failed(ctx, worker_id, item_id, message),
            DispatcherEvent::ProbeOperative { worker_id } => {
                self.handle_probe_operative(ctx, worker_id)
            }
            DispatcherEvent::ProbeOutcome {
                worker_id,
                reachable,
            } => self.handle_probe_outcome(ctx, worker_id, reachable),
            DispatcherEvent::GetProblemStatistics { problem_id, result } => {
                self.handle_get_problem_statistics(problem_id, result)
            }
            DispatcherEvent::GetSystemStatistics { result } => {
                self.handle_get_system_statistics(result)
            }
            DispatcherEvent::Shutdown => ActorAction::Stop,
        }
    }

    fn stop(self, ctx: &mut ActorContext<Self>) {
        info!("dispatcher is shutting down");
        let transmitters = self.state.transmitters();
        let clients = self.state.registry.all_clients();
        ctx.spawn(async move {
            for transmitter in transmitters {
                if let Err(e) = transmitter
                    .deliver_message(
                        MessageCode::DispatcherShutdown,
                        "the dispatcher is shutting down".to_string(),
                    )
                    .await
                {
                    warn!("failed to notify a client of the shutdown: {e}");
                }
            }
            for out in join_all(clients.iter().map(|client| client.terminate())).await {
                if let Err(e) = out {
                    warn!("failed to terminate an operative: {e}");
                }
            }
        });
    }
}

impl DispatcherActor {
    pub(super) fn options(&self) -> &DispatcherOptions {
        &self.options
    }
}

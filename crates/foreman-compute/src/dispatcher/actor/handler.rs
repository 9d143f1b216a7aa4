use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::oneshot;

use foreman_actor::actor::{ActorAction, ActorContext};

use crate::dispatcher::actor::DispatcherActor;
use crate::dispatcher::queue::{Acceptance, Reclaim, WorkQueue};
use crate::dispatcher::state::{ProblemDescriptor, ProblemStage};
use crate::dispatcher::DispatcherEvent;
use crate::error::{ComputeError, ComputeResult};
use crate::id::{ItemId, ProblemId, WorkerId};
use crate::problem::Problem;
use crate::rpc::{FailureCode, MessageCode, OperativeClient, TransmitterClient};
use crate::stats::{ProblemReport, ProblemStatistics, SystemReport};

enum SolutionOutcome {
    Duplicate,
    Collected {
        other_holders: Vec<WorkerId>,
        cancellable: bool,
    },
    CollectFailed(String),
}

impl DispatcherActor {
    pub(super) fn handle_register_operative(
        &mut self,
        ctx: &mut ActorContext<Self>,
        client: Arc<dyn OperativeClient>,
        result: oneshot::Sender<ComputeResult<WorkerId>>,
    ) -> ActorAction {
        let worker_id = match self.state.next_worker_id() {
            Ok(x) => x,
            Err(e) => {
                let _ = result.send(Err(e));
                return ActorAction::fail("failed to generate operative identities");
            }
        };
        self.state.registry.register(worker_id, client);
        self.state.system_statistics.notify_operative_registered();
        info!("operative {worker_id} registered");
        let _ = result.send(Ok(worker_id));
        ctx.send_with_delay(
            DispatcherEvent::ProbeOperative { worker_id },
            self.options().probe_interval,
        );
        // A new idle operative may be able to pick up queued work right away.
        self.assignment_pass(ctx);
        ActorAction::Continue
    }

    pub(super) fn handle_unregister_operative(
        &mut self,
        ctx: &mut ActorContext<Self>,
        worker_id: WorkerId,
    ) -> ActorAction {
        self.remove_operative(ctx, worker_id);
        self.assignment_pass(ctx);
        ActorAction::Continue
    }

    pub(super) fn handle_submit_problem(
        &mut self,
        ctx: &mut ActorContext<Self>,
        problem: Box<dyn Problem>,
        transmitter: Arc<dyn TransmitterClient>,
        result: oneshot::Sender<ComputeResult<ProblemId>>,
    ) -> ActorAction {
        let problem_id = match self.state.next_problem_id() {
            Ok(x) => x,
            Err(e) => {
                let _ = result.send(Err(e));
                return ActorAction::fail("failed to generate problem identities");
            }
        };
        let capabilities = problem.capabilities();
        let statistics = Arc::new(ProblemStatistics::new(Some(Arc::clone(
            &self.state.system_statistics,
        ))));
        self.state.add_problem(
            problem_id,
            ProblemDescriptor {
                problem,
                transmitter,
                capabilities,
                stage: ProblemStage::Submitted,
                queue: WorkQueue::new(),
                statistics,
            },
        );
        let suggested = self.state.registry.all_idle().len();
        match self.request_more_items(problem_id, suggested) {
            Ok(count) => {
                info!("problem {problem_id} submitted with {count} initial items");
                if let Some(descriptor) = self.state.get_problem_mut(problem_id) {
                    descriptor.stage = ProblemStage::Distributing;
                }
                let _ = result.send(Ok(problem_id));
                // Degenerate problems may report a final result without ever
                // producing an item.
                self.check_completion(ctx, problem_id);
                self.assignment_pass(ctx);
            }
            Err(e) => {
                // Fatal to this submission only; other problems and
                // operatives are unaffected.
                if let Some(descriptor) = self.state.remove_problem(problem_id) {
                    let created = descriptor.queue.outstanding_len() as u64;
                    descriptor.statistics.notify_aborted_items(created);
                }
                let _ = result.send(Err(ComputeError::ProblemSetup(e.to_string())));
            }
        }
        ActorAction::Continue
    }

    pub(super) fn handle_abort_problem(
        &mut self,
        ctx: &mut ActorContext<Self>,
        problem_id: ProblemId,
        result: oneshot::Sender<ComputeResult<()>>,
    ) -> ActorAction {
        if self.state.get_problem(problem_id).is_none() {
            let _ = result.send(Err(ComputeError::InvalidArgument(format!(
                "problem {problem_id} not found"
            ))));
            return ActorAction::Continue;
        }
        info!("aborting problem {problem_id} on client request");
        self.discard_problem(
            ctx,
            problem_id,
            Some((
                MessageCode::ProblemAborted,
                format!("problem {problem_id} aborted on client request"),
            )),
            None,
        );
        let _ = result.send(Ok(()));
        // The abort may have freed operatives for other problems.
        self.assignment_pass(ctx);
        ActorAction::Continue
    }

    pub(super) fn handle_return_partial_solution(
        &mut self,
        ctx: &mut ActorContext<Self>,
        worker_id: WorkerId,
        item_id: ItemId,
        payload: Vec<u8>,
    ) -> ActorAction {
        if self.state.registry.assignment_of(worker_id) == Some(item_id) {
            self.state.registry.mark_idle(worker_id);
            self.state.system_statistics.notify_operative_idle();
        }
        let Some(problem_id) = self.state.problem_of_item(item_id) else {
            // A late result for a problem that has completed or been
            // aborted; discarded, the operative is simply freed.
            debug!("discarding result for unknown item {item_id} from operative {worker_id}");
            self.assignment_pass(ctx);
            return ActorAction::Continue;
        };
        let outcome = match self.state.get_problem_mut(problem_id) {
            Some(descriptor) => match descriptor.queue.accept(item_id, worker_id) {
                Acceptance::Duplicate => SolutionOutcome::Duplicate,
                Acceptance::First { other_holders } => {
                    descriptor.statistics.notify_item_computed(item_id, worker_id);
                    let item_payload = descriptor.queue.remove(item_id).unwrap_or_default();
                    match descriptor.problem.collect_result(payload, &item_payload) {
                        Ok(()) => {
                            descriptor.statistics.notify_item_processed();
                            SolutionOutcome::Collected {
                                other_holders,
                                cancellable: descriptor.capabilities.cancellable,
                            }
                        }
                        Err(e) => SolutionOutcome::CollectFailed(e.to_string()),
                    }
                }
            },
            None => SolutionOutcome::Duplicate,
        };
        match outcome {
            SolutionOutcome::Duplicate => {
                debug!("discarding duplicate result for item {item_id} from operative {worker_id}");
            }
            SolutionOutcome::Collected {
                other_holders,
                cancellable,
            } => {
                debug!("operative {worker_id} solved item {item_id}");
                self.state.drop_item(item_id);
                for other in other_holders {
                    self.stop_redundant_computation(ctx, other, item_id, cancellable);
                }
                self.check_completion(ctx, problem_id);
            }
            SolutionOutcome::CollectFailed(message) => {
                self.state.drop_item(item_id);
                self.fail_problem(
                    ctx,
                    problem_id,
                    format!("failed to collect a partial solution: {message}"),
                );
            }
        }
        self.assignment_pass(ctx);
        ActorAction::Continue
    }

    pub(super) fn handle_report_exception(
        &mut self,
        ctx: &mut ActorContext<Self>,
        worker_id: WorkerId,
        code: FailureCode,
        message: String,
    ) -> ActorAction {
        if !self.state.registry.contains(worker_id) {
            return ActorAction::warn(format!(
                "ignoring {code} from unknown operative {worker_id}: {message}"
            ));
        }
        warn!("operative {worker_id} reported {code}: {message}");
        // The item is retried elsewhere; the operative stays registered and
        // becomes eligible for new work immediately.
        if let Some(item_id) = self.state.registry.mark_idle(worker_id) {
            self.state.system_statistics.notify_operative_idle();
            self.reclaim_item(worker_id, item_id);
        }
        self.assignment_pass(ctx);
        ActorAction::Continue
    }

    pub(super) fn handle_assignment_failed(
        &mut self,
        ctx: &mut ActorContext<Self>,
        worker_id: WorkerId,
        item_id: ItemId,
        message: String,
    ) -> ActorAction {
        warn!("failed to assign item {item_id} to operative {worker_id}: {message}");
        // An unreachable operative is treated as dead right away rather than
        // probed to death; the item takes the usual reclaim path.
        self.remove_operative(ctx, worker_id);
        self.assignment_pass(ctx);
        ActorAction::Continue
    }

    pub(super) fn handle_get_problem_statistics(
        &mut self,
        problem_id: ProblemId,
        result: oneshot::Sender<ComputeResult<ProblemReport>>,
    ) -> ActorAction {
        let out = match self.state.get_problem(problem_id) {
            Some(descriptor) => Ok(descriptor.statistics.report(descriptor.queue.queued_len())),
            None => Err(ComputeError::InvalidArgument(format!(
                "problem {problem_id} not found"
            ))),
        };
        let _ = result.send(out);
        ActorAction::Continue
    }

    pub(super) fn handle_get_system_statistics(
        &mut self,
        result: oneshot::Sender<SystemReport>,
    ) -> ActorAction {
        let _ = result.send(self.state.system_statistics.report());
        ActorAction::Continue
    }

    /// Removes an operative and reclaims whatever it held.
    /// Shared by explicit unregistration, liveness-declared death, and
    /// assignment failures. A no-op for unknown identities.
    pub(super) fn remove_operative(&mut self, _ctx: &mut ActorContext<Self>, worker_id: WorkerId) {
        let Some(descriptor) = self.state.registry.unregister(worker_id) else {
            return;
        };
        self.state
            .system_statistics
            .notify_operative_unregistered(descriptor.assignment.is_none());
        info!("operative {worker_id} removed");
        if let Some(item_id) = descriptor.assignment {
            self.reclaim_item(worker_id, item_id);
        }
    }

    /// Removes `worker_id` from the holder set of `item_id`; the item
    /// returns to the front of its queue if no other operative holds it.
    fn reclaim_item(&mut self, worker_id: WorkerId, item_id: ItemId) {
        let Some(problem_id) = self.state.problem_of_item(item_id) else {
            return;
        };
        let Some(descriptor) = self.state.get_problem_mut(problem_id) else {
            return;
        };
        match descriptor.queue.reclaim(item_id, worker_id) {
            Reclaim::Requeued => {
                descriptor.statistics.notify_item_reclaimed(item_id);
                info!("item {item_id} reclaimed from operative {worker_id}");
            }
            Reclaim::StillHeld => {
                debug!("item {item_id} is still held by another operative");
            }
            Reclaim::Ignored => {}
        }
    }

    /// Frees an operative whose in-flight item was solved by someone else,
    /// and tells it to abandon the computation.
    fn stop_redundant_computation(
        &mut self,
        ctx: &mut ActorContext<Self>,
        worker_id: WorkerId,
        item_id: ItemId,
        cancellable: bool,
    ) {
        if self.state.registry.assignment_of(worker_id) == Some(item_id) {
            self.state.registry.mark_idle(worker_id);
            self.state.system_statistics.notify_operative_idle();
        }
        if !cancellable {
            return;
        }
        let Some(client) = self.state.registry.client_of(worker_id) else {
            return;
        };
        ctx.spawn(async move {
            if let Err(e) = client.cancel(item_id).await {
                warn!("failed to stop computation of item {item_id} on operative {worker_id}: {e}");
            }
        });
    }

    /// Asks the problem for more items, up to the suggested batch size.
    /// The suggestion is derived from the idle operative count and is never
    /// below the configured floor.
    fn request_more_items(
        &mut self,
        problem_id: ProblemId,
        suggested: usize,
    ) -> ComputeResult<usize> {
        let suggested = suggested.max(self.options().batch_floor).max(1);
        let mut added = 0;
        for _ in 0..suggested {
            let produced = match self.state.get_problem_mut(problem_id) {
                Some(descriptor) => descriptor.problem.produce_next_item(suggested)?,
                None => return Ok(added),
            };
            // [None] signals "no more items right now"; the problem is asked
            // again on a later pass.
            let Some(payload) = produced else {
                break;
            };
            let item_id = self.state.next_item_id()?;
            self.state.register_item(item_id, problem_id);
            if let Some(descriptor) = self.state.get_problem_mut(problem_id) {
                descriptor.queue.enqueue(item_id, payload);
            }
            added += 1;
        }
        if let Some(descriptor) = self.state.get_problem(problem_id) {
            descriptor.statistics.notify_requested_items(suggested as u64);
            descriptor.statistics.notify_created_items(added as u64);
        }
        Ok(added)
    }

    /// Pairs idle operatives with dequeued items until either runs out,
    /// visiting problems in arrival order. Invoked after every state change
    /// that could create a new idle-operative/queued-item pairing.
    pub(super) fn assignment_pass(&mut self, ctx: &mut ActorContext<Self>) {
        let problem_ids = self.state.active_problem_ids();
        let mut idle = self.state.registry.all_idle();
        'problems: for problem_id in problem_ids {
            loop {
                if idle.is_empty() {
                    break 'problems;
                }
                let queued = self
                    .state
                    .get_problem(problem_id)
                    .map(|descriptor| descriptor.queue.queued_len())
                    .unwrap_or(0);
                if queued == 0 {
                    let suggested = idle.len();
                    match self.request_more_items(problem_id, suggested) {
                        Ok(0) => break,
                        Ok(_) => {}
                        Err(e) => {
                            self.fail_problem(
                                ctx,
                                problem_id,
                                format!("failed to produce more items: {e}"),
                            );
                            break;
                        }
                    }
                }
                let Some(item_id) = self
                    .state
                    .get_problem_mut(problem_id)
                    .and_then(|descriptor| descriptor.queue.dequeue())
                else {
                    break;
                };
                let Some(worker_id) = idle.pop() else {
                    break 'problems;
                };
                self.dispatch_item(ctx, problem_id, item_id, worker_id);
            }
        }
    }

    fn dispatch_item(
        &mut self,
        ctx: &mut ActorContext<Self>,
        problem_id: ProblemId,
        item_id: ItemId,
        worker_id: WorkerId,
    ) {
        let Some(descriptor) = self.state.get_problem_mut(problem_id) else {
            return;
        };
        let Some(payload) = descriptor.queue.payload(item_id).map(|p| p.to_vec()) else {
            return;
        };
        if descriptor.queue.add_holder(item_id, worker_id) {
            descriptor.statistics.notify_item_dispatched(item_id);
        }
        self.state.registry.mark_busy(worker_id, item_id);
        self.state.system_statistics.notify_operative_busy();
        let Some(client) = self.state.registry.client_of(worker_id) else {
            return;
        };
        debug!("assigning item {item_id} to operative {worker_id}");
        let handle = ctx.handle().clone();
        ctx.spawn(async move {
            if let Err(e) = client.assign(item_id, payload).await {
                let _ = handle
                    .send(DispatcherEvent::AssignmentFailed {
                        worker_id,
                        item_id,
                        message: e.to_string(),
                    })
                    .await;
            }
        });
    }

    /// Asks the problem whether a final result exists; if so, delivers it
    /// and discards the problem state.
    fn check_completion(&mut self, ctx: &mut ActorContext<Self>, problem_id: ProblemId) {
        let Some(descriptor) = self.state.get_problem_mut(problem_id) else {
            return;
        };
        if descriptor.stage != ProblemStage::Distributing {
            return;
        }
        let Some(result) = descriptor.problem.final_result_if_ready() else {
            return;
        };
        descriptor.stage = ProblemStage::Completing;
        info!("problem {problem_id} is complete");
        self.discard_problem(ctx, problem_id, None, Some(result));
    }

    fn fail_problem(&mut self, ctx: &mut ActorContext<Self>, problem_id: ProblemId, text: String) {
        warn!("problem {problem_id} failed: {text}");
        self.discard_problem(ctx, problem_id, Some((MessageCode::ProblemFailed, text)), None);
    }

    /// Removes a problem from the dispatcher, stopping every computation
    /// still running for it, and notifies the submitting client with either
    /// the final result or a structured message.
    fn discard_problem(
        &mut self,
        ctx: &mut ActorContext<Self>,
        problem_id: ProblemId,
        message: Option<(MessageCode, String)>,
        result: Option<Vec<u8>>,
    ) {
        let Some(mut descriptor) = self.state.remove_problem(problem_id) else {
            return;
        };
        let outstanding = descriptor.queue.drain();
        let aborted = outstanding.len() as u64;
        for (item_id, holders) in outstanding {
            for worker_id in holders {
                self.stop_redundant_computation(
                    ctx,
                    worker_id,
                    item_id,
                    descriptor.capabilities.cancellable,
                );
            }
        }
        descriptor.statistics.notify_aborted_items(aborted);
        descriptor.statistics.drain_in_flight();
        let report = descriptor.statistics.report(0);
        let transmitter = descriptor.transmitter;
        match (result, message) {
            (Some(result), _) => ctx.spawn(async move {
                if let Err(e) = transmitter.deliver_result(result, report).await {
                    warn!("failed to deliver the result of problem {problem_id}: {e}");
                }
            }),
            (None, Some((code, text))) => ctx.spawn(async move {
                if let Err(e) = transmitter.deliver_message(code, text).await {
                    warn!("failed to deliver a message for problem {problem_id}: {e}");
                }
            }),
            (None, None) => {}
        }
    }
}

use std::sync::Arc;

use log::warn;

use foreman_actor::actor::{ActorAction, ActorContext};

use crate::dispatcher::actor::DispatcherActor;
use crate::dispatcher::DispatcherEvent;
use crate::id::WorkerId;

/// Liveness monitoring: every registered operative is probed periodically
/// via delayed self-messages. Probe failures are tolerated up to the
/// configured retry budget; exceeding it is a terminal death event for the
/// operative, recovered by reclaiming its in-flight work. This is the only
/// path by which silently crashed or partitioned operatives are detected.
impl DispatcherActor {
    pub(super) fn handle_probe_operative(
        &mut self,
        ctx: &mut ActorContext<Self>,
        worker_id: WorkerId,
    ) -> ActorAction {
        let Some(descriptor) = self.state.registry.get_mut(worker_id) else {
            // The operative unregistered or died since the probe was
            // scheduled; the probe chain ends here.
            return ActorAction::Continue;
        };
        if descriptor.probing {
            return ActorAction::Continue;
        }
        descriptor.probing = true;
        let client = Arc::clone(&descriptor.client);
        let handle = ctx.handle().clone();
        ctx.spawn(async move {
            let reachable = client.probe().await.is_ok();
            let _ = handle
                .send(DispatcherEvent::ProbeOutcome {
                    worker_id,
                    reachable,
                })
                .await;
        });
        ActorAction::Continue
    }

    pub(super) fn handle_probe_outcome(
        &mut self,
        ctx: &mut ActorContext<Self>,
        worker_id: WorkerId,
        reachable: bool,
    ) -> ActorAction {
        let probe_retries = self.options().probe_retries;
        let probe_interval = self.options().probe_interval;
        let Some(descriptor) = self.state.registry.get_mut(worker_id) else {
            return ActorAction::Continue;
        };
        descriptor.probing = false;
        if reachable {
            descriptor.probe_failures = 0;
        } else {
            descriptor.probe_failures += 1;
            warn!(
                "operative {worker_id} failed a reachability probe ({}/{probe_retries})",
                descriptor.probe_failures
            );
            if descriptor.probe_failures >= probe_retries {
                warn!("operative {worker_id} declared dead");
                self.remove_operative(ctx, worker_id);
                self.assignment_pass(ctx);
                return ActorAction::Continue;
            }
        }
        ctx.send_with_delay(DispatcherEvent::ProbeOperative { worker_id }, probe_interval);
        ActorAction::Continue
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use crate::id::{ItemId, WorkerId};
use crate::rpc::OperativeClient;

/// The bookkeeping of every connected operative.
///
/// A pure in-memory map mutated only from the dispatcher actor; no call on
/// the registry performs I/O or blocks.
pub struct WorkerRegistry {
    workers: HashMap<WorkerId, OperativeDescriptor>,
}

pub struct OperativeDescriptor {
    pub client: Arc<dyn OperativeClient>,
    /// The item this operative is currently computing, if any.
    /// An operative holds at most one assignment at a time, although the
    /// same item may be held by several operatives under redundant dispatch.
    pub assignment: Option<ItemId>,
    /// Consecutive failed reachability probes.
    pub probe_failures: usize,
    /// Whether a probe for this operative is currently outstanding.
    pub probing: bool,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
        }
    }

    pub fn register(&mut self, worker_id: WorkerId, client: Arc<dyn OperativeClient>) {
        self.workers.insert(
            worker_id,
            OperativeDescriptor {
                client,
                assignment: None,
                probe_failures: 0,
                probing: false,
            },
        );
    }

    /// Removes an operative. Unregistering an unknown identity is a no-op.
    pub fn unregister(&mut self, worker_id: WorkerId) -> Option<OperativeDescriptor> {
        self.workers.remove(&worker_id)
    }

    pub fn contains(&self, worker_id: WorkerId) -> bool {
        self.workers.contains_key(&worker_id)
    }

    pub fn get(&self, worker_id: WorkerId) -> Option<&OperativeDescriptor> {
        self.workers.get(&worker_id)
    }

    pub fn get_mut(&mut self, worker_id: WorkerId) -> Option<&mut OperativeDescriptor> {
        self.workers.get_mut(&worker_id)
    }

    pub fn client_of(&self, worker_id: WorkerId) -> Option<Arc<dyn OperativeClient>> {
        self.workers
            .get(&worker_id)
            .map(|worker| Arc::clone(&worker.client))
    }

    pub fn assignment_of(&self, worker_id: WorkerId) -> Option<ItemId> {
        self.workers.get(&worker_id).and_then(|worker| worker.assignment)
    }

    /// Records the assignment of `item_id` to `worker_id`.
    /// Returns `false` if the operative is unknown.
    pub fn mark_busy(&mut self, worker_id: WorkerId, item_id: ItemId) -> bool {
        match self.workers.get_mut(&worker_id) {
            Some(worker) => {
                worker.assignment = Some(item_id);
                true
            }
            None => false,
        }
    }

    /// Clears the assignment of `worker_id`, returning the item it held.
    pub fn mark_idle(&mut self, worker_id: WorkerId) -> Option<ItemId> {
        self.workers
            .get_mut(&worker_id)
            .and_then(|worker| worker.assignment.take())
    }

    /// A snapshot of every idle operative, taken under the dispatcher's
    /// single-threaded state so that remote calls can be issued afterwards
    /// without touching the registry.
    pub fn all_idle(&self) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|(_, worker)| worker.assignment.is_none())
            .map(|(&worker_id, _)| worker_id)
            .collect()
    }

    pub fn all_clients(&self) -> Vec<Arc<dyn OperativeClient>> {
        self.workers
            .values()
            .map(|worker| Arc::clone(&worker.client))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ComputeResult;

    struct NoopOperative;

    #[async_trait]
    impl OperativeClient for NoopOperative {
        async fn assign(&self, _item_id: ItemId, _payload: Vec<u8>) -> ComputeResult<()> {
            Ok(())
        }

        async fn cancel(&self, _item_id: ItemId) -> ComputeResult<()> {
            Ok(())
        }

        async fn probe(&self) -> ComputeResult<()> {
            Ok(())
        }

        async fn terminate(&self) -> ComputeResult<()> {
            Ok(())
        }
    }

    fn registry_with_workers(ids: &[u64]) -> WorkerRegistry {
        let mut registry = WorkerRegistry::new();
        for &id in ids {
            registry.register(WorkerId::from(id), Arc::new(NoopOperative));
        }
        registry
    }

    #[test]
    fn test_duplicate_unregister_is_a_no_op() {
        let mut registry = registry_with_workers(&[1, 2]);
        assert!(registry.unregister(WorkerId::from(1)).is_some());
        assert!(registry.unregister(WorkerId::from(1)).is_none());
        assert!(registry.unregister(WorkerId::from(7)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_busy_and_idle_transitions() {
        let mut registry = registry_with_workers(&[1, 2]);
        let item = ItemId::from(10);
        assert!(registry.mark_busy(WorkerId::from(1), item));
        assert_eq!(registry.assignment_of(WorkerId::from(1)), Some(item));
        assert_eq!(registry.all_idle(), vec![WorkerId::from(2)]);

        assert_eq!(registry.mark_idle(WorkerId::from(1)), Some(item));
        assert_eq!(registry.assignment_of(WorkerId::from(1)), None);
        let mut idle = registry.all_idle();
        idle.sort();
        assert_eq!(idle, vec![WorkerId::from(1), WorkerId::from(2)]);
    }

    #[test]
    fn test_mark_busy_on_unknown_worker() {
        let mut registry = registry_with_workers(&[]);
        assert!(!registry.mark_busy(WorkerId::from(1), ItemId::from(1)));
        assert_eq!(registry.mark_idle(WorkerId::from(1)), None);
    }
}

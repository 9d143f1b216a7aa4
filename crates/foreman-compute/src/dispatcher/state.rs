use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatcher::queue::WorkQueue;
use crate::dispatcher::registry::WorkerRegistry;
use crate::error::ComputeResult;
use crate::id::{IdGenerator, ItemId, ProblemId, WorkerId};
use crate::problem::{Problem, ProblemCapabilities};
use crate::rpc::TransmitterClient;
use crate::stats::{ProblemStatistics, SystemStatistics};

pub struct DispatcherState {
    pub registry: WorkerRegistry,
    problems: HashMap<ProblemId, ProblemDescriptor>,
    /// Problem identities in arrival order, for fair scheduling passes.
    order: Vec<ProblemId>,
    /// Maps every live item to the problem that owns it.
    item_index: HashMap<ItemId, ProblemId>,
    worker_id_generator: IdGenerator<WorkerId>,
    problem_id_generator: IdGenerator<ProblemId>,
    item_id_generator: IdGenerator<ItemId>,
    pub system_statistics: Arc<SystemStatistics>,
}

pub struct ProblemDescriptor {
    pub problem: Box<dyn Problem>,
    pub transmitter: Arc<dyn TransmitterClient>,
    pub capabilities: ProblemCapabilities,
    pub stage: ProblemStage,
    pub queue: WorkQueue,
    pub statistics: Arc<ProblemStatistics>,
}

/// The lifecycle of a submitted problem. Removal from the dispatcher state
/// is the terminal stage; a removed problem is never dispatched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemStage {
    /// Accepted but not yet decomposed.
    Submitted,
    /// Items are being produced and dispatched.
    Distributing,
    /// A final result exists and is being delivered to the client.
    Completing,
}

impl DispatcherState {
    pub fn new() -> Self {
        Self {
            registry: WorkerRegistry::new(),
            problems: HashMap::new(),
            order: vec![],
            item_index: HashMap::new(),
            worker_id_generator: IdGenerator::new(),
            problem_id_generator: IdGenerator::new(),
            item_id_generator: IdGenerator::new(),
            system_statistics: Arc::new(SystemStatistics::new()),
        }
    }

    pub fn next_worker_id(&mut self) -> ComputeResult<WorkerId> {
        self.worker_id_generator.next()
    }

    pub fn next_problem_id(&mut self) -> ComputeResult<ProblemId> {
        self.problem_id_generator.next()
    }

    pub fn next_item_id(&mut self) -> ComputeResult<ItemId> {
        self.item_id_generator.next()
    }

    pub fn add_problem(&mut self, problem_id: ProblemId, descriptor: ProblemDescriptor) {
        self.problems.insert(problem_id, descriptor);
        self.order.push(problem_id);
    }

    pub fn get_problem(&self, problem_id: ProblemId) -> Option<&ProblemDescriptor> {
        self.problems.get(&problem_id)
    }

    pub fn get_problem_mut(&mut self, problem_id: ProblemId) -> Option<&mut ProblemDescriptor> {
        self.problems.get_mut(&problem_id)
    }

    pub fn remove_problem(&mut self, problem_id: ProblemId) -> Option<ProblemDescriptor> {
        self.order.retain(|&id| id != problem_id);
        self.item_index.retain(|_, &mut owner| owner != problem_id);
        self.problems.remove(&problem_id)
    }

    pub fn register_item(&mut self, item_id: ItemId, problem_id: ProblemId) {
        self.item_index.insert(item_id, problem_id);
    }

    pub fn drop_item(&mut self, item_id: ItemId) {
        self.item_index.remove(&item_id);
    }

    pub fn problem_of_item(&self, item_id: ItemId) -> Option<ProblemId> {
        self.item_index.get(&item_id).copied()
    }

    /// The problems eligible for scheduling, in arrival order.
    pub fn active_problem_ids(&self) -> Vec<ProblemId> {
        self.order
            .iter()
            .filter(|problem_id| {
                self.problems
                    .get(problem_id)
                    .is_some_and(|problem| problem.stage == ProblemStage::Distributing)
            })
            .copied()
            .collect()
    }

    pub fn transmitters(&self) -> Vec<Arc<dyn TransmitterClient>> {
        self.problems
            .values()
            .map(|problem| Arc::clone(&problem.transmitter))
            .collect()
    }
}

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::ComputeResult;
use crate::id::{ItemId, ProblemId, WorkerId};
use crate::problem::Problem;
use crate::rpc::{FailureCode, OperativeClient, TransmitterClient};
use crate::stats::{ProblemReport, SystemReport};

pub enum DispatcherEvent {
    RegisterOperative {
        client: Arc<dyn OperativeClient>,
        result: oneshot::Sender<ComputeResult<WorkerId>>,
    },
    UnregisterOperative {
        worker_id: WorkerId,
    },
    SubmitProblem {
        problem: Box<dyn Problem>,
        transmitter: Arc<dyn TransmitterClient>,
        result: oneshot::Sender<ComputeResult<ProblemId>>,
    },
    AbortProblem {
        problem_id: ProblemId,
        result: oneshot::Sender<ComputeResult<()>>,
    },
    /// An operative returned the partial solution for an item.
    ReturnPartialSolution {
        worker_id: WorkerId,
        item_id: ItemId,
        payload: Vec<u8>,
    },
    /// An operative reported a failure it could not recover from locally.
    ReportException {
        worker_id: WorkerId,
        code: FailureCode,
        message: String,
    },
    /// An assignment call never reached the operative.
    AssignmentFailed {
        worker_id: WorkerId,
        item_id: ItemId,
        message: String,
    },
    /// A liveness probe for the operative is due.
    ProbeOperative {
        worker_id: WorkerId,
    },
    ProbeOutcome {
        worker_id: WorkerId,
        reachable: bool,
    },
    GetProblemStatistics {
        problem_id: ProblemId,
        result: oneshot::Sender<ComputeResult<ProblemReport>>,
    },
    GetSystemStatistics {
        result: oneshot::Sender<SystemReport>,
    },
    Shutdown,
}

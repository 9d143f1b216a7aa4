use std::fmt;
use std::fmt::Formatter;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ComputeResult;
use crate::id::{ItemId, WorkerId};
use crate::stats::ProblemReport;

/// The calls the dispatcher makes against a single operative.
///
/// The transport behind these calls is out of scope for the compute core;
/// the in-process implementation lives in [`crate::worker::LocalOperativeClient`],
/// and a network transport would implement the same trait.
#[async_trait]
pub trait OperativeClient: Send + Sync {
    /// Hands a work item to the operative. An error means the operative
    /// could not be reached, not that the computation failed.
    async fn assign(&self, item_id: ItemId, payload: Vec<u8>) -> ComputeResult<()>;

    /// Tells the operative to abandon the computation of `item_id`.
    async fn cancel(&self, item_id: ItemId) -> ComputeResult<()>;

    /// A lightweight reachability check.
    async fn probe(&self) -> ComputeResult<()>;

    /// Tells the operative process to exit.
    async fn terminate(&self) -> ComputeResult<()>;
}

/// The calls an operative makes against the dispatcher.
#[async_trait]
pub trait DispatcherClient: Send + Sync {
    /// Registers the operative, handing over the callback client the
    /// dispatcher will use to reach it. Returns the generated worker
    /// identity the operative must present on all later calls.
    async fn register(&self, operative: Arc<dyn OperativeClient>) -> ComputeResult<WorkerId>;

    async fn unregister(&self, worker_id: WorkerId) -> ComputeResult<()>;

    /// Returns the partial solution computed for `item_id`.
    async fn return_result(
        &self,
        worker_id: WorkerId,
        item_id: ItemId,
        result: Vec<u8>,
    ) -> ComputeResult<()>;

    /// Reports a failure the operative could not recover from locally.
    /// The operative stays registered and becomes eligible for new work.
    async fn report_failure(
        &self,
        worker_id: WorkerId,
        code: FailureCode,
        message: String,
    ) -> ComputeResult<()>;
}

/// The calls the dispatcher makes against the submitting client.
#[async_trait]
pub trait TransmitterClient: Send + Sync {
    /// Delivers the assembled final result along with the closing
    /// statistics of the problem. Called at most once per problem.
    async fn deliver_result(&self, result: Vec<u8>, statistics: ProblemReport)
        -> ComputeResult<()>;

    /// Delivers a structured out-of-band message about the problem.
    async fn deliver_message(&self, code: MessageCode, text: String) -> ComputeResult<()>;
}

/// The failure classes an operative can report to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCode {
    /// The computation callback failed on the operative.
    ComputationFailed,
    /// A computed solution could not be delivered within the retry budget.
    ResultDeliveryFailed,
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FailureCode::ComputationFailed => write!(f, "COMPUTATION_FAILED"),
            FailureCode::ResultDeliveryFailed => write!(f, "RESULT_DELIVERY_FAILED"),
        }
    }
}

/// The message classes the dispatcher can deliver to a submitting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageCode {
    /// The problem failed and has been discarded; no result will follow.
    ProblemFailed,
    /// The problem was aborted on client request.
    ProblemAborted,
    /// The dispatcher is shutting down; all problem state is lost.
    DispatcherShutdown,
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MessageCode::ProblemFailed => write!(f, "PROBLEM_FAILED"),
            MessageCode::ProblemAborted => write!(f, "PROBLEM_ABORTED"),
            MessageCode::DispatcherShutdown => write!(f, "DISPATCHER_SHUTDOWN"),
        }
    }
}

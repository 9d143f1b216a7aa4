use async_trait::async_trait;

use crate::error::ComputeResult;

/// The computation callback supplied by the operative's host process.
///
/// The payload is the opaque work item produced by the problem's
/// decomposition on the dispatcher side; the returned bytes are routed back
/// as the item's partial solution.
#[async_trait]
pub trait PartialSolver: Send + Sync + 'static {
    async fn solve(&self, item: Vec<u8>) -> ComputeResult<Vec<u8>>;
}

use crate::error::ComputeResult;

/// The decomposition contract supplied by the submitting client.
///
/// The dispatcher never inspects item or result payloads; they are opaque
/// bytes round-tripped between the problem and the operatives computing it.
pub trait Problem: Send + 'static {
    /// Produces the next undispatched work item, or [None] if no more items
    /// are available right now. Returning [None] is not final: the dispatcher
    /// asks again on later scheduling passes until the problem reports a
    /// final result.
    ///
    /// The suggested batch size is a scheduling hint derived from the number
    /// of idle operatives; implementations are free to ignore it.
    fn produce_next_item(&mut self, suggested_batch_size: usize) -> ComputeResult<Option<Vec<u8>>>;

    /// Accepts the partial solution computed for `item`.
    /// Called exactly once per work item, with the first accepted result.
    fn collect_result(&mut self, result: Vec<u8>, item: &[u8]) -> ComputeResult<()>;

    /// Returns the assembled final result once the problem considers itself
    /// solved, or [None] while partial solutions are still missing.
    fn final_result_if_ready(&mut self) -> Option<Vec<u8>>;

    /// The capabilities of this problem, resolved once at submission time.
    fn capabilities(&self) -> ProblemCapabilities {
        ProblemCapabilities::default()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProblemCapabilities {
    /// Whether operatives computing an item of this problem can be told to
    /// abandon the computation mid-flight. When `false`, redundant holders
    /// are left to finish on their own and their results are discarded.
    pub cancellable: bool,
}

impl Default for ProblemCapabilities {
    fn default() -> Self {
        Self { cancellable: true }
    }
}

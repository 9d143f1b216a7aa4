use std::sync::PoisonError;

use thiserror::Error;
use tokio::task::JoinError;

pub type ComputeResult<T> = Result<T, ComputeError>;

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("operative unreachable: {0}")]
    OperativeUnreachable(String),
    #[error("problem setup failed: {0}")]
    ProblemSetup(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<JoinError> for ComputeError {
    fn from(error: JoinError) -> Self {
        ComputeError::InternalError(error.to_string())
    }
}

impl<T> From<PoisonError<T>> for ComputeError {
    fn from(error: PoisonError<T>) -> Self {
        ComputeError::InternalError(error.to_string())
    }
}

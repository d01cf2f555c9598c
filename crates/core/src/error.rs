// Workflow errors
// Soft failures (missing version declarations) are not errors: workflows
// log them and finish with `Completion::Aborted`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// External command could not start, failed, or timed out
    #[error("{0}")]
    Execution(#[from] crate::port::ExecutionError),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Cooperative cancellation observed at a progress checkpoint
    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AppError>;

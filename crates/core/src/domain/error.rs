// Domain errors: rejected values and illegal lifecycle moves

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Illegal operation transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid version: {0:?}")]
    InvalidVersion(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;

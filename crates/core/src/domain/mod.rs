// Domain Layer - Pure value types and state machines

pub mod command;
pub mod error;
pub mod operation;
pub mod progress;
pub mod version;

// Re-exports
pub use command::{CommandSpec, CommandSpecBuilder, ProcessResult, ProcessSlot};
pub use error::DomainError;
pub use operation::{Operation, OperationKind, OperationOutcome, OperationPhase, OperationStatus};
pub use progress::ProgressEvent;
pub use version::{DependencyKind, DependencyState, Version};

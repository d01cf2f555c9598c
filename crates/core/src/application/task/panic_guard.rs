// Panic isolation for operation threads
use std::any::Any;
use std::panic::{catch_unwind, UnwindSafe};
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed
    Success(T),
    /// Execution panicked
    Panicked(String),
}

/// Run `f`, turning a panic into `PanicGuardResult::Panicked` so the
/// operation still reaches its terminal state and releases its category.
pub fn execute_guarded<F, T>(f: F) -> PanicGuardResult<T>
where
    F: FnOnce() -> T + UnwindSafe,
{
    catch_unwind(f).map_or_else(
        |payload| {
            let message = panic_message(payload.as_ref());
            error!(panic_msg = %message, "Operation body panicked");
            PanicGuardResult::Panicked(message)
        },
        PanicGuardResult::Success,
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Unknown panic".to_string())
}

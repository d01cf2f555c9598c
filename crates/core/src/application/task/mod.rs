// Background Task Runner - single-flight execution of long operations

mod cancel;
pub mod constants;
mod panic_guard;
mod progress;
mod registry;

pub use cancel::{cancel_channel, CancelSender, CancelToken};
pub use panic_guard::{execute_guarded, PanicGuardResult};
pub use progress::ProgressReporter;
pub use registry::{FlightGuard, OperationRegistry};

use crate::domain::{OperationKind, OperationOutcome, OperationStatus, ProgressEvent};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, OperationEvent, OperationListener};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// How an operation body finished when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Every phase ran; progress ends with `done`
    Done,
    /// Soft abort (e.g. a version could not be resolved); logged as a warning,
    /// progress ends with `cancelled`
    Aborted(String),
}

/// Handle on a started flight
pub struct TaskHandle {
    kind: OperationKind,
    run_id: String,
    cancel: CancelSender,
    done: oneshot::Receiver<OperationOutcome>,
}

impl TaskHandle {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Request cooperative cancellation (honored at the next progress report)
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Detached canceller, usable after `wait` consumed the handle
    pub fn canceller(&self) -> CancelSender {
        self.cancel.clone()
    }

    /// Wait for the flight to end. The category is idle again when this returns.
    pub async fn wait(self) -> OperationOutcome {
        self.done.await.unwrap_or(OperationOutcome::Failed)
    }
}

type Cancellers = Arc<Mutex<HashMap<OperationKind, CancelSender>>>;

/// Runs operation bodies on dedicated threads, at most one per category
pub struct BackgroundTaskRunner {
    registry: Arc<OperationRegistry>,
    listener: Arc<dyn OperationListener>,
    id_provider: Arc<dyn IdProvider>,
    /// Canceller of the flight currently holding each category
    cancellers: Cancellers,
}

impl BackgroundTaskRunner {
    pub fn new(listener: Arc<dyn OperationListener>, id_provider: Arc<dyn IdProvider>) -> Self {
        Self {
            registry: OperationRegistry::new(),
            listener,
            id_provider,
            cancellers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Request cancellation of the flight running in `kind`.
    /// Returns false when the category is idle.
    pub fn cancel(&self, kind: OperationKind) -> bool {
        match lock_cancellers(&self.cancellers).get(&kind) {
            Some(canceller) => {
                info!(kind = %kind, "Cancellation requested");
                canceller.cancel();
                true
            }
            None => false,
        }
    }

    pub fn status(&self, kind: OperationKind) -> OperationStatus {
        self.registry.status(kind)
    }

    pub fn is_running(&self, kind: OperationKind) -> bool {
        self.registry.is_running(kind)
    }

    /// Start `body` unless `kind` is already in flight.
    ///
    /// Returns `Ok(None)` when the category is busy: the request is logged
    /// and dropped, never queued. The body runs on its own OS thread with a
    /// private current-thread runtime, so its blocking process waits never
    /// starve other operations. Whatever the body does (succeed, fail, observe
    /// cancellation, panic), the category returns to idle and exactly one
    /// `Ended` event fires.
    pub fn run_exclusive<F, Fut>(
        &self,
        kind: OperationKind,
        title: &str,
        body: F,
    ) -> Result<Option<TaskHandle>>
    where
        F: FnOnce(Arc<ProgressReporter>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Completion>>,
    {
        let Some(guard) = self.registry.try_begin(kind) else {
            info!(kind = %kind, "{} already in progress, request ignored", title);
            return Ok(None);
        };

        let run_id = self.id_provider.generate_id();
        guard.mark_running()?;
        self.listener.on_event(&OperationEvent::Started {
            kind,
            run_id: run_id.clone(),
            title: title.to_string(),
        });

        let (cancel_tx, cancel_rx) = cancel_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let reporter = Arc::new(ProgressReporter::new(
            kind,
            run_id.clone(),
            Arc::clone(&self.listener),
            cancel_rx,
        ));

        lock_cancellers(&self.cancellers).insert(kind, cancel_tx.clone());

        let listener = Arc::clone(&self.listener);
        let cancellers = Arc::clone(&self.cancellers);
        let thread_run_id = run_id.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("ois-{}", kind).to_lowercase())
            .spawn(move || {
                let outcome = run_to_completion(kind, body, &reporter);
                // Before the category is released, so a new flight's canceller survives
                lock_cancellers(&cancellers).remove(&kind);
                guard.finish(outcome);
                listener.on_event(&OperationEvent::Ended {
                    kind,
                    run_id: thread_run_id,
                    outcome,
                });
                let _ = done_tx.send(outcome);
            });

        if let Err(e) = spawned {
            // The closure (and its guard) was dropped: the category is idle again
            lock_cancellers(&self.cancellers).remove(&kind);
            error!(kind = %kind, error = %e, "Failed to start operation thread");
            self.listener.on_event(&OperationEvent::Ended {
                kind,
                run_id,
                outcome: OperationOutcome::Failed,
            });
            return Err(AppError::Io(e));
        }

        Ok(Some(TaskHandle {
            kind,
            run_id,
            cancel: cancel_tx,
            done: done_rx,
        }))
    }
}

fn lock_cancellers(
    cancellers: &Cancellers,
) -> MutexGuard<'_, HashMap<OperationKind, CancelSender>> {
    cancellers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drive the body on this thread and map every exit path to one outcome.
///
/// Once cancellation was requested, a failing body counts as cancelled: a
/// stopped process exits non-zero, which is the expected end of a stop.
fn run_to_completion<F, Fut>(
    kind: OperationKind,
    body: F,
    reporter: &Arc<ProgressReporter>,
) -> OperationOutcome
where
    F: FnOnce(Arc<ProgressReporter>) -> Fut,
    Fut: Future<Output = Result<Completion>>,
{
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(kind = %kind, error = %e, "Failed to build operation runtime");
            reporter.finish(ProgressEvent::Cancelled);
            return OperationOutcome::Failed;
        }
    };

    let body_reporter = Arc::clone(reporter);
    let result = execute_guarded(AssertUnwindSafe(|| {
        runtime.block_on(body(body_reporter))
    }));

    match result {
        PanicGuardResult::Success(Ok(Completion::Done)) => {
            reporter.finish(ProgressEvent::Done);
            OperationOutcome::Succeeded
        }
        PanicGuardResult::Success(Ok(Completion::Aborted(reason))) => {
            warn!(kind = %kind, reason = %reason, "Operation aborted");
            reporter.finish(ProgressEvent::Cancelled);
            OperationOutcome::Failed
        }
        PanicGuardResult::Success(Err(AppError::Cancelled)) => {
            info!(kind = %kind, "Operation cancelled");
            reporter.finish(ProgressEvent::Cancelled);
            OperationOutcome::Cancelled
        }
        PanicGuardResult::Success(Err(e)) if reporter.is_cancelled() => {
            info!(kind = %kind, error = %e, "Operation stopped after cancellation");
            reporter.finish(ProgressEvent::Cancelled);
            OperationOutcome::Cancelled
        }
        PanicGuardResult::Success(Err(e)) => {
            error!(kind = %kind, error = ?e, "Operation failed: {}", e);
            reporter.finish(ProgressEvent::Cancelled);
            OperationOutcome::Failed
        }
        PanicGuardResult::Panicked(_) => {
            reporter.finish(ProgressEvent::Cancelled);
            OperationOutcome::Failed
        }
    }
}

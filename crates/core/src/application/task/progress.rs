// Progress reporting for one flight

use super::cancel::CancelToken;
use crate::domain::{OperationKind, ProgressEvent};
use crate::error::{AppError, Result};
use crate::port::{OperationEvent, OperationListener};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

struct ReporterState {
    last_fraction: f64,
    finished: bool,
}

/// Progress sink handed to an operation body.
///
/// Every report is also a cancellation checkpoint: once cancellation was
/// requested, the next report returns `AppError::Cancelled` instead of
/// emitting. Fractions are clamped to `[0, 1]` and never go backwards.
pub struct ProgressReporter {
    kind: OperationKind,
    run_id: String,
    listener: Arc<dyn OperationListener>,
    cancel: CancelToken,
    state: Mutex<ReporterState>,
}

impl ProgressReporter {
    pub(crate) fn new(
        kind: OperationKind,
        run_id: String,
        listener: Arc<dyn OperationListener>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            kind,
            run_id,
            listener,
            cancel,
            state: Mutex::new(ReporterState {
                last_fraction: 0.0,
                finished: false,
            }),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancellation checkpoint without emitting anything
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }

    /// Report a phase with its completion fraction
    pub fn state(&self, message: impl Into<String>, fraction: f64) -> Result<()> {
        self.report(message.into(), Some(fraction))
    }

    /// Report a phase of unknown duration
    pub fn message(&self, message: impl Into<String>) -> Result<()> {
        self.report(message.into(), None)
    }

    fn report(&self, message: String, fraction: Option<f64>) -> Result<()> {
        self.checkpoint()?;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.finished {
            debug!(kind = %self.kind, message = %message, "Progress after terminal event dropped");
            return Ok(());
        }

        let fraction = fraction.map(|requested| {
            let clamped = if requested.is_nan() {
                state.last_fraction
            } else {
                requested.clamp(0.0, 1.0)
            };
            if clamped < state.last_fraction {
                debug!(
                    kind = %self.kind,
                    requested = %clamped,
                    last = %state.last_fraction,
                    "Progress fraction went backwards, holding previous value"
                );
            }
            let fraction = clamped.max(state.last_fraction);
            state.last_fraction = fraction;
            fraction
        });

        self.emit(ProgressEvent::Update { message, fraction });
        Ok(())
    }

    /// Emit the single terminal event (`Done` or `Cancelled`); later calls are ignored
    pub(crate) fn finish(&self, terminal: ProgressEvent) {
        debug_assert!(terminal.is_terminal());

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.finished {
            return;
        }
        state.finished = true;
        if terminal == ProgressEvent::Done {
            state.last_fraction = 1.0;
        }
        self.emit(terminal);
    }

    fn emit(&self, progress: ProgressEvent) {
        self.listener.on_event(&OperationEvent::Progress {
            kind: self.kind,
            run_id: self.run_id.clone(),
            progress,
        });
    }
}

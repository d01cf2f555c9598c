// Per-category single-flight state, one mutex for all categories

use crate::domain::{DomainError, OperationKind, OperationOutcome, OperationPhase, OperationStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Phase of every operation category of one project
#[derive(Default)]
pub struct OperationRegistry {
    phases: Mutex<HashMap<OperationKind, OperationPhase>>,
}

impl OperationRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OperationKind, OperationPhase>> {
        self.phases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self, kind: OperationKind) -> OperationPhase {
        self.lock()
            .get(&kind)
            .copied()
            .unwrap_or(OperationPhase::Idle)
    }

    pub fn status(&self, kind: OperationKind) -> OperationStatus {
        self.phase(kind).status()
    }

    pub fn is_running(&self, kind: OperationKind) -> bool {
        self.status(kind) == OperationStatus::Running
    }

    /// Claim a category (`Idle -> Starting`). `None` if it is not idle.
    pub fn try_begin(self: &Arc<Self>, kind: OperationKind) -> Option<FlightGuard> {
        let mut phases = self.lock();
        let current = phases.get(&kind).copied().unwrap_or(OperationPhase::Idle);
        match current.transition(OperationPhase::Starting) {
            Ok(next) => {
                phases.insert(kind, next);
                Some(FlightGuard {
                    registry: Arc::clone(self),
                    kind,
                    released: false,
                })
            }
            Err(e) => {
                debug!(kind = %kind, error = %e, "Category busy");
                None
            }
        }
    }

    fn advance(&self, kind: OperationKind, to: OperationPhase) -> Result<(), DomainError> {
        let mut phases = self.lock();
        let current = phases.get(&kind).copied().unwrap_or(OperationPhase::Idle);
        let next = current.transition(to)?;
        phases.insert(kind, next);
        Ok(())
    }

    fn force_idle(&self, kind: OperationKind) {
        self.lock().insert(kind, OperationPhase::Idle);
    }
}

/// Exclusive claim on one category.
///
/// Dropping the guard always returns the category to `Idle`, whatever path
/// the flight took.
pub struct FlightGuard {
    registry: Arc<OperationRegistry>,
    kind: OperationKind,
    released: bool,
}

impl FlightGuard {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// `Starting -> Running`
    pub fn mark_running(&self) -> Result<(), DomainError> {
        self.registry.advance(self.kind, OperationPhase::Running)
    }

    /// Record the outcome and release the category
    pub fn finish(mut self, outcome: OperationOutcome) {
        self.release(outcome);
    }

    fn release(&mut self, outcome: OperationOutcome) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = self.registry.advance(self.kind, outcome.phase()) {
            warn!(kind = %self.kind, error = %e, "Recording outcome as failure");
            let _ = self.registry.advance(self.kind, OperationPhase::Failed);
        }
        if let Err(e) = self.registry.advance(self.kind, OperationPhase::Idle) {
            warn!(kind = %self.kind, error = %e, "Forcing category back to idle");
            self.registry.force_idle(self.kind);
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.release(OperationOutcome::Failed);
    }
}

// Operation Listener Port
// How UI collaborators learn that an operation started, progressed or ended

use crate::domain::{OperationKind, OperationOutcome, ProgressEvent};
use serde::Serialize;

/// Lifecycle notification for one flight of an operation category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OperationEvent {
    Started {
        kind: OperationKind,
        run_id: String,
        title: String,
    },
    Progress {
        kind: OperationKind,
        run_id: String,
        progress: ProgressEvent,
    },
    Ended {
        kind: OperationKind,
        run_id: String,
        outcome: OperationOutcome,
    },
}

impl OperationEvent {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationEvent::Started { kind, .. }
            | OperationEvent::Progress { kind, .. }
            | OperationEvent::Ended { kind, .. } => *kind,
        }
    }
}

/// Receives lifecycle events. Called from the operation's own thread, so
/// implementations must not block for long.
pub trait OperationListener: Send + Sync {
    fn on_event(&self, event: &OperationEvent);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records every event in order
    #[derive(Default)]
    pub struct RecordingListener {
        events: Mutex<Vec<OperationEvent>>,
    }

    impl RecordingListener {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<OperationEvent> {
            self.events.lock().unwrap().clone()
        }

        /// Progress events of one category, in emission order
        pub fn progress(&self, kind: OperationKind) -> Vec<ProgressEvent> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    OperationEvent::Progress {
                        kind: k, progress, ..
                    } if k == kind => Some(progress),
                    _ => None,
                })
                .collect()
        }

        pub fn outcomes(&self, kind: OperationKind) -> Vec<OperationOutcome> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    OperationEvent::Ended {
                        kind: k, outcome, ..
                    } if k == kind => Some(outcome),
                    _ => None,
                })
                .collect()
        }

        pub fn started_count(&self, kind: OperationKind) -> usize {
            self.events()
                .iter()
                .filter(|event| matches!(event, OperationEvent::Started { kind: k, .. } if *k == kind))
                .count()
        }
    }

    impl OperationListener for RecordingListener {
        fn on_event(&self, event: &OperationEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}

// Operation categories and their single-flight state machine

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single-flight category. Each category has its own state; categories
/// never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    DependencyRefresh,
    Simulation,
    Export,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::DependencyRefresh,
        OperationKind::Simulation,
        OperationKind::Export,
    ];
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::DependencyRefresh => write!(f, "DEPENDENCY_REFRESH"),
            OperationKind::Simulation => write!(f, "SIMULATION"),
            OperationKind::Export => write!(f, "EXPORT"),
        }
    }
}

/// Long-running operation a collaborator can start on a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Run the simulation in debug mode
    Run,
    /// Run the simulation with a scratch dev-mode directory
    DevMode,
    /// Build the distribution
    Export,
    /// Resolve, download and install the plugin and core dependencies
    Refresh { force_install: bool },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Run | Operation::DevMode => OperationKind::Simulation,
            Operation::Export => OperationKind::Export,
            Operation::Refresh { .. } => OperationKind::DependencyRefresh,
        }
    }

    /// Human readable progress title
    pub fn title(&self) -> &'static str {
        match self {
            Operation::Run => "Running OIS Simulation",
            Operation::DevMode => "Running OIS Simulation (dev mode)",
            Operation::Export => "Exporting OIS Project",
            Operation::Refresh { .. } => "Loading OIS Dependencies",
        }
    }
}

/// Lifecycle of one category:
/// `Idle -> Starting -> Running -> {Succeeded, Failed, Cancelled} -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationPhase {
    Idle,
    Starting,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationPhase::Idle => write!(f, "IDLE"),
            OperationPhase::Starting => write!(f, "STARTING"),
            OperationPhase::Running => write!(f, "RUNNING"),
            OperationPhase::Succeeded => write!(f, "SUCCEEDED"),
            OperationPhase::Failed => write!(f, "FAILED"),
            OperationPhase::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl OperationPhase {
    /// Validate and apply a transition
    pub fn transition(self, to: OperationPhase) -> Result<OperationPhase> {
        use OperationPhase::*;

        let allowed = matches!(
            (self, to),
            (Idle, Starting)
                | (Starting, Running)
                // a flight that dies before reaching Running still ends
                | (Starting, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Succeeded, Idle)
                | (Failed, Idle)
                | (Cancelled, Idle)
        );

        if allowed {
            Ok(to)
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationPhase::Succeeded | OperationPhase::Failed | OperationPhase::Cancelled
        )
    }

    /// Collapse to the externally visible status
    pub fn status(&self) -> OperationStatus {
        match self {
            OperationPhase::Idle => OperationStatus::Idle,
            _ => OperationStatus::Running,
        }
    }
}

/// Externally visible status of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Idle,
    Running,
}

/// How a flight ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

impl OperationOutcome {
    pub fn phase(&self) -> OperationPhase {
        match self {
            OperationOutcome::Succeeded => OperationPhase::Succeeded,
            OperationOutcome::Failed => OperationPhase::Failed,
            OperationOutcome::Cancelled => OperationPhase::Cancelled,
        }
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.phase().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let phase = OperationPhase::Idle
            .transition(OperationPhase::Starting)
            .and_then(|p| p.transition(OperationPhase::Running))
            .and_then(|p| p.transition(OperationPhase::Succeeded))
            .and_then(|p| p.transition(OperationPhase::Idle))
            .unwrap();

        assert_eq!(phase, OperationPhase::Idle);
    }

    #[test]
    fn test_reentry_rejected_at_starting() {
        for busy in [
            OperationPhase::Starting,
            OperationPhase::Running,
            OperationPhase::Failed,
        ] {
            let err = busy.transition(OperationPhase::Starting).unwrap_err();
            assert!(err.to_string().contains("-> STARTING"));
        }
    }

    #[test]
    fn test_terminal_must_pass_through_running() {
        assert!(OperationPhase::Idle
            .transition(OperationPhase::Succeeded)
            .is_err());
        assert!(OperationPhase::Starting
            .transition(OperationPhase::Cancelled)
            .is_err());
        assert!(OperationPhase::Starting
            .transition(OperationPhase::Failed)
            .is_ok());
    }

    #[test]
    fn test_status_collapse() {
        assert_eq!(OperationPhase::Idle.status(), OperationStatus::Idle);
        assert_eq!(OperationPhase::Starting.status(), OperationStatus::Running);
        assert_eq!(OperationPhase::Cancelled.status(), OperationStatus::Running);
    }

    #[test]
    fn test_operation_categories() {
        assert_eq!(Operation::Run.kind(), OperationKind::Simulation);
        assert_eq!(Operation::DevMode.kind(), OperationKind::Simulation);
        assert_eq!(Operation::Export.kind(), OperationKind::Export);
        assert_eq!(
            Operation::Refresh {
                force_install: true
            }
            .kind(),
            OperationKind::DependencyRefresh
        );
    }
}

// Application Layer - Workflows over the ports

pub mod build_tool;
pub mod dependency;
pub mod events;
pub mod project;
pub mod simulation;
pub mod task;
pub mod vcs;

// Re-exports
pub use build_tool::{BuildRequest, BuildTool};
pub use dependency::{DependencyCache, DependencyOrchestrator, VersionResolver};
pub use events::{BroadcastListener, FanoutListener, TracingListener};
pub use project::{is_simulation_project, DependencyReport, ProjectContext};
pub use simulation::SimulationWorkflows;
pub use task::{BackgroundTaskRunner, Completion, ProgressReporter, TaskHandle};
pub use vcs::Vcs;

// Project context - one per open project, owns every piece of per-project state

use crate::application::build_tool::BuildTool;
use crate::application::dependency::DependencyOrchestrator;
use crate::application::simulation::SimulationWorkflows;
use crate::application::task::{BackgroundTaskRunner, Completion, ProgressReporter, TaskHandle};
use crate::config::WorkbenchConfig;
use crate::domain::{
    DependencyKind, DependencyState, Operation, OperationKind, OperationStatus, ProcessSlot,
};
use crate::error::Result;
use crate::port::{CommandRunner, IdProvider, OperationListener};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Marker file that makes a directory a simulation project
pub const PROJECT_MARKER: &str = "simulation/simulation.ois";

pub fn is_simulation_project(dir: &Path) -> bool {
    dir.join(PROJECT_MARKER).is_file()
}

/// Per-project entry point for UI collaborators.
///
/// Each category (dependency refresh, simulation, export) runs at most one
/// flight at a time; different categories run concurrently.
pub struct ProjectContext {
    project_dir: PathBuf,
    name: String,
    tasks: BackgroundTaskRunner,
    dependencies: DependencyOrchestrator,
    simulation: SimulationWorkflows,
}

impl ProjectContext {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        config: Arc<WorkbenchConfig>,
        runner: Arc<dyn CommandRunner>,
        listener: Arc<dyn OperationListener>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        let project_dir = project_dir.into();
        let name = project_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());

        let dependencies =
            DependencyOrchestrator::new(&project_dir, Arc::clone(&config), Arc::clone(&runner));
        let simulation = SimulationWorkflows::new(
            &project_dir,
            &name,
            BuildTool::new(Arc::clone(&runner), config),
            runner,
            Arc::new(ProcessSlot::new()),
        );

        Self {
            project_dir,
            name,
            tasks: BackgroundTaskRunner::new(listener, id_provider),
            dependencies,
            simulation,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_simulation_project(&self) -> bool {
        is_simulation_project(&self.project_dir)
    }

    /// Start an operation in the background.
    ///
    /// `Ok(None)` when its category is already running, or when the
    /// directory is not a simulation project and the operation needs one.
    pub fn start(&self, operation: Operation) -> Result<Option<TaskHandle>> {
        if matches!(operation, Operation::Refresh { .. } | Operation::Export)
            && !self.is_simulation_project()
        {
            warn!(project = %self.project_dir.display(), operation = ?operation, "Not OIS Project");
            return Ok(None);
        }

        info!(project = %self.name, operation = ?operation, "Starting operation");
        let workflows = Workflows {
            dependencies: self.dependencies.clone(),
            simulation: self.simulation.clone(),
        };
        self.tasks
            .run_exclusive(operation.kind(), operation.title(), move |progress| {
                operation_body(workflows, operation, progress)
            })
    }

    pub fn refresh(&self, force_install: bool) -> Result<Option<TaskHandle>> {
        self.start(Operation::Refresh { force_install })
    }

    pub fn run_simulation(&self) -> Result<Option<TaskHandle>> {
        self.start(Operation::Run)
    }

    pub fn run_dev_mode(&self) -> Result<Option<TaskHandle>> {
        self.start(Operation::DevMode)
    }

    pub fn export(&self) -> Result<Option<TaskHandle>> {
        self.start(Operation::Export)
    }

    /// Stop the simulation: cancel its flight, then terminate the running
    /// process (graceful, then forced). The flight ends as cancelled.
    /// With no process running this only logs a warning.
    pub async fn stop_simulation(&self) -> Result<bool> {
        if self.simulation.active_pid().is_some() {
            self.tasks.cancel(OperationKind::Simulation);
        }
        self.simulation.stop().await
    }

    pub fn is_running(&self, kind: OperationKind) -> bool {
        self.tasks.is_running(kind)
    }

    pub fn status(&self, kind: OperationKind) -> OperationStatus {
        self.tasks.status(kind)
    }

    pub fn dependency_state(&self) -> DependencyState {
        self.dependencies.state()
    }

    /// Download-cache and registry presence of the project's dependencies.
    ///
    /// Uses the last refresh when there was one, otherwise what the project
    /// files declare right now.
    pub fn dependency_report(&self) -> Result<Vec<DependencyReport>> {
        let mut state = self.dependency_state();
        if !state.is_resolved() {
            state = self.dependencies.resolve_versions()?;
        }
        let cache = self.dependencies.cache();
        Ok([DependencyKind::Plugin, DependencyKind::Core]
            .into_iter()
            .map(|kind| {
                let version = state.version(kind).cloned();
                DependencyReport {
                    kind,
                    cached: version
                        .as_ref()
                        .is_some_and(|version| cache.exists_locally(kind, version)),
                    installed: cache.exists_in_registry(kind),
                    version,
                }
            })
            .collect())
    }

    pub fn distribution_dir(&self) -> PathBuf {
        self.simulation.distribution_dir()
    }
}

/// One row of `dependency_report`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub kind: DependencyKind,
    pub version: Option<crate::domain::Version>,
    pub cached: bool,
    pub installed: bool,
}

/// Everything an operation body needs, moved onto the operation thread
struct Workflows {
    dependencies: DependencyOrchestrator,
    simulation: SimulationWorkflows,
}

async fn operation_body(
    workflows: Workflows,
    operation: Operation,
    progress: Arc<ProgressReporter>,
) -> Result<Completion> {
    match operation {
        Operation::Refresh { force_install } => {
            workflows
                .dependencies
                .run_pipeline(force_install, &progress)
                .await
        }
        Operation::Run => workflows.simulation.run(&progress).await,
        Operation::DevMode => workflows.simulation.dev_mode(&progress).await,
        Operation::Export => workflows.simulation.export(&progress).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationOutcome;
    use crate::port::command_runner::mocks::{MockCommandRunner, MOCK_PID};
    use crate::port::id_provider::SequentialIdProvider;
    use crate::port::listener::mocks::RecordingListener;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        context: ProjectContext,
        runner: Arc<MockCommandRunner>,
        listener: Arc<RecordingListener>,
    }

    fn fixture_with(runner: MockCommandRunner, project: bool) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("demo");
        std::fs::create_dir_all(&dir).unwrap();
        if project {
            std::fs::create_dir_all(dir.join("simulation")).unwrap();
            std::fs::write(dir.join(PROJECT_MARKER), "{}").unwrap();
        }
        let runner = Arc::new(runner);
        let listener = Arc::new(RecordingListener::new());
        let context = ProjectContext::new(
            &dir,
            Arc::new(WorkbenchConfig::new(tmp.path().join("home"))),
            runner.clone(),
            listener.clone(),
            Arc::new(SequentialIdProvider::default()),
        );
        Fixture {
            _tmp: tmp,
            context,
            runner,
            listener,
        }
    }

    #[test]
    fn test_project_detection() {
        let fx = fixture_with(MockCommandRunner::new_success(), true);
        assert!(fx.context.is_simulation_project());
        assert_eq!(fx.context.name(), "demo");

        let other = fixture_with(MockCommandRunner::new_success(), false);
        assert!(!other.context.is_simulation_project());
    }

    #[tokio::test]
    async fn test_refresh_and_export_refused_outside_project() {
        let fx = fixture_with(MockCommandRunner::new_success(), false);

        assert!(fx.context.refresh(false).unwrap().is_none());
        assert!(fx.context.export().unwrap().is_none());
        assert_eq!(fx.runner.call_count(), 0);
        assert!(fx.listener.events().is_empty());
    }

    #[tokio::test]
    async fn test_run_and_dev_mode_share_simulation_category() {
        let (runner, gate) = MockCommandRunner::new_success().gated();
        let fx = fixture_with(runner, true);

        let run = fx.context.run_simulation().unwrap().unwrap();
        assert_eq!(run.kind(), OperationKind::Simulation);
        assert!(fx.context.run_dev_mode().unwrap().is_none());
        assert_eq!(fx.context.status(OperationKind::Simulation), OperationStatus::Running);

        gate.open();
        assert_eq!(run.wait().await, OperationOutcome::Succeeded);
        assert_eq!(fx.context.status(OperationKind::Simulation), OperationStatus::Idle);
    }

    #[tokio::test]
    async fn test_stop_simulation_kills_active_process() {
        // A terminated process exits with 128 + SIGTERM
        let (runner, gate) = MockCommandRunner::new_exit(143, "Terminated").gated();
        let fx = fixture_with(runner, true);

        let run = fx.context.run_simulation().unwrap().unwrap();
        while fx.runner.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(fx.context.stop_simulation().await.unwrap());
        assert_eq!(fx.runner.killed(), vec![MOCK_PID]);

        gate.open();
        assert_eq!(run.wait().await, OperationOutcome::Cancelled);
        assert_eq!(
            fx.listener.progress(OperationKind::Simulation).last(),
            Some(&crate::domain::ProgressEvent::Cancelled)
        );
        assert!(!fx.context.stop_simulation().await.unwrap());
    }

    #[tokio::test]
    async fn test_export_runs_beside_simulation() {
        let (runner, gate) = MockCommandRunner::new_success().gated();
        let fx = fixture_with(runner, true);

        let run = fx.context.run_simulation().unwrap().unwrap();
        let export = fx.context.export().unwrap().unwrap();
        assert!(fx.context.is_running(OperationKind::Export));

        gate.open();
        assert_eq!(export.wait().await, OperationOutcome::Succeeded);
        assert_eq!(run.wait().await, OperationOutcome::Succeeded);
        assert!(fx.context.distribution_dir().ends_with("build/ois/distribution"));
    }

    #[tokio::test]
    async fn test_status_per_category() {
        let (runner, gate) = MockCommandRunner::new_success().gated();
        let fx = fixture_with(runner, true);

        let run = fx.context.run_simulation().unwrap().unwrap();
        let statuses: Vec<_> = OperationKind::ALL
            .into_iter()
            .map(|kind| fx.context.status(kind))
            .collect();
        assert_eq!(
            statuses,
            [OperationStatus::Idle, OperationStatus::Running, OperationStatus::Idle]
        );

        gate.open();
        assert_eq!(run.wait().await, OperationOutcome::Succeeded);
        assert!(OperationKind::ALL
            .into_iter()
            .all(|kind| fx.context.status(kind) == OperationStatus::Idle));
    }

    #[test]
    fn test_dependency_report_before_refresh() {
        let fx = fixture_with(MockCommandRunner::new_success(), true);

        let report = fx.context.dependency_report().unwrap();

        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|row| row.version.is_none() && !row.cached && !row.installed));
    }

    #[test]
    fn test_dependency_report_reads_declared_plugin_version() {
        let fx = fixture_with(MockCommandRunner::new_success(), true);
        std::fs::write(
            fx.context.project_dir().join("build.gradle"),
            "id 'org.ois.simulation' version '2.0'",
        )
        .unwrap();

        let report = fx.context.dependency_report().unwrap();

        assert_eq!(report[0].kind, DependencyKind::Plugin);
        assert_eq!(report[0].version.as_ref().map(|v| v.as_str()), Some("2.0"));
        assert_eq!(report[1].version, None);
    }
}

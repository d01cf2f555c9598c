// Simulation workflows: run, dev mode, export and stop

use crate::application::build_tool::{BuildRequest, BuildTool};
use crate::application::task::{Completion, ProgressReporter};
use crate::domain::ProcessSlot;
use crate::error::Result;
use crate::port::CommandRunner;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const RUN_TASK: &str = "runDesktop";
pub const EXPORT_TASK: &str = "export";
pub const DEBUG_MODE_PROPERTY: &str = "org.ois.runner.debugMode";
pub const DEV_MODE_DIR_PROPERTY: &str = "org.ois.runner.devModeDir";

/// Where `export` leaves the distribution, relative to the project
pub const DISTRIBUTION_DIR: &str = "build/ois/distribution";

/// Build-tool driven workflows of one project.
///
/// Run and dev mode share the simulation category, so at most one of them
/// owns `slot` at a time.
#[derive(Clone)]
pub struct SimulationWorkflows {
    project_dir: PathBuf,
    project_name: String,
    build_tool: BuildTool,
    runner: Arc<dyn CommandRunner>,
    slot: Arc<ProcessSlot>,
}

impl SimulationWorkflows {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        project_name: impl Into<String>,
        build_tool: BuildTool,
        runner: Arc<dyn CommandRunner>,
        slot: Arc<ProcessSlot>,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            project_name: project_name.into(),
            build_tool,
            runner,
            slot,
        }
    }

    pub fn distribution_dir(&self) -> PathBuf {
        self.project_dir.join(DISTRIBUTION_DIR)
    }

    /// `runDesktop --info -D org.ois.runner.debugMode=true`
    pub async fn run(&self, progress: &ProgressReporter) -> Result<Completion> {
        progress.message("Running Simulation")?;
        let request = BuildRequest::new(&self.project_dir, [RUN_TASK, "--info"])
            .property(DEBUG_MODE_PROPERTY, "true");
        self.run_tracked(&request).await?;
        Ok(Completion::Done)
    }

    /// `runDesktop --info -D org.ois.runner.devModeDir='<scratch dir>'`
    ///
    /// The value is quoted: the Unix command line runs through `/bin/sh -c`.
    /// The scratch directory outlives the run so the simulation can keep
    /// reading what it wrote there.
    pub async fn dev_mode(&self, progress: &ProgressReporter) -> Result<Completion> {
        let dev_dir = self.create_dev_dir()?;
        info!(dir = %dev_dir.display(), "Dev mode directory created");

        progress.message("Running Simulation (dev mode)")?;
        let request = BuildRequest::new(&self.project_dir, [RUN_TASK, "--info"])
            .property(DEV_MODE_DIR_PROPERTY, format!("'{}'", dev_dir.display()));
        self.run_tracked(&request).await?;
        Ok(Completion::Done)
    }

    /// `export`, then report where the distribution landed
    pub async fn export(&self, progress: &ProgressReporter) -> Result<Completion> {
        progress.message("Exporting Simulation")?;
        let request = BuildRequest::new(&self.project_dir, [EXPORT_TASK]);
        self.build_tool.invoke(&request, None).await?;

        let distribution = self.distribution_dir();
        info!(dir = %distribution.display(), "Project exported");
        progress.state(format!("Exported to {}", distribution.display()), 1.0)?;
        Ok(Completion::Done)
    }

    /// Terminate the simulation process, if one is running.
    /// Returns whether a process was signalled.
    pub async fn stop(&self) -> Result<bool> {
        let Some(pid) = self.slot.current() else {
            warn!(project = %self.project_name, "No running process to stop.");
            return Ok(false);
        };

        info!(pid = pid, project = %self.project_name, "Stopping simulation");
        self.runner.kill(pid).await?;
        Ok(true)
    }

    pub fn active_pid(&self) -> Option<u32> {
        self.slot.current()
    }

    async fn run_tracked(&self, request: &BuildRequest) -> Result<()> {
        let result = self.build_tool.invoke(request, Some(self.slot.as_ref())).await;
        self.slot.clear();
        result.map(|_| ())
    }

    fn create_dev_dir(&self) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("ois_{}_dev", sanitize(&self.project_name)))
            .tempdir()?;
        Ok(dir.keep())
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::task::cancel_channel;
    use std::path::Path;
    use crate::config::WorkbenchConfig;
    use crate::domain::OperationKind;
    use crate::port::command_runner::mocks::{MockCommandRunner, MOCK_PID};
    use crate::port::listener::mocks::RecordingListener;
    use tokio_test::assert_ok;

    fn is_scratch_dir(path: &Path) -> bool {
        path.starts_with(std::env::temp_dir())
    }

    fn workflows(runner: Arc<MockCommandRunner>) -> SimulationWorkflows {
        let config = Arc::new(WorkbenchConfig::new("/home/dev"));
        SimulationWorkflows::new(
            "/work/My Sim",
            "My Sim",
            BuildTool::new(runner.clone(), config),
            runner,
            Arc::new(ProcessSlot::new()),
        )
    }

    fn reporter(kind: OperationKind) -> (ProgressReporter, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::new());
        let (_cancel, token) = cancel_channel();
        let reporter = ProgressReporter::new(kind, "run-1".to_string(), listener.clone(), token);
        (reporter, listener)
    }

    #[tokio::test]
    async fn test_run_enables_debug_mode() {
        let runner = Arc::new(MockCommandRunner::new_success());
        let (progress, _listener) = reporter(OperationKind::Simulation);

        assert_ok!(workflows(runner.clone()).run(&progress).await);

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].args(),
            ["runDesktop", "--info", "-D", "org.ois.runner.debugMode=true"]
        );
    }

    #[tokio::test]
    async fn test_dev_mode_passes_scratch_dir() {
        let runner = Arc::new(MockCommandRunner::new_success());
        let (progress, _listener) = reporter(OperationKind::Simulation);

        assert_ok!(workflows(runner.clone()).dev_mode(&progress).await);

        let calls = runner.calls();
        let property = calls[0].args().last().unwrap();
        let dir = property
            .strip_prefix("org.ois.runner.devModeDir='")
            .and_then(|rest| rest.strip_suffix('\''))
            .expect("quoted dev mode dir property");
        let dir = Path::new(dir);
        assert!(dir.is_dir());
        assert!(is_scratch_dir(dir));
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("ois_My_Sim_dev"));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_export_reports_distribution_dir() {
        let runner = Arc::new(MockCommandRunner::new_success());
        let (progress, listener) = reporter(OperationKind::Export);

        assert_ok!(workflows(runner.clone()).export(&progress).await);

        assert_eq!(runner.calls_with_arg(EXPORT_TASK).len(), 1);
        let last = listener.progress(OperationKind::Export).pop().unwrap();
        match last {
            crate::domain::ProgressEvent::Update { message, fraction } => {
                assert!(message.ends_with("build/ois/distribution"));
                assert_eq!(fraction, Some(1.0));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_kills_tracked_process() {
        let (runner, gate) = MockCommandRunner::new_success().gated();
        let runner = Arc::new(runner);
        let workflows = workflows(runner.clone());

        let running = workflows.clone();
        let task = tokio::spawn(async move {
            let (progress, _listener) = reporter(OperationKind::Simulation);
            running.run(&progress).await
        });
        while workflows.active_pid().is_none() {
            tokio::task::yield_now().await;
        }

        assert!(workflows.stop().await.unwrap());
        assert_eq!(runner.killed(), vec![MOCK_PID]);

        gate.open();
        assert_ok!(task.await.unwrap());
        assert_eq!(workflows.active_pid(), None);
    }

    #[tokio::test]
    async fn test_stop_without_process_is_noop() {
        let runner = Arc::new(MockCommandRunner::new_success());

        assert!(!workflows(runner.clone()).stop().await.unwrap());
        assert!(runner.killed().is_empty());
    }

    #[test]
    fn test_sanitize_project_name() {
        assert_eq!(sanitize("My Sim/1"), "My_Sim_1");
    }
}

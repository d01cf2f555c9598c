// Build tool helper - runs gradle tasks through the project wrapper when present

use crate::config::WorkbenchConfig;
use crate::domain::{CommandSpec, ProcessResult, ProcessSlot};
use crate::error::Result;
use crate::port::CommandRunner;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Task that installs a checkout into the local package registry
pub const INSTALL_TASK: &str = "publishToMavenLocal";

#[cfg(windows)]
const WRAPPER_NAME: &str = "gradlew.bat";
#[cfg(not(windows))]
const WRAPPER_NAME: &str = "gradlew";

const FALLBACK_EXECUTABLE: &str = "gradle";

/// One build-tool invocation
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub working_dir: PathBuf,
    pub tasks: Vec<String>,
    /// Passed as `-D key=value`
    pub properties: Vec<(String, String)>,
    pub env: Option<HashMap<String, String>>,
    /// Run every task as a separate command, stopping at the first failure
    pub one_by_one: bool,
}

impl BuildRequest {
    pub fn new<I, S>(working_dir: impl Into<PathBuf>, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            working_dir: working_dir.into(),
            tasks: tasks.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn one_by_one(mut self) -> Self {
        self.one_by_one = true;
        self
    }
}

#[derive(Clone)]
pub struct BuildTool {
    runner: Arc<dyn CommandRunner>,
    config: Arc<WorkbenchConfig>,
}

impl BuildTool {
    pub fn new(runner: Arc<dyn CommandRunner>, config: Arc<WorkbenchConfig>) -> Self {
        Self { runner, config }
    }

    /// Wrapper script in `working_dir` if it exists, otherwise bare `gradle`
    pub fn executable_for(working_dir: &Path) -> String {
        let wrapper = working_dir.join(WRAPPER_NAME);
        if wrapper.is_file() {
            wrapper.to_string_lossy().into_owned()
        } else {
            FALLBACK_EXECUTABLE.to_string()
        }
    }

    /// Run the requested tasks; a non-ok result becomes `ExecutionError::CommandFailed`
    /// (or `Timeout`) carrying stderr. Returns the result of the last command.
    pub async fn invoke(&self, request: &BuildRequest, slot: Option<&ProcessSlot>) -> Result<ProcessResult> {
        let executable = Self::executable_for(&request.working_dir);
        debug!(executable = %executable, dir = %request.working_dir.display(), "Build tool selected");

        let batches: Vec<Vec<String>> = if request.one_by_one {
            request.tasks.iter().map(|task| vec![task.clone()]).collect()
        } else {
            vec![request.tasks.clone()]
        };

        let mut last = None;
        for tasks in batches {
            let spec = self.spec(&executable, request, &tasks);
            info!(command = %spec.display_line(), "Running build tool");
            let result = self
                .runner
                .execute_tracked(&spec, slot)
                .await?
                .check(&format!("run {}", tasks.join(" ")))?;
            last = Some(result);
        }

        Ok(last.unwrap_or_else(|| ProcessResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            timed_out: false,
            pid: None,
            duration_ms: 0,
        }))
    }

    /// `publishToMavenLocal` in a checkout
    pub async fn install(&self, checkout_dir: &Path) -> Result<ProcessResult> {
        self.invoke(&BuildRequest::new(checkout_dir, [INSTALL_TASK]).one_by_one(), None)
            .await
    }

    fn spec(&self, executable: &str, request: &BuildRequest, tasks: &[String]) -> CommandSpec {
        let mut builder = CommandSpec::builder(executable)
            .args(tasks.iter().cloned())
            .working_dir(&request.working_dir)
            .timeout(self.config.command_timeout);
        for (key, value) in &request.properties {
            builder = builder.arg("-D").arg(format!("{}={}", key, value));
        }
        if let Some(env) = &request.env {
            builder = builder.env(env.clone());
        }
        builder.build()
    }
}

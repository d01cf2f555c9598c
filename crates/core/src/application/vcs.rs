// Version control helper - shallow wrapper over `git clone`

use crate::config::WorkbenchConfig;
use crate::domain::{CommandSpec, ProcessResult, Version};
use crate::error::{AppError, Result};
use crate::port::CommandRunner;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct Vcs {
    runner: Arc<dyn CommandRunner>,
    config: Arc<WorkbenchConfig>,
}

impl Vcs {
    pub fn new(runner: Arc<dyn CommandRunner>, config: Arc<WorkbenchConfig>) -> Self {
        Self { runner, config }
    }

    /// `git clone --branch <version> <url> <dest>`
    pub async fn clone_at(&self, url: &str, version: &Version, dest: &Path) -> Result<ProcessResult> {
        self.run_clone(url, Some(version), dest).await
    }

    /// `git clone <url> <dest>` (default branch)
    pub async fn clone_default(&self, url: &str, dest: &Path) -> Result<ProcessResult> {
        self.run_clone(url, None, dest).await
    }

    async fn run_clone(&self, url: &str, version: Option<&Version>, dest: &Path) -> Result<ProcessResult> {
        let parent = dest.parent().ok_or_else(|| {
            AppError::InvalidState(format!("Clone destination has no parent: {}", dest.display()))
        })?;

        let mut builder = CommandSpec::builder("").args(["git", "clone"]);
        if let Some(version) = version {
            builder = builder.args(["--branch", version.as_str()]);
        }
        let spec = builder
            .arg(url)
            .arg(dest.to_string_lossy())
            .working_dir(parent)
            .timeout(self.config.command_timeout)
            .build();

        info!(url = %url, version = ?version.map(Version::as_str), "Cloning");
        let description = match version {
            Some(version) => format!("clone {}:{}", url, version),
            None => format!("clone {}", url),
        };
        Ok(self.runner.execute(&spec).await?.check(&description)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::command_runner::mocks::MockCommandRunner;
    use crate::port::ExecutionError;

    fn vcs(runner: Arc<MockCommandRunner>) -> Vcs {
        Vcs::new(runner, Arc::new(WorkbenchConfig::new("/home/dev")))
    }

    #[tokio::test]
    async fn test_clone_at_version_runs_git_in_parent() {
        let runner = Arc::new(MockCommandRunner::new_success());
        let dest = Path::new("/cache/plugin/1.2.3/ois-gradle-plugin");

        vcs(runner.clone())
            .clone_at("https://host/p.git", &Version::new("1.2.3").unwrap(), dest)
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].executable(), "");
        assert_eq!(
            calls[0].args(),
            [
                "git",
                "clone",
                "--branch",
                "1.2.3",
                "https://host/p.git",
                "/cache/plugin/1.2.3/ois-gradle-plugin"
            ]
        );
        assert_eq!(calls[0].working_dir(), Some(Path::new("/cache/plugin/1.2.3")));
    }

    #[tokio::test]
    async fn test_clone_default_has_no_branch() {
        let runner = Arc::new(MockCommandRunner::new_success());

        vcs(runner.clone())
            .clone_default("https://host/c.git", Path::new("/cache/core/0.4/ois-core"))
            .await
            .unwrap();

        assert!(runner.calls_with_arg("--branch").is_empty());
    }

    #[tokio::test]
    async fn test_failed_clone_carries_stderr() {
        let runner = Arc::new(MockCommandRunner::new_exit(128, "Remote branch 9.9 not found"));

        let err = vcs(runner)
            .clone_at(
                "https://host/p.git",
                &Version::new("9.9").unwrap(),
                Path::new("/cache/plugin/9.9/ois-gradle-plugin"),
            )
            .await
            .unwrap_err();

        match err {
            AppError::Execution(ExecutionError::CommandFailed {
                exit_code, stderr, ..
            }) => {
                assert_eq!(exit_code, 128);
                assert!(stderr.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

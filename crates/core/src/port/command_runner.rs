// Command Runner Port
// Abstraction for running external commands (process engine lives in infra-system)

use crate::domain::{CommandSpec, ProcessResult, ProcessSlot};
use async_trait::async_trait;
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Executable '{0}' not found in default paths")]
    NotFound(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    /// The command ran and exited non-zero
    #[error("Failed to {description} (exit code {exit_code}): {stderr}")]
    CommandFailed {
        description: String,
        exit_code: i32,
        stderr: String,
    },

    /// The command outlived its timeout and was terminated (exit code 124)
    #[error("Timed out while trying to {description}: {stderr}")]
    Timeout { description: String, stderr: String },

    #[error("Process kill failed: {0}")]
    Killed(String),
}

impl ProcessResult {
    /// Turn a non-ok result into an error carrying the captured stderr
    ///
    /// `description` completes the sentence "Failed to ...", e.g. `clone <url>`.
    pub fn check(self, description: &str) -> Result<ProcessResult, ExecutionError> {
        if self.timed_out {
            return Err(ExecutionError::Timeout {
                description: description.to_string(),
                stderr: self.stderr,
            });
        }
        if self.exit_code != 0 {
            return Err(ExecutionError::CommandFailed {
                description: description.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr,
            });
        }
        Ok(self)
    }
}

/// Command Runner trait
///
/// Implementations:
/// - SubprocessExecutor (infra-system): spawns a real OS process
/// - MockCommandRunner: scripted results for workflow tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, publishing its pid in `slot` while it runs
    ///
    /// # Errors
    /// Only for failures to construct or start the process
    /// (`NotFound`, `InvalidCommand`, `SpawnFailed`, `IoError`). A command
    /// that runs and fails is reported through the result's exit code.
    async fn execute_tracked(
        &self,
        spec: &CommandSpec,
        slot: Option<&ProcessSlot>,
    ) -> Result<ProcessResult, ExecutionError>;

    /// Run a command to completion
    async fn execute(&self, spec: &CommandSpec) -> Result<ProcessResult, ExecutionError> {
        self.execute_tracked(spec, None).await
    }

    /// Terminate a process: graceful request first, forced kill after the grace period
    async fn kill(&self, pid: u32) -> Result<(), ExecutionError>;

    /// Check if a process is still alive
    fn is_alive(&self, pid: u32) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::watch;

    type Handler = dyn Fn(&CommandSpec) -> Result<ProcessResult, ExecutionError> + Send + Sync;

    /// Pid reported by the mock for tracked executions
    pub const MOCK_PID: u32 = 4242;

    /// Successful result with the given stdout
    pub fn ok_result(stdout: impl Into<String>) -> ProcessResult {
        ProcessResult {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            timed_out: false,
            pid: Some(MOCK_PID),
            duration_ms: 1,
        }
    }

    /// Failed result with the given exit code and stderr
    pub fn exit_result(exit_code: i32, stderr: impl Into<String>) -> ProcessResult {
        ProcessResult {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            timed_out: false,
            pid: Some(MOCK_PID),
            duration_ms: 1,
        }
    }

    /// Opens the gate of a gated mock; every waiting and future call proceeds
    pub struct GateOpener(watch::Sender<bool>);

    impl GateOpener {
        pub fn open(&self) {
            let _ = self.0.send(true);
        }
    }

    /// Mock Command Runner for testing
    pub struct MockCommandRunner {
        handler: Box<Handler>,
        calls: Arc<Mutex<Vec<CommandSpec>>>,
        killed: Arc<Mutex<Vec<u32>>>,
        gate: Option<watch::Receiver<bool>>,
    }

    impl MockCommandRunner {
        /// Every command succeeds with empty output
        pub fn new_success() -> Self {
            Self::with_handler(|_| Ok(ok_result("")))
        }

        /// Every command exits with the given code and stderr
        pub fn new_exit(exit_code: i32, stderr: impl Into<String>) -> Self {
            let stderr = stderr.into();
            Self::with_handler(move |_| Ok(exit_result(exit_code, stderr.clone())))
        }

        pub fn with_handler<F>(handler: F) -> Self
        where
            F: Fn(&CommandSpec) -> Result<ProcessResult, ExecutionError> + Send + Sync + 'static,
        {
            Self {
                handler: Box::new(handler),
                calls: Arc::new(Mutex::new(Vec::new())),
                killed: Arc::new(Mutex::new(Vec::new())),
                gate: None,
            }
        }

        /// Hold every call until the returned opener is used
        pub fn gated(mut self) -> (Self, GateOpener) {
            let (tx, rx) = watch::channel(false);
            self.gate = Some(rx);
            (self, GateOpener(tx))
        }

        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Calls whose full argument list contains `needle`
        pub fn calls_with_arg(&self, needle: &str) -> Vec<CommandSpec> {
            self.calls()
                .into_iter()
                .filter(|spec| spec.args().iter().any(|arg| arg == needle))
                .collect()
        }

        pub fn killed(&self) -> Vec<u32> {
            self.killed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for MockCommandRunner {
        async fn execute_tracked(
            &self,
            spec: &CommandSpec,
            slot: Option<&ProcessSlot>,
        ) -> Result<ProcessResult, ExecutionError> {
            if let Some(slot) = slot {
                slot.set(MOCK_PID);
            }
            self.calls.lock().unwrap().push(spec.clone());

            if let Some(mut gate) = self.gate.clone() {
                let _ = gate.wait_for(|open| *open).await;
            }
            let result = (self.handler)(spec);
            if let Some(slot) = slot {
                slot.clear();
            }
            result
        }

        async fn kill(&self, pid: u32) -> Result<(), ExecutionError> {
            self.killed.lock().unwrap().push(pid);
            Ok(())
        }

        fn is_alive(&self, _pid: u32) -> bool {
            false
        }
    }
}

// Subprocess executor - real OS processes behind the CommandRunner port
// reason: async-trait, tokio for async process management, nix for signals
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::environment::{build_environment, prepend_path};
use crate::platform::{format_command, FormattedCommand, TargetPlatform};
use crate::resolve::ExecutableResolver;
use workbench_core::application::task::constants::{
    OUTPUT_DRAIN_GRACE, TERMINATION_GRACE, TERMINATION_POLL_INTERVAL,
};
use workbench_core::domain::{CommandSpec, ProcessResult, ProcessSlot};
use workbench_core::port::{CommandRunner, ExecutionError, TimeProvider};

type OutputBuffer = Arc<Mutex<Vec<u8>>>;

/// Subprocess executor
///
/// Runs one command to completion: stdin closed, stdout and stderr drained
/// concurrently, wait bounded by the command timeout, and a
/// SIGTERM-then-SIGKILL ladder whenever the process has to go.
pub struct SubprocessExecutor {
    time_provider: Arc<dyn TimeProvider>,
    platform: TargetPlatform,
    resolver: ExecutableResolver,
    drain_grace: Duration,
    termination_grace: Duration,
}

impl SubprocessExecutor {
    /// Create an executor for the host platform
    ///
    /// # Example
    /// ```ignore
    /// let executor = SubprocessExecutor::new(Arc::new(SystemTimeProvider));
    /// let result = executor.execute(&CommandSpec::builder("git").arg("--version").build()).await?;
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        let platform = TargetPlatform::detect();
        Self {
            time_provider,
            platform,
            resolver: ExecutableResolver::for_platform(platform),
            drain_grace: OUTPUT_DRAIN_GRACE,
            termination_grace: TERMINATION_GRACE,
        }
    }

    /// Replace the executable lookup (e.g. extra search directories)
    pub fn with_resolver(mut self, resolver: ExecutableResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Override the drain and termination grace periods (tests use short ones)
    pub fn with_grace(mut self, drain: Duration, termination: Duration) -> Self {
        self.drain_grace = drain;
        self.termination_grace = termination;
        self
    }

    /// Resolve, format and configure the command without spawning it
    fn prepare(&self, spec: &CommandSpec) -> Result<(Command, FormattedCommand), ExecutionError> {
        let executable = self.resolver.resolve(spec.executable())?;
        let formatted = format_command(self.platform, &executable, spec.args(), spec.credentials())?;

        let mut env = build_environment(self.platform, std::env::vars(), spec.env());
        if let Some(dir) = &formatted.path_prefix {
            let env = env.get_or_insert_with(|| std::env::vars().collect());
            prepend_path(self.platform, env, dir);
        }

        let mut command = Command::new(&formatted.program);
        command
            .args(&formatted.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Unix termination is graceful and handled by TerminationGuard
            .kill_on_drop(cfg!(not(unix)));
        if let Some(dir) = spec.working_dir() {
            command.current_dir(dir);
        }
        if let Some(env) = env {
            command.env_clear().envs(env);
        }
        Ok((command, formatted))
    }

    /// Run one command to completion and collect its output
    async fn execute_internal(
        &self,
        spec: &CommandSpec,
        slot: Option<&ProcessSlot>,
    ) -> Result<ProcessResult, ExecutionError> {
        let (mut command, formatted) = self.prepare(spec)?;
        let start_time = self.time_provider.now_millis();

        info!(
            command = %formatted.display,
            working_dir = ?spec.working_dir(),
            timeout_secs = spec.timeout().as_secs(),
            "Executing command"
        );

        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExecutionError::NotFound(formatted.program.clone()),
            _ => ExecutionError::SpawnFailed(e.to_string()),
        })?;

        // Nothing is ever written to the child
        drop(child.stdin.take());

        let pid = child.id();
        let mut guard = TerminationGuard::new(pid, self.termination_grace);
        let mut published = SlotGuard::publish(slot, pid);

        let stdout: OutputBuffer = Arc::default();
        let stderr: OutputBuffer = Arc::default();
        let mut stdout_task = spawn_drain(child.stdout.take(), Arc::clone(&stdout));
        let mut stderr_task = spawn_drain(child.stderr.take(), Arc::clone(&stderr));

        let waited = timeout(spec.timeout(), child.wait()).await;
        let status = match waited {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => return Err(ExecutionError::IoError(e.to_string())),
            Err(_) => {
                warn!(
                    command = %formatted.display,
                    pid = ?pid,
                    timeout_secs = spec.timeout().as_secs(),
                    "Command timed out, terminating"
                );
                self.terminate(&mut child, pid).await
            }
        };
        guard.disarm();
        // Reaped: the pid may be reused from here on
        published.release();

        let drained = timeout(self.drain_grace, async {
            let _ = (&mut stdout_task).await;
            let _ = (&mut stderr_task).await;
        })
        .await
        .is_ok();
        if !drained {
            warn!(command = %formatted.display, "Output not drained in time");
            stdout_task.abort();
            stderr_task.abort();
        }

        let mut result = ProcessResult {
            stdout: take_output(&stdout),
            stderr: take_output(&stderr),
            exit_code: status.map(exit_code).unwrap_or(-1),
            timed_out: false,
            pid,
            duration_ms: self.time_provider.millis_since(start_time),
        };
        if status.is_none() || !drained {
            result.mark_timed_out(&formatted.display);
        }

        info!(
            command = %formatted.display,
            duration_ms = result.duration_ms,
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            "Command completed"
        );

        Ok(result)
    }

    /// Graceful-then-forceful termination of a child we own; reaps it
    async fn terminate(&self, child: &mut Child, pid: Option<u32>) -> Option<ExitStatus> {
        #[cfg(unix)]
        if let Some(pid) = pid {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            info!(pid = %pid, "Sending SIGTERM for graceful shutdown");
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                if let Ok(Ok(status)) = timeout(self.termination_grace, child.wait()).await {
                    info!(pid = %pid, "Process exited gracefully after SIGTERM");
                    return Some(status);
                }
                warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
            }
        }
        #[cfg(not(unix))]
        let _ = pid;

        if let Err(e) = child.kill().await {
            warn!(error = %e, "Forced kill failed");
        }
        child.try_wait().ok().flatten()
    }

    /// Kill process with SIGTERM first, then SIGKILL if needed
    async fn kill_graceful(&self, pid: u32) -> Result<(), ExecutionError> {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let target = Pid::from_raw(pid as i32);

            // Step 1: Send SIGTERM for graceful shutdown
            info!(pid = %pid, "Sending SIGTERM for graceful shutdown");
            match kill(target, Signal::SIGTERM) {
                Ok(()) => {}
                Err(Errno::ESRCH) => {
                    debug!(pid = %pid, "Process already gone");
                    return Ok(());
                }
                Err(e) => return Err(ExecutionError::Killed(format!("SIGTERM failed: {}", e))),
            }

            // Step 2: Wait for process to exit (poll)
            let grace_ms = self.termination_grace.as_millis() as i64;
            let start_time = self.time_provider.now_millis();
            loop {
                tokio::time::sleep(TERMINATION_POLL_INTERVAL).await;

                if !self.is_alive(pid) {
                    info!(pid = %pid, "Process exited gracefully after SIGTERM");
                    return Ok(());
                }

                // Timeout: force kill with SIGKILL
                if self.time_provider.millis_since(start_time) > grace_ms {
                    warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
                    return match kill(target, Signal::SIGKILL) {
                        Ok(()) | Err(Errno::ESRCH) => Ok(()),
                        Err(e) => Err(ExecutionError::Killed(format!("SIGKILL failed: {}", e))),
                    };
                }
            }
        }

        #[cfg(windows)]
        {
            // Windows: taskkill /PID with /F flag (force kill)
            info!(pid = %pid, "Killing process on Windows");
            let output = Command::new("taskkill")
                .args(["/F", "/PID", &pid.to_string()])
                .output()
                .await
                .map_err(|e| ExecutionError::Killed(e.to_string()))?;

            if !output.status.success() {
                return Err(ExecutionError::Killed(format!(
                    "taskkill failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                )));
            }

            Ok(())
        }
    }
}

#[async_trait]
impl CommandRunner for SubprocessExecutor {
    async fn execute_tracked(
        &self,
        spec: &CommandSpec,
        slot: Option<&ProcessSlot>,
    ) -> Result<ProcessResult, ExecutionError> {
        self.execute_internal(spec, slot).await
    }

    async fn kill(&self, pid: u32) -> Result<(), ExecutionError> {
        self.kill_graceful(pid).await
    }

    fn is_alive(&self, pid: u32) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal::kill;
            use nix::unistd::Pid;

            // Signal 0 checks if process exists without actually sending a signal
            kill(Pid::from_raw(pid as i32), None).is_ok()
        }

        #[cfg(windows)]
        {
            use std::process::Command;

            let output = Command::new("tasklist")
                .args(["/FI", &format!("PID eq {}", pid), "/NH"])
                .output();

            if let Ok(output) = output {
                let output_str = String::from_utf8_lossy(&output.stdout);
                output_str.contains(&pid.to_string())
            } else {
                false
            }
        }
    }
}

/// Read a pipe to EOF into a shared buffer, so a partial capture survives
/// an abandoned drain
fn spawn_drain<R>(pipe: Option<R>, buffer: OutputBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!(error = %e, "Output pipe read failed");
                    break;
                }
            }
        }
    })
}

fn take_output(buffer: &OutputBuffer) -> String {
    let bytes = std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Publishes the pid in the caller's slot until the process is reaped
struct SlotGuard<'a> {
    slot: Option<&'a ProcessSlot>,
}

impl<'a> SlotGuard<'a> {
    fn publish(slot: Option<&'a ProcessSlot>, pid: Option<u32>) -> Self {
        if let (Some(slot), Some(pid)) = (slot, pid) {
            slot.set(pid);
        }
        Self { slot }
    }

    fn release(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.clear();
        }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Terminates the child if the execution future is dropped before the
/// process was reaped: SIGTERM at once, SIGKILL after the grace period.
struct TerminationGuard {
    pid: Option<u32>,
    grace: Duration,
}

impl TerminationGuard {
    fn new(pid: Option<u32>, grace: Duration) -> Self {
        Self { pid, grace }
    }

    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for TerminationGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid.take() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let target = Pid::from_raw(pid as i32);
            warn!(pid = %pid, "Execution abandoned, terminating process");
            if kill(target, Signal::SIGTERM).is_err() {
                return;
            }
            let grace = self.grace;
            // Drop cannot await; the ladder finishes on its own thread
            let spawned = std::thread::Builder::new()
                .name("ois-reaper".to_string())
                .spawn(move || {
                    let deadline = std::time::Instant::now() + grace;
                    while std::time::Instant::now() < deadline {
                        if kill(target, None).is_err() {
                            return;
                        }
                        std::thread::sleep(TERMINATION_POLL_INTERVAL);
                    }
                    let _ = kill(target, Signal::SIGKILL);
                });
            if spawned.is_err() {
                let _ = kill(target, Signal::SIGKILL);
            }
        }
    }
}

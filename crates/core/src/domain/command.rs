// External command description and captured outcome

use crate::application::task::constants::{DEFAULT_COMMAND_TIMEOUT, TIMEOUT_EXIT_CODE};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Immutable description of one external command invocation.
///
/// `executable` may be an absolute path, a bare name to resolve against the
/// platform search directories, or empty. Empty means no explicit executable:
/// the first argument is the program and the rest are its arguments.
#[derive(Clone)]
pub struct CommandSpec {
    executable: String,
    args: Vec<String>,
    credentials: Vec<String>,
    working_dir: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
    timeout: Duration,
}

impl CommandSpec {
    pub fn builder(executable: impl Into<String>) -> CommandSpecBuilder {
        CommandSpecBuilder {
            spec: CommandSpec {
                executable: executable.into(),
                args: Vec::new(),
                credentials: Vec::new(),
                working_dir: None,
                env: None,
                timeout: DEFAULT_COMMAND_TIMEOUT,
            },
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Trailing arguments appended after `args`; never logged
    pub fn credentials(&self) -> &[String] {
        &self.credentials
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Environment overlay. `None` means the inherited environment is used as is.
    pub fn env(&self) -> Option<&HashMap<String, String>> {
        self.env.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Command line without credentials, safe for logs and error messages
    pub fn display_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        if !self.executable.trim().is_empty() {
            parts.push(self.executable.as_str());
        }
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }
}

// Credentials must never reach a Debug dump
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("executable", &self.executable)
            .field("args", &self.args)
            .field("credentials", &format!("[{} hidden]", self.credentials.len()))
            .field("working_dir", &self.working_dir)
            .field("env", &self.env.as_ref().map(|env| env.len()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for [`CommandSpec`]
pub struct CommandSpecBuilder {
    spec: CommandSpec,
}

impl CommandSpecBuilder {
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.spec.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn credentials<I, S>(mut self, credentials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec
            .credentials
            .extend(credentials.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.working_dir = Some(dir.into());
        self
    }

    /// Provide an environment overlay (possibly empty)
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.spec.env = Some(env);
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec
            .env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = timeout;
        self
    }

    pub fn build(self) -> CommandSpec {
        self.spec
    }
}

/// Fully captured outcome of one command
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub pid: Option<u32>,
    pub duration_ms: i64,
}

impl ProcessResult {
    pub fn is_ok(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Mark the result as forcibly terminated after a timeout
    pub fn mark_timed_out(&mut self, command_line: &str) {
        if !self.stderr.is_empty() && !self.stderr.ends_with('\n') {
            self.stderr.push('\n');
        }
        self.stderr.push_str(&format!(
            "Process '{}' had been terminated forcibly after timeout.",
            command_line
        ));
        self.exit_code = TIMEOUT_EXIT_CODE;
        self.timed_out = true;
    }
}

/// The process currently running for one operation category.
///
/// Written only by the flight that owns the category, so a plain atomic is
/// enough; readers (a stop request) only ever see a pid or nothing.
#[derive(Debug, Default)]
pub struct ProcessSlot {
    pid: AtomicU32,
}

impl ProcessSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, pid: u32) {
        self.pid.store(pid, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.pid.store(0, Ordering::SeqCst);
    }

    pub fn current(&self) -> Option<u32> {
        match self.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }
}

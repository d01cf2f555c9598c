// Platform-specific command formatting
// Unix: /bin/sh -c "<line>", Windows: cmd /c <token> <args...>

use std::path::PathBuf;
use workbench_core::port::ExecutionError;

/// Operating system family the command line is shaped for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPlatform {
    Unix,
    Windows,
}

impl TargetPlatform {
    pub fn detect() -> Self {
        if cfg!(windows) {
            TargetPlatform::Windows
        } else {
            TargetPlatform::Unix
        }
    }

    pub fn formatter(&self) -> &'static dyn CommandFormatter {
        match self {
            TargetPlatform::Unix => &UnixFormatter,
            TargetPlatform::Windows => &WindowsFormatter,
        }
    }

    /// Name of the path-list variable
    pub fn path_var(&self) -> &'static str {
        match self {
            TargetPlatform::Unix => "PATH",
            TargetPlatform::Windows => "Path",
        }
    }

    pub fn path_separator(&self) -> char {
        match self {
            TargetPlatform::Unix => ':',
            TargetPlatform::Windows => ';',
        }
    }
}

/// Program and arguments ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Directory to put first on the path list before spawning
    pub path_prefix: Option<PathBuf>,
    /// Command line for logs, credentials left out
    pub display: String,
}

/// Shapes a resolved executable plus arguments into a spawnable command
pub trait CommandFormatter: Send + Sync {
    fn format(
        &self,
        executable: &str,
        args: &[String],
        credentials: &[String],
    ) -> Result<FormattedCommand, ExecutionError>;
}

/// Format `executable args credentials` for `platform`.
///
/// A blank executable skips the shell: the first argument is the program.
pub fn format_command(
    platform: TargetPlatform,
    executable: &str,
    args: &[String],
    credentials: &[String],
) -> Result<FormattedCommand, ExecutionError> {
    if !executable.trim().is_empty() {
        return platform.formatter().format(executable, args, credentials);
    }

    let (program, rest) = args
        .split_first()
        .ok_or_else(|| ExecutionError::InvalidCommand("no executable and no arguments".to_string()))?;
    Ok(FormattedCommand {
        program: program.clone(),
        args: rest.iter().chain(credentials).cloned().collect(),
        path_prefix: None,
        display: args.join(" "),
    })
}

pub struct UnixFormatter;

impl CommandFormatter for UnixFormatter {
    fn format(
        &self,
        executable: &str,
        args: &[String],
        credentials: &[String],
    ) -> Result<FormattedCommand, ExecutionError> {
        let head = executable.replace(' ', "\\ ");
        let visible = join_line(&head, args, &[]);
        Ok(FormattedCommand {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), join_line(&head, args, credentials)],
            path_prefix: None,
            display: visible,
        })
    }
}

pub struct WindowsFormatter;

impl CommandFormatter for WindowsFormatter {
    fn format(
        &self,
        executable: &str,
        args: &[String],
        credentials: &[String],
    ) -> Result<FormattedCommand, ExecutionError> {
        // cmd splits an unquoted path at spaces; run the bare file name
        // from a directory put first on Path instead
        let (token, path_prefix) = if is_windows_absolute(executable) {
            let (dir, file) = split_windows_path(executable);
            (file.to_string(), Some(PathBuf::from(dir)))
        } else {
            (executable.replace(' ', "^ "), None)
        };

        let mut full = vec!["/c".to_string(), token.clone()];
        full.extend(args.iter().cloned());
        full.extend(credentials.iter().cloned());

        Ok(FormattedCommand {
            program: "cmd".to_string(),
            args: full,
            path_prefix,
            display: format!("cmd /c {}", join_line(&token, args, &[])),
        })
    }
}

fn join_line(head: &str, args: &[String], credentials: &[String]) -> String {
    std::iter::once(head)
        .chain(args.iter().map(String::as_str))
        .chain(credentials.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `C:\..`, `C:/..` or a UNC path. Checked by hand so Unix hosts format
/// Windows commands the same way.
fn is_windows_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    let drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/');
    drive || path.starts_with("\\\\")
}

fn split_windows_path(path: &str) -> (&str, &str) {
    match path.rfind(['\\', '/']) {
        Some(index) => (&path[..index], &path[index + 1..]),
        None => ("", path),
    }
}

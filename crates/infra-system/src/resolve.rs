// Executable resolution against the platform search directories
use crate::platform::TargetPlatform;
use std::path::{Path, PathBuf};
use workbench_core::port::ExecutionError;

const UNIX_SEARCH_DIRS: [&str; 4] = ["/usr/bin", "/bin", "/usr/local/bin", "/sbin"];

/// Finds the file behind an executable reference
#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    platform: TargetPlatform,
    search_dirs: Vec<PathBuf>,
}

impl ExecutableResolver {
    /// Unix: fixed system directories. Windows: the entries of `Path`.
    pub fn for_platform(platform: TargetPlatform) -> Self {
        let search_dirs = match platform {
            TargetPlatform::Unix => UNIX_SEARCH_DIRS.into_iter().map(PathBuf::from).collect(),
            TargetPlatform::Windows => std::env::var("Path")
                .or_else(|_| std::env::var("PATH"))
                .map(|path| {
                    path.split(';')
                        .filter(|entry| !entry.is_empty())
                        .map(PathBuf::from)
                        .collect()
                })
                .unwrap_or_default(),
        };
        Self {
            platform,
            search_dirs,
        }
    }

    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Resolve `executable`.
    ///
    /// Blank stays blank (no explicit executable). An existing file path is
    /// used verbatim. Otherwise the first search directory holding the name
    /// (or, on Windows, `<name>.bat`) wins.
    pub fn resolve(&self, executable: &str) -> Result<String, ExecutionError> {
        if executable.trim().is_empty() {
            return Ok(String::new());
        }
        if is_executable_file(Path::new(executable)) {
            return Ok(executable.to_string());
        }

        for dir in &self.search_dirs {
            let candidate = dir.join(executable);
            if is_executable_file(&candidate) {
                return Ok(candidate.to_string_lossy().into_owned());
            }
            if self.platform == TargetPlatform::Windows {
                let candidate = dir.join(format!("{}.bat", executable));
                if is_executable_file(&candidate) {
                    return Ok(candidate.to_string_lossy().into_owned());
                }
            }
        }

        Err(ExecutionError::NotFound(executable.to_string()))
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_blank_stays_blank() {
        let resolver = ExecutableResolver::for_platform(TargetPlatform::Unix);
        assert_eq!(resolver.resolve("  ").unwrap(), "");
    }

    #[test]
    fn test_unknown_name_not_found() {
        let resolver = ExecutableResolver::for_platform(TargetPlatform::Unix);
        let err = resolver.resolve("definitely-not-a-real-tool-4242").unwrap_err();
        assert!(matches!(err, ExecutionError::NotFound(name) if name == "definitely-not-a-real-tool-4242"));
    }

    #[cfg(unix)]
    #[test]
    fn test_first_search_dir_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        make_executable(&first.path().join("tool"));
        make_executable(&second.path().join("tool"));

        let resolver = ExecutableResolver::for_platform(TargetPlatform::Unix)
            .with_search_dirs(vec![first.path().to_path_buf(), second.path().to_path_buf()]);

        assert_eq!(
            resolver.resolve("tool").unwrap(),
            first.path().join("tool").to_string_lossy()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_path_used_verbatim() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("gradlew");
        make_executable(&script);
        let script = script.to_string_lossy().into_owned();

        let resolver = ExecutableResolver::for_platform(TargetPlatform::Unix).with_search_dirs(vec![]);

        assert_eq!(resolver.resolve(&script).unwrap(), script);
    }

    #[cfg(unix)]
    #[test]
    fn test_windows_bat_variant() {
        let dir = TempDir::new().unwrap();
        make_executable(&dir.path().join("gradle.bat"));

        let resolver = ExecutableResolver::for_platform(TargetPlatform::Windows)
            .with_search_dirs(vec![dir.path().to_path_buf()]);

        assert!(resolver.resolve("gradle").unwrap().ends_with("gradle.bat"));
    }
}

// Lifecycle constants (no magic values)
use std::time::Duration;

/// Default upper bound for one external command (120 minutes)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120 * 60);

/// How long output draining may lag behind process exit (30 seconds)
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(30);

/// Graceful termination window between SIGTERM and SIGKILL (30 seconds)
pub const TERMINATION_GRACE: Duration = Duration::from_secs(30);

/// Poll interval while waiting for a signalled process to exit
pub const TERMINATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Synthetic exit code of a command terminated after its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Workbench home directory name under the user home
pub const WORKBENCH_DIR_NAME: &str = ".ois-idea-plugin";

pub const DEFAULT_PLUGIN_REPO_URL: &str = "https://github.com/attiasas/ois-gradle-plugin.git";
pub const DEFAULT_CORE_REPO_URL: &str = "https://github.com/attiasas/ois-core.git";

/// Dependency refresh checkpoints
pub mod checkpoints {
    pub const RESOLVE_PLUGIN: f64 = 0.0;
    pub const DOWNLOAD_PLUGIN: f64 = 0.175;
    pub const RESOLVE_CORE: f64 = 0.35;
    pub const DOWNLOAD_CORE: f64 = 0.525;
    pub const INSTALL_PLUGIN: f64 = 0.7;
    pub const INSTALL_CORE: f64 = 0.875;
}

//! Configuration from environment variables
//!
//! - `OIS_USER_HOME`: user home holding `.m2/repository` (default: the OS home dir)
//! - `OIS_HOME`: workbench home and download cache (default: `~/.ois-idea-plugin`)
//! - `OIS_COMMAND_TIMEOUT_MINS`: upper bound for one external command (default: 120)
//! - `OIS_PLUGIN_REPO`, `OIS_CORE_REPO`: repository URLs to clone from

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use workbench_core::WorkbenchConfig;

pub fn load() -> Result<WorkbenchConfig> {
    load_with(|key| std::env::var(key).ok())
}

/// Build the configuration from `lookup` (the process environment in production)
pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<WorkbenchConfig> {
    let user_home = match lookup("OIS_USER_HOME") {
        Some(dir) => expand(&dir),
        None => directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .context("Cannot determine the user home directory; set OIS_USER_HOME")?,
    };

    let mut config = WorkbenchConfig::new(user_home);

    if let Some(home) = lookup("OIS_HOME") {
        config = config.with_home_dir(expand(&home));
    }

    if let Some(minutes) = lookup("OIS_COMMAND_TIMEOUT_MINS") {
        let minutes: u64 = minutes
            .trim()
            .parse()
            .with_context(|| format!("OIS_COMMAND_TIMEOUT_MINS is not a number: {}", minutes))?;
        let secs = minutes
            .checked_mul(60)
            .with_context(|| format!("OIS_COMMAND_TIMEOUT_MINS is too large: {}", minutes))?;
        config = config.with_command_timeout(Duration::from_secs(secs));
    }

    let plugin = lookup("OIS_PLUGIN_REPO").unwrap_or_else(|| config.plugin_repo_url.clone());
    let core = lookup("OIS_CORE_REPO").unwrap_or_else(|| config.core_repo_url.clone());
    Ok(config.with_repo_urls(plugin, core))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

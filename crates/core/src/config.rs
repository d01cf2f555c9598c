// Workbench configuration
// Built by the composition root (env vars in the CLI), passed down by reference.

use crate::application::task::constants::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_CORE_REPO_URL, DEFAULT_PLUGIN_REPO_URL, WORKBENCH_DIR_NAME,
};
use crate::domain::DependencyKind;
use std::path::PathBuf;
use std::time::Duration;

/// Paths and external locations shared by every project context
#[derive(Debug, Clone)]
pub struct WorkbenchConfig {
    /// Workbench home (`~/.ois-idea-plugin` by default), holds the download cache
    pub home_dir: PathBuf,
    /// User home, root of the local package registry (`.m2/repository`)
    pub user_home: PathBuf,
    pub plugin_repo_url: String,
    pub core_repo_url: String,
    /// Upper bound for every external command started by a workflow
    pub command_timeout: Duration,
}

impl WorkbenchConfig {
    /// Defaults rooted at the given user home
    pub fn new(user_home: impl Into<PathBuf>) -> Self {
        let user_home = user_home.into();
        Self {
            home_dir: user_home.join(WORKBENCH_DIR_NAME),
            user_home,
            plugin_repo_url: DEFAULT_PLUGIN_REPO_URL.to_string(),
            core_repo_url: DEFAULT_CORE_REPO_URL.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_home_dir(mut self, home_dir: impl Into<PathBuf>) -> Self {
        self.home_dir = home_dir.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_repo_urls(mut self, plugin: impl Into<String>, core: impl Into<String>) -> Self {
        self.plugin_repo_url = plugin.into();
        self.core_repo_url = core.into();
        self
    }

    pub fn repo_url(&self, kind: DependencyKind) -> &str {
        match kind {
            DependencyKind::Plugin => &self.plugin_repo_url,
            DependencyKind::Core => &self.core_repo_url,
        }
    }

    /// `<home>/dependencies`
    pub fn dependencies_dir(&self) -> PathBuf {
        self.home_dir.join("dependencies")
    }

    /// `<user-home>/.m2/repository`
    pub fn registry_root(&self) -> PathBuf {
        self.user_home.join(".m2").join("repository")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_rooted_at_user_home() {
        let config = WorkbenchConfig::new("/home/dev");

        assert_eq!(config.home_dir, PathBuf::from("/home/dev/.ois-idea-plugin"));
        assert_eq!(
            config.dependencies_dir(),
            PathBuf::from("/home/dev/.ois-idea-plugin/dependencies")
        );
        assert_eq!(config.registry_root(), PathBuf::from("/home/dev/.m2/repository"));
        assert_eq!(config.command_timeout, Duration::from_secs(120 * 60));
    }

    #[test]
    fn test_repo_url_per_kind() {
        let config = WorkbenchConfig::new("/u").with_repo_urls("file:///p.git", "file:///c.git");

        assert_eq!(config.repo_url(DependencyKind::Plugin), "file:///p.git");
        assert_eq!(config.repo_url(DependencyKind::Core), "file:///c.git");
    }
}

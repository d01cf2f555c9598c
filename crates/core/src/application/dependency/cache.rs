// Dependency Cache - existence queries only, contents never validated

use crate::config::WorkbenchConfig;
use crate::domain::{DependencyKind, Version};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct DependencyCache {
    config: Arc<WorkbenchConfig>,
}

impl DependencyCache {
    pub fn new(config: Arc<WorkbenchConfig>) -> Self {
        Self { config }
    }

    /// `<home>/dependencies/<kind>/<version>`
    pub fn version_dir(&self, kind: DependencyKind, version: &Version) -> PathBuf {
        self.config
            .dependencies_dir()
            .join(kind.dir_name())
            .join(version.as_str())
    }

    /// `<home>/dependencies/<kind>/<version>/<repo-name>`
    pub fn checkout_dir(&self, kind: DependencyKind, version: &Version) -> PathBuf {
        self.version_dir(kind, version).join(kind.repo_name())
    }

    /// True iff the checkout directory exists, even when empty
    pub fn exists_locally(&self, kind: DependencyKind, version: &Version) -> bool {
        self.checkout_dir(kind, version).is_dir()
    }

    /// `<user-home>/.m2/repository/<locator split on '.'>`
    pub fn registry_path(&self, kind: DependencyKind) -> PathBuf {
        kind.registry_locator()
            .split('.')
            .fold(self.config.registry_root(), |path, segment| path.join(segment))
    }

    /// True iff the published package directory exists in the local registry
    pub fn exists_in_registry(&self, kind: DependencyKind) -> bool {
        self.registry_path(kind).is_dir()
    }
}

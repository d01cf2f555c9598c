// Version Resolver - pattern extraction from the project descriptor and the plugin checkout

use crate::config::WorkbenchConfig;
use crate::domain::{DependencyKind, Version};
use crate::error::Result;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

/// Project descriptor file name
pub const DESCRIPTOR_FILE: &str = "build.gradle";

static PLUGIN_VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"id\s+['"]org\.ois\.simulation['"]\s+version\s+['"]([^'"]+)['"]"#)
        .expect("plugin version pattern is valid")
});

static CORE_VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"OIS_CORE_VERSION\s*=\s*new Version\("([^"]+)"\);"#)
        .expect("core version pattern is valid")
});

/// Extracts the versions a project needs. Never fails on a missing file or
/// a missing declaration: both are `None`, logged as a warning.
#[derive(Clone)]
pub struct VersionResolver {
    config: Arc<WorkbenchConfig>,
}

impl VersionResolver {
    pub fn new(config: Arc<WorkbenchConfig>) -> Self {
        Self { config }
    }

    /// Plugin version declared in `<project>/build.gradle`
    pub fn resolve_plugin_version(&self, project_dir: &Path) -> Result<Option<Version>> {
        let descriptor = project_dir.join(DESCRIPTOR_FILE);
        self.extract(&descriptor, &PLUGIN_VERSION_PATTERN, "plugin")
    }

    /// Core version the given plugin release is pinned to
    pub fn resolve_core_version(&self, plugin: &Version) -> Result<Option<Version>> {
        let source = self.core_version_source(plugin);
        self.extract(&source, &CORE_VERSION_PATTERN, "core")
    }

    /// `<home>/dependencies/plugin/<v>/ois-gradle-plugin/src/main/java/org/ois/plugin/Const.java`
    pub fn core_version_source(&self, plugin: &Version) -> PathBuf {
        self.config
            .dependencies_dir()
            .join(DependencyKind::Plugin.dir_name())
            .join(plugin.as_str())
            .join(DependencyKind::Plugin.repo_name())
            .join("src/main/java/org/ois/plugin/Const.java")
    }

    fn extract(&self, file: &Path, pattern: &Regex, what: &str) -> Result<Option<Version>> {
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(file = %file.display(), "Can't find {} version source", what);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let token = pattern
            .captures(&content)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str());

        match token.map(Version::new) {
            Some(Ok(version)) => {
                debug!(file = %file.display(), version = %version, "Resolved {} version", what);
                Ok(Some(version))
            }
            _ => {
                warn!(file = %file.display(), "No {} version declared", what);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(home: &Path) -> VersionResolver {
        VersionResolver::new(Arc::new(
            WorkbenchConfig::new(home).with_home_dir(home.join("ois")),
        ))
    }

    #[test]
    fn test_plugin_version_from_descriptor() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("build.gradle"),
            "plugins {\n    id 'java'\n    id 'org.ois.simulation' version '1.2.3'\n}\n",
        )
        .unwrap();

        let version = resolver(tmp.path())
            .resolve_plugin_version(tmp.path())
            .unwrap();

        assert_eq!(version, Some(Version::new("1.2.3").unwrap()));
    }

    #[test]
    fn test_double_quoted_declaration() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("build.gradle"),
            r#"id "org.ois.simulation" version "0.1-SNAPSHOT""#,
        )
        .unwrap();

        let version = resolver(tmp.path())
            .resolve_plugin_version(tmp.path())
            .unwrap();

        assert_eq!(version.unwrap().as_str(), "0.1-SNAPSHOT");
    }

    #[test]
    fn test_no_declaration_is_none() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("build.gradle"), "plugins { id 'java' }\n").unwrap();

        let version = resolver(tmp.path())
            .resolve_plugin_version(tmp.path())
            .unwrap();

        assert!(version.is_none());
    }

    #[test]
    fn test_missing_descriptor_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(resolver(tmp.path())
            .resolve_plugin_version(tmp.path())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_core_version_from_plugin_checkout() {
        let tmp = TempDir::new().unwrap();
        let resolver = resolver(tmp.path());
        let plugin = Version::new("1.2.3").unwrap();

        let source = resolver.core_version_source(&plugin);
        assert!(source.ends_with(
            "dependencies/plugin/1.2.3/ois-gradle-plugin/src/main/java/org/ois/plugin/Const.java"
        ));

        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(
            &source,
            "public class Const {\n    public static final Version OIS_CORE_VERSION = new Version(\"0.4.0\");\n}\n",
        )
        .unwrap();

        assert_eq!(
            resolver.resolve_core_version(&plugin).unwrap(),
            Some(Version::new("0.4.0").unwrap())
        );
    }
}

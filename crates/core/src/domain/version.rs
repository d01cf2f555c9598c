// Dependency versions and per-project resolution state

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque version token.
///
/// No ordering semantics: two versions are the same iff their strings are
/// identical. An empty (or whitespace-only) token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

impl Version {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(DomainError::InvalidVersion(token));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Version {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Version {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.0
    }
}

/// The two chained external dependencies of a simulation project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Plugin,
    Core,
}

impl DependencyKind {
    /// Directory name under `<home>/dependencies`
    pub fn dir_name(&self) -> &'static str {
        match self {
            DependencyKind::Plugin => "plugin",
            DependencyKind::Core => "core",
        }
    }

    /// Checkout directory name inside a version directory
    pub fn repo_name(&self) -> &'static str {
        match self {
            DependencyKind::Plugin => "ois-gradle-plugin",
            DependencyKind::Core => "ois-core",
        }
    }

    /// Dotted locator of the published package in the local registry
    pub fn registry_locator(&self) -> &'static str {
        match self {
            DependencyKind::Plugin => "org.ois.open-interactive-simulation",
            DependencyKind::Core => "org.ois.open-interactive-simulation-core",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Resolved dependency versions of one project.
///
/// Replaced as a whole once a refresh resolved both versions; never
/// updated field by field while a refresh is in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyState {
    pub plugin: Option<Version>,
    pub core: Option<Version>,
}

impl DependencyState {
    pub fn resolved(plugin: Version, core: Version) -> Self {
        Self {
            plugin: Some(plugin),
            core: Some(core),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.plugin.is_some() && self.core.is_some()
    }

    pub fn version(&self, kind: DependencyKind) -> Option<&Version> {
        match kind {
            DependencyKind::Plugin => self.plugin.as_ref(),
            DependencyKind::Core => self.core.as_ref(),
        }
    }
}

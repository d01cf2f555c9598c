// Dependency Orchestrator - resolve, download and install the plugin and core
//
// Pipeline (progress checkpoints in `constants::checkpoints`):
//   resolve plugin -> download plugin -> resolve core -> download core
//   -> install plugin -> install core -> publish DependencyState

pub mod cache;
pub mod resolver;

pub use cache::DependencyCache;
pub use resolver::VersionResolver;

use crate::application::build_tool::BuildTool;
use crate::application::task::constants::checkpoints;
use crate::application::task::{Completion, ProgressReporter};
use crate::application::vcs::Vcs;
use crate::config::WorkbenchConfig;
use crate::domain::{DependencyKind, DependencyState, Version};
use crate::error::Result;
use crate::port::CommandRunner;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Keeps one project's dependencies resolved, downloaded and installed.
///
/// Cheap to clone; clones share the same `DependencyState`.
#[derive(Clone)]
pub struct DependencyOrchestrator {
    project_dir: PathBuf,
    config: Arc<WorkbenchConfig>,
    resolver: VersionResolver,
    cache: DependencyCache,
    vcs: Vcs,
    build_tool: BuildTool,
    state: Arc<RwLock<DependencyState>>,
}

impl DependencyOrchestrator {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        config: Arc<WorkbenchConfig>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            resolver: VersionResolver::new(Arc::clone(&config)),
            cache: DependencyCache::new(Arc::clone(&config)),
            vcs: Vcs::new(Arc::clone(&runner), Arc::clone(&config)),
            build_tool: BuildTool::new(runner, Arc::clone(&config)),
            config,
            state: Arc::new(RwLock::new(DependencyState::default())),
        }
    }

    /// Snapshot of the last completed resolution
    pub fn state(&self) -> DependencyState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Versions as currently declared on disk, without downloading anything.
    /// The core version is only found once the plugin checkout exists.
    pub fn resolve_versions(&self) -> Result<DependencyState> {
        let plugin = self.resolver.resolve_plugin_version(&self.project_dir)?;
        let core = match &plugin {
            Some(plugin) => self.resolver.resolve_core_version(plugin)?,
            None => None,
        };
        Ok(DependencyState { plugin, core })
    }

    pub fn cache(&self) -> &DependencyCache {
        &self.cache
    }

    /// Run the whole refresh pipeline. Meant to be the body of a
    /// dependency-refresh flight; every progress report is a cancellation
    /// checkpoint.
    ///
    /// A version that cannot be resolved is a soft abort
    /// (`Completion::Aborted`), never an error. The shared state is only
    /// replaced once every phase succeeded.
    pub async fn run_pipeline(&self, force_install: bool, progress: &ProgressReporter) -> Result<Completion> {
        progress.state("Resolving OIS plugin version", checkpoints::RESOLVE_PLUGIN)?;
        let Some(plugin) = self.resolver.resolve_plugin_version(&self.project_dir)? else {
            return Ok(self.abort("Can't resolve OIS plugin version"));
        };

        progress.state(
            format!("Downloading OIS plugin {}", plugin),
            checkpoints::DOWNLOAD_PLUGIN,
        )?;
        self.download_if_missing(DependencyKind::Plugin, &plugin).await?;

        progress.state("Resolving OIS core version", checkpoints::RESOLVE_CORE)?;
        let Some(core) = self.resolver.resolve_core_version(&plugin)? else {
            return Ok(self.abort("Can't resolve OIS core version"));
        };

        progress.state(
            format!("Downloading OIS core {}", core),
            checkpoints::DOWNLOAD_CORE,
        )?;
        self.download_if_missing(DependencyKind::Core, &core).await?;

        progress.state("Installing OIS plugin", checkpoints::INSTALL_PLUGIN)?;
        self.install_if_needed(DependencyKind::Plugin, &plugin, force_install)
            .await?;

        progress.state("Installing OIS core", checkpoints::INSTALL_CORE)?;
        self.install_if_needed(DependencyKind::Core, &core, force_install)
            .await?;

        info!(plugin = %plugin, core = %core, "OIS dependencies are up to date");
        *self.state.write().unwrap_or_else(PoisonError::into_inner) =
            DependencyState::resolved(plugin, core);
        Ok(Completion::Done)
    }

    fn abort(&self, reason: &str) -> Completion {
        warn!(project = %self.project_dir.display(), "Can't update OIS dependencies: {}", reason);
        Completion::Aborted(reason.to_string())
    }

    /// Clone `kind` at `version` unless its checkout directory already exists.
    ///
    /// When the exact-version clone fails for any reason, the default branch
    /// is cloned instead; only a failure of that second clone is an error.
    pub async fn download_if_missing(&self, kind: DependencyKind, version: &Version) -> Result<bool> {
        if self.cache.exists_locally(kind, version) {
            info!(kind = %kind, version = %version, "Found in download cache");
            return Ok(false);
        }

        let version_dir = self.cache.version_dir(kind, version);
        tokio::fs::create_dir_all(&version_dir).await?;
        let dest = self.cache.checkout_dir(kind, version);
        let url = self.config.repo_url(kind);

        if let Err(e) = self.vcs.clone_at(url, version, &dest).await {
            warn!(
                kind = %kind,
                version = %version,
                error = %e,
                "Can't clone version, falling back to the default branch"
            );
            // git refuses a non-empty destination
            if dest.exists() {
                tokio::fs::remove_dir_all(&dest).await?;
            }
            self.vcs.clone_default(url, &dest).await?;
        }

        info!(kind = %kind, version = %version, dest = %dest.display(), "Downloaded");
        Ok(true)
    }

    /// Publish the checkout to the local registry when forced or absent there
    pub async fn install_if_needed(
        &self,
        kind: DependencyKind,
        version: &Version,
        force: bool,
    ) -> Result<bool> {
        if !force && self.cache.exists_in_registry(kind) {
            info!(kind = %kind, "Already installed in local registry");
            return Ok(false);
        }

        let checkout = self.cache.checkout_dir(kind, version);
        self.build_tool.install(&checkout).await?;
        info!(kind = %kind, version = %version, "Installed to local registry");
        Ok(true)
    }
}

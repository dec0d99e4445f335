//! One complete setup run, from raw inputs to a tool on `PATH`.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::Result;
use crate::actions::{Diagnostics, RunnerFiles};
use crate::cache::CacheStore;
use crate::config::{ReleaseConfigBuilder, ToolIdentity};
use crate::download::Downloader;
use crate::extract::Extractor;
use crate::github::AssetLocator;
use crate::inputs::{InputSource, Inputs, github_token_for_latest};
use crate::orchestrator::{CacheOrchestrator, OrchestratorOptions};
use crate::platform::PlatformContext;

/// Name of the step output holding the installed directory.
pub const DIRECTORY_OUTPUT: &str = "directory";

/// Everything a run talks to besides its inputs.
pub struct Collaborators<'a> {
    /// Tool cache
    pub cache: &'a dyn CacheStore,
    /// Fetches downloads
    pub downloader: &'a dyn Downloader,
    /// Unpacks archives
    pub extractor: &'a dyn Extractor,
    /// Release-asset and latest-version lookups
    pub locator: &'a AssetLocator,
    /// Progress reporting
    pub diagnostics: &'a dyn Diagnostics,
    /// Step output and `PATH` files
    pub runner_files: &'a RunnerFiles,
    /// Parent of per-run work directories.
    pub temp_dir: PathBuf,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOutcome {
    /// Installed directory, as managed by the cache.
    pub dir: PathBuf,
    /// What was installed
    pub tool: ToolIdentity,
}

/// Resolve inputs, find or fetch the tool, and publish its directory.
pub async fn run(
    ctx: &PlatformContext,
    source: &dyn InputSource,
    collaborators: &Collaborators<'_>,
) -> Result<SetupOutcome> {
    let diagnostics = collaborators.diagnostics;

    let inputs = Inputs::from_source(ctx, source)?;
    debug!(name = %inputs.name, version = %inputs.version, platform = %ctx, "Resolved inputs");

    let mut builder = ReleaseConfigBuilder::new(&inputs);
    // Reject unknown extensions before any network access
    builder.archive_mode()?;

    if builder.wants_latest() {
        let token = github_token_for_latest(source)?;
        let lookup_url = builder.latest_lookup_url();
        let version = collaborators
            .locator
            .resolve_latest_version(&lookup_url, &token, diagnostics)
            .await?;
        builder = builder.with_version(version);
    }

    let config = builder.build()?;
    info!(tool = %config.tool, url = %config.archive.url, "Setting up tool");

    let options = OrchestratorOptions {
        temp_dir: collaborators.temp_dir.clone(),
        platform: *ctx,
    };
    let orchestrator = CacheOrchestrator {
        cache: collaborators.cache,
        downloader: collaborators.downloader,
        extractor: collaborators.extractor,
        locator: collaborators.locator,
        diagnostics,
        options: &options,
    };
    let dir = orchestrator.find_or_fetch(&config).await?;

    collaborators
        .runner_files
        .set_output(DIRECTORY_OUTPUT, &dir.to_string_lossy())?;
    collaborators.runner_files.add_path(&dir)?;

    diagnostics.info(&format!(
        "{} {} is now set up at {}",
        config.tool.name,
        config.tool.version,
        dir.display()
    ));

    Ok(SetupOutcome {
        dir,
        tool: config.tool,
    })
}

//! Install a released tool binary into a versioned cache and put it on `PATH`.
//!
//! This crate provides functionality to:
//! - Resolve platform/arch-cascaded inputs (`url-linux-x64`, `url-x64`, `url-linux`, `url`)
//! - Interpolate `{name}`-style templates without evaluating anything
//! - Resolve private GitHub release assets and latest release versions
//! - Download, unpack and register a tool under `(name, version, arch)`
//!
//! Every host capability (inputs, logging, cache, network) is passed in
//! explicitly, so the whole run can be driven by test doubles.
//!
//! # Example
//!
//! ```ignore
//! use setup_tool_core::{Collaborators, PlatformContext, ActionsInputs, run};
//!
//! let ctx = PlatformContext::current()?;
//! let outcome = run(&ctx, &ActionsInputs, &collaborators).await?;
//! println!("installed at {}", outcome.dir.display());
//! ```

pub mod actions;
pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod github;
pub mod inputs;
pub mod interpolate;
pub mod orchestrator;
pub mod platform;
pub mod setup;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use actions::{
    ActionsInputs, Diagnostics, RunnerFiles, TracingDiagnostics, WorkflowCommands, set_failed,
};
pub use cache::{CacheStore, ToolCache};
pub use config::{
    ArchiveConfig, ArchiveMode, ExtractionKind, ReleaseConfig, ReleaseConfigBuilder, ToolIdentity,
};
pub use download::{Downloader, HttpDownloader};
pub use error::{Error, Result};
pub use extract::{ArchiveExtractor, Extractor, install_raw};
pub use github::{
    AssetLocator, GitHubClient, Release, ReleaseAsset, ReleaseAssetRef, ReleaseRegistry,
    ResolvedDownload,
};
pub use inputs::{InputMode, InputSource, Inputs, LayeredInputs, MapInputs};
pub use interpolate::{Variables, interpolate};
pub use orchestrator::{CacheOrchestrator, OrchestratorOptions, Stage};
pub use platform::{HostArch, HostPlatform, PlatformContext};
pub use setup::{Collaborators, SetupOutcome, run};

//! Find-or-fetch: return a cached tool, or download, unpack and register it.

use std::fmt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::Result;
use crate::actions::Diagnostics;
use crate::cache::CacheStore;
use crate::config::{ArchiveMode, ReleaseConfig};
use crate::download::Downloader;
use crate::extract::{Extractor, install_raw};
use crate::github::{AssetLocator, ResolvedDownload};
use crate::platform::PlatformContext;

/// Orchestration progress, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Looking the tool up in the cache
    Checking,
    /// Found in the cache
    HitCached,
    /// Fetching the download
    Downloading,
    /// Unpacking the archive
    Extracting,
    /// Installing the download as the executable
    RawInstalling,
    /// Copying into the cache
    Registering,
    /// Fetched and registered
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Checking => "checking",
            Self::HitCached => "hit-cached",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::RawInstalling => "raw-installing",
            Self::Registering => "registering",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Host-specific settings for an orchestration.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Parent of per-run work directories.
    pub temp_dir: PathBuf,
    /// Platform used to name raw executables
    pub platform: PlatformContext,
}

/// Drives one tool through the cache, download and unpack stages.
pub struct CacheOrchestrator<'a> {
    /// Tool cache
    pub cache: &'a dyn CacheStore,
    /// Fetches downloads
    pub downloader: &'a dyn Downloader,
    /// Unpacks archives
    pub extractor: &'a dyn Extractor,
    /// Resolves private release assets
    pub locator: &'a AssetLocator,
    /// Progress reporting
    pub diagnostics: &'a dyn Diagnostics,
    /// Host settings
    pub options: &'a OrchestratorOptions,
}

impl CacheOrchestrator<'_> {
    /// Return the cached directory for `config.tool`, fetching it on a miss.
    pub async fn find_or_fetch(&self, config: &ReleaseConfig) -> Result<PathBuf> {
        let tool = &config.tool;
        enter(Stage::Checking, config);

        if let Some(dir) = self.cache.find(tool).await {
            enter(Stage::HitCached, config);
            self.diagnostics
                .debug(&format!("Found cached {} at {}", tool.name, dir.display()));
            return Ok(dir);
        }

        self.diagnostics
            .debug(&format!("{} not cached, so attempting to download", tool.name));

        self.diagnostics.start_group(&format!(
            "Downloading {} from {}",
            tool.name, config.archive.url
        ));
        let result = self.fetch(config).await;
        self.diagnostics.end_group();

        let dir = result?;
        enter(Stage::Done, config);
        Ok(dir)
    }

    async fn fetch(&self, config: &ReleaseConfig) -> Result<PathBuf> {
        enter(Stage::Downloading, config);
        let work = self.work_dir()?;

        let download = match &config.credential {
            Some(credential) => {
                self.locator
                    .resolve_download(&config.archive.url, credential, self.diagnostics)
                    .await?
            }
            None => ResolvedDownload::anonymous(&config.archive.url),
        };

        let archive = work.path().join("download");
        self.downloader.download(&download, &archive).await?;

        let install_root = match config.archive.mode {
            ArchiveMode::Extract(kind) => {
                enter(Stage::Extracting, config);
                let extracted = self
                    .extractor
                    .extract(kind, &archive, &work.path().join("extracted"))
                    .await?;
                config.archive.install_root(&extracted)?
            }
            ArchiveMode::Raw => {
                enter(Stage::RawInstalling, config);
                let bin_dir = work.path().join("bin");
                let file_name = self.options.platform.executable_name(&config.tool.name);
                install_raw(&archive, &bin_dir, &file_name).await?;
                bin_dir
            }
        };

        enter(Stage::Registering, config);
        let dir = self.cache.register(&install_root, &config.tool).await?;
        info!(tool = %config.tool, dir = %dir.display(), "Tool registered");
        Ok(dir)
    }

    fn work_dir(&self) -> Result<TempDir> {
        let parent: &Path = &self.options.temp_dir;
        std::fs::create_dir_all(parent)?;
        Ok(tempfile::Builder::new()
            .prefix("setup-tool-")
            .tempdir_in(parent)?)
    }
}

fn enter(stage: Stage, config: &ReleaseConfig) {
    debug!(
        %stage,
        name = %config.tool.name,
        version = %config.tool.version,
        arch = %config.tool.arch,
        "Orchestrator stage"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::config::{ArchiveConfig, ExtractionKind, ToolIdentity};
    use crate::testing::{
        FakeCache, FakeDownloader, FakeExtractor, FakeRegistry, RecordingDiagnostics,
    };
    use std::sync::Arc;

    struct Harness {
        cache: FakeCache,
        downloader: FakeDownloader,
        extractor: FakeExtractor,
        locator: AssetLocator,
        diagnostics: RecordingDiagnostics,
        options: OrchestratorOptions,
        _temp: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let temp = tempfile::TempDir::new().unwrap();
            Self {
                cache: FakeCache::new(temp.path().join("cache")),
                downloader: FakeDownloader::new(b"archive"),
                extractor: FakeExtractor::default(),
                locator: AssetLocator::new(Arc::new(FakeRegistry::new())),
                diagnostics: RecordingDiagnostics::new(),
                options: OrchestratorOptions {
                    temp_dir: temp.path().join("tmp"),
                    platform: PlatformContext::new(
                        crate::platform::HostPlatform::Linux,
                        crate::platform::HostArch::X64,
                    ),
                },
                _temp: temp,
            }
        }

        fn orchestrator(&self) -> CacheOrchestrator<'_> {
            CacheOrchestrator {
                cache: &self.cache,
                downloader: &self.downloader,
                extractor: &self.extractor,
                locator: &self.locator,
                diagnostics: &self.diagnostics,
                options: &self.options,
            }
        }
    }

    fn config(mode: ArchiveMode, subdir: Option<&str>) -> ReleaseConfig {
        ReleaseConfig {
            tool: ToolIdentity::new("jq", "1.7.1", "x64"),
            archive: ArchiveConfig {
                url: "https://example.com/jq.tar.gz".into(),
                subdir: subdir.map(str::to_string),
                mode,
            },
            credential: None,
        }
    }

    #[tokio::test]
    async fn test_second_call_is_pure_cache_hit() {
        let harness = Harness::new();
        let config = config(ArchiveMode::Extract(ExtractionKind::TarGz), None);

        let first = harness.orchestrator().find_or_fetch(&config).await.unwrap();
        let second = harness.orchestrator().find_or_fetch(&config).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(harness.downloader.calls(), 1);
        assert_eq!(harness.extractor.calls(), 1);
        assert_eq!(harness.cache.registrations(), 1);
    }

    #[tokio::test]
    async fn test_download_is_grouped() {
        let harness = Harness::new();
        let config = config(ArchiveMode::Extract(ExtractionKind::TarGz), None);

        harness.orchestrator().find_or_fetch(&config).await.unwrap();

        assert_eq!(
            harness.diagnostics.groups(),
            vec!["Downloading jq from https://example.com/jq.tar.gz".to_string()]
        );
        assert!(harness
            .diagnostics
            .debugs()
            .contains(&"jq not cached, so attempting to download".to_string()));
    }

    #[tokio::test]
    async fn test_subdir_selects_install_root() {
        let harness = Harness::new();
        let config = config(
            ArchiveMode::Extract(ExtractionKind::TarGz),
            Some("jq-1.7.1"),
        );

        harness.orchestrator().find_or_fetch(&config).await.unwrap();

        let registered = harness.cache.last_source().unwrap();
        assert!(registered.ends_with("extracted/jq-1.7.1"));
    }

    #[tokio::test]
    async fn test_subdir_outside_extracted_tree_is_not_registered() {
        let outside = tempfile::TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret"), b"host file").unwrap();
        let absolute = outside.path().to_string_lossy().into_owned();

        for subdir in [absolute.as_str(), "../..", "jq-1.7.1/../../extracted"] {
            let harness = Harness::new();
            let config = config(ArchiveMode::Extract(ExtractionKind::TarGz), Some(subdir));

            let err = harness.orchestrator().find_or_fetch(&config).await.unwrap_err();

            assert!(matches!(err, Error::InvalidSubdir { .. }), "{subdir}");
            assert_eq!(harness.cache.registrations(), 0, "{subdir}");
        }
    }

    #[tokio::test]
    async fn test_raw_mode_installs_executable() {
        let harness = Harness::new();
        let config = config(ArchiveMode::Raw, Some("ignored"));

        let dir = harness.orchestrator().find_or_fetch(&config).await.unwrap();

        assert_eq!(harness.extractor.calls(), 0);
        assert_eq!(std::fs::read(dir.join("jq")).unwrap(), b"archive");
    }

    #[tokio::test]
    async fn test_no_credential_downloads_anonymously() {
        let harness = Harness::new();
        let config = config(ArchiveMode::Extract(ExtractionKind::Zip), None);

        harness.orchestrator().find_or_fetch(&config).await.unwrap();

        assert_eq!(
            harness.downloader.requests(),
            vec![ResolvedDownload::anonymous("https://example.com/jq.tar.gz")]
        );
    }

    #[tokio::test]
    async fn test_failure_closes_group_and_registers_nothing() {
        let mut harness = Harness::new();
        harness.downloader = FakeDownloader::failing();
        let config = config(ArchiveMode::Extract(ExtractionKind::TarGz), None);

        let result = harness.orchestrator().find_or_fetch(&config).await;

        assert!(result.is_err());
        assert_eq!(harness.diagnostics.open_groups(), 0);
        assert_eq!(harness.cache.registrations(), 0);
    }
}

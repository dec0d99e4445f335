//! Versioned tool cache.
//!
//! Installed tools live in a directory per cache key, laid out the way
//! hosted runners pre-populate their tool cache:
//!
//! ```text
//! <root>/
//! └── <name>/
//!     └── <version>/
//!         ├── <arch>/           # installed tree
//!         └── <arch>.complete   # written once the tree is fully copied
//! ```
//!
//! A directory without its marker is treated as absent, so an interrupted
//! registration is never reported as a hit.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::config::ToolIdentity;
use crate::{Error, Result};

/// Cache lookup and registration, keyed by `(name, version, arch)`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The installed directory for `tool`, if fully registered.
    async fn find(&self, tool: &ToolIdentity) -> Option<PathBuf>;

    /// Copy `source` into the cache under `tool` and return the managed directory.
    async fn register(&self, source: &Path, tool: &ToolIdentity) -> Result<PathBuf>;
}

/// Filesystem tool cache.
#[derive(Debug, Clone)]
pub struct ToolCache {
    root: PathBuf,
}

impl Default for ToolCache {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

impl ToolCache {
    /// Create a cache at the specified root directory.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// `RUNNER_TOOL_CACHE` when set, otherwise a per-user cache directory.
    #[must_use]
    pub fn default_root() -> PathBuf {
        std::env::var_os("RUNNER_TOOL_CACHE")
            .filter(|value| !value.is_empty())
            .map_or_else(Self::user_cache_root, PathBuf::from)
    }

    fn user_cache_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("setup-tool")
            .join("tools")
    }

    /// Get the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `tool`, whether or not it is registered.
    pub fn tool_dir(&self, tool: &ToolIdentity) -> Result<PathBuf> {
        validate_key(&tool.name)?;
        validate_key(&tool.version)?;
        validate_key(&tool.arch)?;
        Ok(self.root.join(&tool.name).join(&tool.version).join(&tool.arch))
    }

    fn marker_path(tool_dir: &Path) -> PathBuf {
        let mut marker = tool_dir.as_os_str().to_os_string();
        marker.push(".complete");
        PathBuf::from(marker)
    }
}

#[async_trait]
impl CacheStore for ToolCache {
    async fn find(&self, tool: &ToolIdentity) -> Option<PathBuf> {
        let dir = match self.tool_dir(tool) {
            Ok(dir) => dir,
            Err(e) => {
                debug!(%tool, error = %e, "Cache key cannot exist");
                return None;
            }
        };

        let complete = tokio::fs::try_exists(Self::marker_path(&dir))
            .await
            .unwrap_or(false)
            && tokio::fs::metadata(&dir)
                .await
                .is_ok_and(|meta| meta.is_dir());

        if complete {
            trace!(%tool, ?dir, "Cache hit");
            Some(dir)
        } else {
            trace!(%tool, "Cache miss");
            None
        }
    }

    async fn register(&self, source: &Path, tool: &ToolIdentity) -> Result<PathBuf> {
        let dest = self.tool_dir(tool)?;
        let marker = Self::marker_path(&dest);

        // Stale or partial entry from an earlier run
        if tokio::fs::try_exists(&marker).await? {
            tokio::fs::remove_file(&marker).await?;
        }
        if tokio::fs::try_exists(&dest).await? {
            tokio::fs::remove_dir_all(&dest).await?;
        }

        let from = source.to_path_buf();
        let to = dest.clone();
        tokio::task::spawn_blocking(move || copy_tree(&from, &to))
            .await
            .map_err(std::io::Error::other)??;

        tokio::fs::write(&marker, b"").await?;
        debug!(%tool, ?dest, "Registered tool in cache");
        Ok(dest)
    }
}

fn validate_key(component: &str) -> Result<()> {
    let message = if component.is_empty() {
        "must not be empty"
    } else if component.contains(['/', '\\']) {
        "must not contain path separators"
    } else if component == "." || component == ".." {
        "must not be '.' or '..'"
    } else {
        return Ok(());
    };
    Err(Error::invalid_cache_key(component, message))
}

fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;

    for entry in WalkDir::new(source).follow_links(false).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(std::io::Error::other)?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let pointee = std::fs::read_link(link)?;
    std::os::unix::fs::symlink(pointee, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    std::fs::copy(link, target)?;
    Ok(())
}

//! Archive extraction and raw executable installation.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tar::Archive;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::ExtractionKind;
use crate::{Error, Result};

/// Unpacks a downloaded archive into a directory.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract `archive` into `dest` and return the extracted root.
    async fn extract(&self, kind: ExtractionKind, archive: &Path, dest: &Path) -> Result<PathBuf>;
}

/// Default extractor: tar.gz and zip in-process, 7z and xar via their CLIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveExtractor;

#[async_trait]
impl Extractor for ArchiveExtractor {
    async fn extract(&self, kind: ExtractionKind, archive: &Path, dest: &Path) -> Result<PathBuf> {
        debug!(%kind, archive = %archive.display(), dest = %dest.display(), "Extracting archive");
        tokio::fs::create_dir_all(dest).await?;

        match kind {
            ExtractionKind::TarGz | ExtractionKind::Zip => {
                let archive = archive.to_path_buf();
                let dest = dest.to_path_buf();
                let failed_archive = archive.clone();
                tokio::task::spawn_blocking(move || {
                    if kind == ExtractionKind::TarGz {
                        extract_tar_gz(&archive, &dest)
                    } else {
                        extract_zip(&archive, &dest)
                    }
                })
                .await
                .map_err(|e| Error::extraction_failed(failed_archive, e.to_string()))?
            }
            ExtractionKind::SevenZip => {
                let mut output_flag = std::ffi::OsString::from("-o");
                output_flag.push(dest);
                run_tool("7z", &["x".into(), "-y".into(), output_flag, archive.into()], archive)
                    .await?;
                Ok(dest.to_path_buf())
            }
            ExtractionKind::Xar => {
                run_tool(
                    "xar",
                    &["-x".into(), "-f".into(), archive.into(), "-C".into(), dest.into()],
                    archive,
                )
                .await?;
                Ok(dest.to_path_buf())
            }
        }
    }
}

/// Unpack a gzip-compressed tarball into `dest`.
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<PathBuf> {
    let file = File::open(archive)?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    tar.unpack(dest)
        .map_err(|e| Error::extraction_failed(archive, e.to_string()))?;

    debug!(dest = %dest.display(), "Extracted tarball");
    Ok(dest.to_path_buf())
}

/// Unpack a zip archive into `dest`, skipping entries that escape it.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<PathBuf> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| Error::extraction_failed(archive, e.to_string()))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Error::extraction_failed(archive, e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            trace!(name = entry.name(), "Skipping zip entry outside destination");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))?;
        }
    }

    debug!(dest = %dest.display(), "Extracted zip archive");
    Ok(dest.to_path_buf())
}

async fn run_tool(program: &str, args: &[std::ffi::OsString], archive: &Path) -> Result<()> {
    debug!(%program, ?args, "Running extraction tool");

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::extraction_failed(archive, format!("Failed to run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::extraction_failed(
            archive,
            format!("{program} exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    Ok(())
}

/// Install a downloaded file as `dest_dir/file_name` and make it executable.
pub async fn install_raw(src: &Path, dest_dir: &Path, file_name: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dest_dir).await?;
    let dest = dest_dir.join(file_name);
    tokio::fs::copy(src, &dest).await?;
    make_executable(&dest).await?;

    debug!(dest = %dest.display(), "Installed raw executable");
    Ok(dest)
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

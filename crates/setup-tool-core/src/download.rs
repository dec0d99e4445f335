//! Fetching release files to local disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::github::ResolvedDownload;
use crate::{Error, Result};

/// Fetches a resolved download to a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Write the body of `download` to `dest` and return the written path.
    async fn download(&self, download: &ResolvedDownload, dest: &Path) -> Result<PathBuf>;
}

/// Downloader backed by `reqwest`. Follows redirects, never retries.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Create a downloader with its own HTTP client.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("setup-tool/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::transport_from("Failed to create HTTP client", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, download: &ResolvedDownload, dest: &Path) -> Result<PathBuf> {
        let url = download.url.as_str();
        debug!(%url, authenticated = download.auth.is_some(), "Starting download");

        let mut request = self.client.get(url);
        if let Some(auth) = &download.auth {
            request = request.header(AUTHORIZATION, auth);
        }
        for (name, value) in &download.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| Error::transport_from(format!("Failed to download {url}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(url, status));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::transport_from(format!("Failed to read body of {url}"), e))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!(%url, dest = %dest.display(), bytes = written, "Downloaded");
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_client() {
        assert!(HttpDownloader::new().is_ok());
    }
}

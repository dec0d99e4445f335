//! GitHub release-asset location.
//!
//! A release-download URL (`https://github.com/{owner}/{repo}/releases/download/{tag}/{name}`)
//! only works anonymously for public repositories. With a credential, the URL
//! is resolved through the releases API to the asset's API endpoint, which
//! serves raw bytes when asked for `application/octet-stream`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::actions::Diagnostics;
use crate::{Error, Result};

/// Default GitHub REST API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const ASSET_URL_PREFIX: &str = "https://github.com/";

/// Structured parts of a release-asset download URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseAssetRef {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Release tag
    pub tag: String,
    /// Asset file name. May itself contain `/`.
    pub name: String,
}

impl ReleaseAssetRef {
    /// Parse a release-asset URL. Any other shape yields `None`.
    #[must_use]
    pub fn parse(url: &str) -> Option<Self> {
        let path = url.strip_prefix(ASSET_URL_PREFIX)?;
        let (owner, rest) = path.split_once('/')?;
        let (repo, rest) = rest.split_once('/')?;
        let rest = rest.strip_prefix("releases/download/")?;
        let (tag, name) = rest.split_once('/')?;

        if [owner, repo, tag, name].iter().any(|part| part.is_empty()) {
            return None;
        }

        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            tag: tag.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ReleaseAssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ASSET_URL_PREFIX}{}/{}/releases/download/{}/{}",
            self.owner, self.repo, self.tag, self.name
        )
    }
}

/// GitHub release metadata from the API.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Release {
    /// Tag the release was published under
    pub tag_name: String,
    /// Files attached to the release
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// GitHub release asset.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// Asset id
    pub id: u64,
    /// Asset file name
    pub name: String,
    /// API location of the asset; serves bytes with `Accept: application/octet-stream`.
    pub url: String,
    /// Public download location
    pub browser_download_url: String,
}

/// The two release-registry queries the locator needs.
#[async_trait]
pub trait ReleaseRegistry: Send + Sync {
    /// Fetch the release for `tag`.
    async fn release_by_tag(&self, owner: &str, repo: &str, tag: &str, token: &str)
    -> Result<Release>;

    /// Fetch the most recent non-prerelease release.
    async fn latest_release(&self, owner: &str, repo: &str, token: &str) -> Result<Release>;
}

/// Release registry backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: String,
}

impl GitHubClient {
    /// Create a client for the public GitHub API.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("setup-tool/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::transport_from("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
        })
    }

    /// Point the client at another API root (GitHub Enterprise, test servers).
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// API URL for `segments` under the root, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_url).map_err(|e| {
            Error::transport(format!("Invalid GitHub API URL {}: {e}", self.api_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| Error::transport(format!("Invalid GitHub API URL {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_release(&self, url: Url, token: &str) -> Result<Release> {
        debug!(%url, "Fetching GitHub release");

        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, format!("token {token}"))
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| Error::transport_from(format!("Failed to fetch {url}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(url.as_str(), status));
        }

        response
            .json()
            .await
            .map_err(|e| Error::transport_from(format!("Failed to parse release from {url}"), e))
    }
}

#[async_trait]
impl ReleaseRegistry for GitHubClient {
    async fn release_by_tag(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
        token: &str,
    ) -> Result<Release> {
        let url = self.endpoint(&["repos", owner, repo, "releases", "tags", tag])?;
        self.get_release(url, token).await
    }

    async fn latest_release(&self, owner: &str, repo: &str, token: &str) -> Result<Release> {
        let url = self.endpoint(&["repos", owner, repo, "releases", "latest"])?;
        self.get_release(url, token).await
    }
}

/// A fetchable location plus the authorization it needs.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedDownload {
    /// Location to fetch
    pub url: String,
    /// Full `Authorization` header value.
    pub auth: Option<String>,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
}

impl ResolvedDownload {
    /// An unauthenticated download of `url`.
    #[must_use]
    pub fn anonymous(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: None,
            headers: Vec::new(),
        }
    }
}

impl fmt::Debug for ResolvedDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedDownload")
            .field("url", &self.url)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .field("headers", &self.headers)
            .finish()
    }
}

/// Resolves release-asset URLs and latest versions through a [`ReleaseRegistry`].
#[derive(Clone)]
pub struct AssetLocator {
    registry: Arc<dyn ReleaseRegistry>,
}

impl AssetLocator {
    /// Create a locator over `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn ReleaseRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve `url` to an authenticated asset download.
    ///
    /// Falls back to an anonymous download of `url` when it is not a release
    /// asset or when the release has no asset of that name. Registry
    /// failures are returned as errors.
    pub async fn resolve_download(
        &self,
        url: &str,
        credential: &str,
        diagnostics: &dyn Diagnostics,
    ) -> Result<ResolvedDownload> {
        let Some(asset_ref) = ReleaseAssetRef::parse(url) else {
            diagnostics.error(&format!("{url} did not parse as a GitHub release asset"));
            return Ok(ResolvedDownload::anonymous(url));
        };

        let ReleaseAssetRef {
            owner,
            repo,
            tag,
            name,
        } = &asset_ref;

        diagnostics.info(&format!(
            "Parsed as asset-url, {owner}/{repo} {tag} {name}"
        ));

        let release = self
            .registry
            .release_by_tag(owner, repo, tag, credential)
            .await?;

        let names: Vec<&str> = release.assets.iter().map(|a| a.name.as_str()).collect();
        diagnostics.info(&format!(
            "Release {tag} contains the following assets: {}",
            names.join(", ")
        ));

        let Some(asset) = release.assets.iter().find(|asset| asset.name == *name) else {
            diagnostics.error(&format!(
                "Release {tag} does not contain an asset named {name}"
            ));
            return Ok(ResolvedDownload::anonymous(url));
        };

        diagnostics.info(&format!("Located asset, {}: {}", asset.id, asset.name));

        Ok(ResolvedDownload {
            url: asset.url.clone(),
            auth: Some(format!("token {credential}")),
            headers: vec![(
                ACCEPT.as_str().to_string(),
                "application/octet-stream".to_string(),
            )],
        })
    }

    /// Look up the version of the most recent release of the repository `url` belongs to.
    pub async fn resolve_latest_version(
        &self,
        url: &str,
        credential: &str,
        diagnostics: &dyn Diagnostics,
    ) -> Result<String> {
        let asset_ref = ReleaseAssetRef::parse(url).ok_or_else(|| Error::not_a_release_asset(url))?;

        let release = self
            .registry
            .latest_release(&asset_ref.owner, &asset_ref.repo, credential)
            .await?;

        let version = version_from_tag(&release.tag_name).to_string();
        info!(
            owner = %asset_ref.owner,
            repo = %asset_ref.repo,
            tag = %release.tag_name,
            %version,
            "Resolved latest release"
        );
        diagnostics.info(&format!(
            "Latest release of {}/{} is {} (version {version})",
            asset_ref.owner, asset_ref.repo, release.tag_name
        ));

        Ok(version)
    }
}

/// Strip a single leading `v` from a release tag.
#[must_use]
pub fn version_from_tag(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}

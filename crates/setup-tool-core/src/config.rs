//! Release configuration: what to fetch, how to unpack it, where to cache it.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::inputs::Inputs;
use crate::interpolate::{Variables, interpolate};
use crate::{Error, Result};

/// Version input value that requests a latest-release lookup.
pub const LATEST_PLACEHOLDER: &str = "latest";

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionKind {
    /// gzip-compressed tar
    TarGz,
    /// zip
    Zip,
    /// 7-Zip, via the `7z` tool
    SevenZip,
    /// xar, via the `xar` tool
    Xar,
}

impl ExtractionKind {
    /// Parse an `ext` input token.
    pub fn parse(ext: &str) -> Result<Self> {
        match ext {
            "tar.gz" | "tgz" => Ok(Self::TarGz),
            "zip" => Ok(Self::Zip),
            "7z" => Ok(Self::SevenZip),
            "xar" | "pkg" => Ok(Self::Xar),
            other => Err(Error::unsupported_extension(other)),
        }
    }

    /// Canonical extension token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
            Self::SevenZip => "7z",
            Self::Xar => "xar",
        }
    }
}

impl fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// How the downloaded file becomes an installation directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Unpack the archive.
    Extract(ExtractionKind),
    /// The download is the executable itself.
    Raw,
}

/// Cache key triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolIdentity {
    /// Tool name
    pub name: String,
    /// Resolved version
    pub version: String,
    /// The `arch` input, not necessarily the host architecture
    pub arch: String,
}

impl ToolIdentity {
    /// Create an identity from its three components.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: arch.into(),
        }
    }
}

impl fmt::Display for ToolIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version, self.arch)
    }
}

/// Where the archive comes from and how to unpack it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Fully interpolated download URL.
    pub url: String,
    /// Interpolated sub-path of the extracted tree to install. Unused in raw mode.
    pub subdir: Option<String>,
    /// Extract or install the download as-is.
    pub mode: ArchiveMode,
}

impl ArchiveConfig {
    /// The directory to register once the archive is unpacked into `extracted`.
    pub fn install_root(&self, extracted: &Path) -> Result<PathBuf> {
        match &self.subdir {
            Some(subdir) => {
                validate_subdir(subdir)?;
                Ok(extracted.join(subdir))
            }
            None => Ok(extracted.to_path_buf()),
        }
    }
}

/// Reject a subdir that could leave the extracted tree.
pub fn validate_subdir(subdir: &str) -> Result<()> {
    for component in Path::new(subdir).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(Error::invalid_subdir(subdir, "must be a relative path"));
            }
            Component::ParentDir => {
                return Err(Error::invalid_subdir(subdir, "must not contain '..'"));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

/// Everything the orchestrator needs for one tool.
#[derive(Clone, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Cache key
    pub tool: ToolIdentity,
    /// Download and unpack settings
    pub archive: ArchiveConfig,
    /// Credential for private release assets.
    pub credential: Option<String>,
}

impl fmt::Debug for ReleaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseConfig")
            .field("tool", &self.tool)
            .field("archive", &self.archive)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Builds a [`ReleaseConfig`] from resolved inputs.
#[derive(Debug, Clone)]
pub struct ReleaseConfigBuilder<'a> {
    inputs: &'a Inputs,
    version: String,
}

impl<'a> ReleaseConfigBuilder<'a> {
    /// Start from `inputs`, using the `version` input as given.
    #[must_use]
    pub fn new(inputs: &'a Inputs) -> Self {
        Self {
            inputs,
            version: inputs.version.clone(),
        }
    }

    /// Whether the version input asks for the latest release.
    #[must_use]
    pub fn wants_latest(&self) -> bool {
        self.version.is_empty() || self.version == LATEST_PLACEHOLDER
    }

    /// Replace the version, typically with a resolved latest version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The URL used to find the repository for a latest-release lookup.
    #[must_use]
    pub fn latest_lookup_url(&self) -> String {
        let mut vars = self.variables();
        vars.insert("version".into(), LATEST_PLACEHOLDER.into());
        interpolate(&self.inputs.url, &vars)
    }

    /// Template variables: `name`, `version`, `os`, `arch`, `ext`.
    #[must_use]
    pub fn variables(&self) -> Variables {
        let inputs = self.inputs;
        [
            ("name", inputs.name.as_str()),
            ("version", self.version.as_str()),
            ("os", inputs.os.as_str()),
            ("arch", inputs.arch.as_str()),
            ("ext", inputs.ext.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Select the archive mode, rejecting unknown extensions.
    pub fn archive_mode(&self) -> Result<ArchiveMode> {
        if self.inputs.no_extract {
            Ok(ArchiveMode::Raw)
        } else {
            ExtractionKind::parse(&self.inputs.ext).map(ArchiveMode::Extract)
        }
    }

    /// Interpolate templates and select the archive mode.
    pub fn build(self) -> Result<ReleaseConfig> {
        let inputs = self.inputs;
        let mode = self.archive_mode()?;

        let vars = self.variables();
        let url = interpolate(&inputs.url, &vars);
        let subdir = inputs
            .subdir
            .as_deref()
            .map(|template| interpolate(template, &vars));
        if let (ArchiveMode::Extract(_), Some(subdir)) = (mode, &subdir) {
            validate_subdir(subdir)?;
        }

        Ok(ReleaseConfig {
            tool: ToolIdentity::new(&inputs.name, self.version, &inputs.arch),
            archive: ArchiveConfig { url, subdir, mode },
            credential: inputs.github_token.clone(),
        })
    }
}

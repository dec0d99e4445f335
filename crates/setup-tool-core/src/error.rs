//! Error types for tool setup operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tool setup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a setup run.
///
/// Conditions with a safe fallback (an asset URL that does not parse, an asset
/// missing from its release) are never represented here; they are reported
/// through [`crate::actions::Diagnostics`] and the run continues.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A required input was absent after the full cascade.
    #[error("{message}")]
    #[diagnostic(
        code(setup_tool::missing_input),
        help("Set the input in the step's `with:` block, or pass --input KEY=VALUE")
    )]
    MissingRequiredInput {
        /// Human-readable message naming the keys that were tried
        message: String,
        /// Every key consulted, most specific first
        candidates: Vec<String>,
    },

    /// A latest-version lookup was requested for a URL that is not a release asset.
    #[error("{url} is not a GitHub release asset URL, so no version can be inferred from it")]
    #[diagnostic(
        code(setup_tool::not_a_release_asset),
        help(
            "Set the version input explicitly, or use a url of the form https://github.com/<owner>/<repo>/releases/download/<tag>/<name>"
        )
    )]
    NotAReleaseAsset {
        /// The URL that failed to parse
        url: String,
    },

    /// The archive extension has no extraction strategy.
    #[error("Unsupported archive extension: {ext}")]
    #[diagnostic(
        code(setup_tool::unsupported_extension),
        help("Supported extensions are tar.gz, zip, 7z and xar; set no-extract to install a bare executable")
    )]
    UnsupportedExtension {
        /// The extension token as resolved from inputs
        ext: String,
    },

    /// The host reported a platform or architecture this tool does not know.
    #[error("Unsupported {kind}: {value}")]
    #[diagnostic(
        code(setup_tool::unsupported_platform),
        help("Pass --platform and --arch explicitly")
    )]
    UnsupportedPlatform {
        /// Either "platform" or "architecture"
        kind: &'static str,
        /// The unrecognised value
        value: String,
    },

    /// Network, registry or download failure.
    #[error("{message}")]
    #[diagnostic(code(setup_tool::transport))]
    Transport {
        /// The error message
        message: String,
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// The underlying client error
        #[source]
        source: Option<reqwest::Error>,
    },

    /// An archive could not be unpacked.
    #[error("Failed to extract {}: {message}", archive.display())]
    #[diagnostic(
        code(setup_tool::extraction_failed),
        help("Check that the downloaded file matches the configured ext input")
    )]
    ExtractionFailed {
        /// The archive being extracted
        archive: PathBuf,
        /// Error message
        message: String,
    },

    /// A cache key component cannot be used as a directory name.
    #[error("Invalid cache key component '{key}': {message}")]
    #[diagnostic(code(setup_tool::invalid_cache_key))]
    InvalidCacheKey {
        /// The offending component
        key: String,
        /// Why it was rejected
        message: String,
    },

    /// The subdir input does not name a path inside the extracted archive.
    #[error("Invalid subdir '{subdir}': {message}")]
    #[diagnostic(
        code(setup_tool::invalid_subdir),
        help("Use a path relative to the archive root, without '..' components")
    )]
    InvalidSubdir {
        /// The interpolated subdir
        subdir: String,
        /// Why it was rejected
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    #[diagnostic(code(setup_tool::io))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a missing-input error for the given candidate keys.
    #[must_use]
    pub fn missing_required_input(candidates: &[String]) -> Self {
        let message = match candidates {
            [only] => format!("You must supply the {only} input"),
            many => format!("You must supply one of {} as an input", many.join(", ")),
        };
        Self::MissingRequiredInput {
            message,
            candidates: candidates.to_vec(),
        }
    }

    /// Create a not-a-release-asset error.
    #[must_use]
    pub fn not_a_release_asset(url: impl Into<String>) -> Self {
        Self::NotAReleaseAsset { url: url.into() }
    }

    /// Create an unsupported extension error.
    #[must_use]
    pub fn unsupported_extension(ext: impl Into<String>) -> Self {
        Self::UnsupportedExtension { ext: ext.into() }
    }

    /// Create an unsupported platform error.
    #[must_use]
    pub fn unsupported_platform(value: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            kind: "platform",
            value: value.into(),
        }
    }

    /// Create an unsupported architecture error.
    #[must_use]
    pub fn unsupported_arch(value: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            kind: "architecture",
            value: value.into(),
        }
    }

    /// Create a transport error without an underlying client error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Wrap a client error, keeping its text in the message.
    #[must_use]
    pub fn transport_from(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            message: format!("{}: {source}", context.into()),
            status: source.status().map(|s| s.as_u16()),
            source: Some(source),
        }
    }

    /// Create a transport error for a non-success HTTP response.
    #[must_use]
    pub fn http_status(url: &str, status: reqwest::StatusCode) -> Self {
        Self::Transport {
            message: format!("Request to {url} failed (HTTP {status})"),
            status: Some(status.as_u16()),
            source: None,
        }
    }

    /// Create an extraction failed error.
    #[must_use]
    pub fn extraction_failed(archive: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Create an invalid cache key error.
    #[must_use]
    pub fn invalid_cache_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCacheKey {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an invalid subdir error.
    #[must_use]
    pub fn invalid_subdir(subdir: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSubdir {
            subdir: subdir.into(),
            message: message.into(),
        }
    }

    /// Whether the error comes from misconfigured inputs rather than the environment.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredInput { .. }
                | Self::NotAReleaseAsset { .. }
                | Self::UnsupportedExtension { .. }
                | Self::UnsupportedPlatform { .. }
                | Self::InvalidCacheKey { .. }
                | Self::InvalidSubdir { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_single_input_message() {
        let err = Error::missing_required_input(&["name".to_string()]);
        assert_eq!(err.to_string(), "You must supply the name input");
    }

    #[test]
    fn test_missing_cascaded_input_message() {
        let keys = vec![
            "url-linux-x64".to_string(),
            "url-x64".to_string(),
            "url-linux".to_string(),
            "url".to_string(),
        ];
        let err = Error::missing_required_input(&keys);
        assert_eq!(
            err.to_string(),
            "You must supply one of url-linux-x64, url-x64, url-linux, url as an input"
        );
        if let Error::MissingRequiredInput { candidates, .. } = err {
            assert_eq!(candidates, keys);
        } else {
            panic!("expected MissingRequiredInput");
        }
    }

    #[test]
    fn test_unsupported_extension_message() {
        let err = Error::unsupported_extension("rar");
        assert_eq!(err.to_string(), "Unsupported archive extension: rar");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unsupported_platform_kinds() {
        assert_eq!(
            Error::unsupported_platform("plan9").to_string(),
            "Unsupported platform: plan9"
        );
        assert_eq!(
            Error::unsupported_arch("riscv64").to_string(),
            "Unsupported architecture: riscv64"
        );
    }

    #[test]
    fn test_transport_is_not_configuration() {
        let err = Error::transport("connection reset");
        assert_eq!(err.to_string(), "connection reset");
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_extraction_failed_message() {
        let err = Error::extraction_failed("/tmp/a.zip", "invalid Zip archive");
        assert_eq!(
            err.to_string(),
            "Failed to extract /tmp/a.zip: invalid Zip archive"
        );
    }

    #[test]
    fn test_invalid_subdir_is_configuration() {
        let err = Error::invalid_subdir("../etc", "must stay inside the archive");
        assert_eq!(
            err.to_string(),
            "Invalid subdir '../etc': must stay inside the archive"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}

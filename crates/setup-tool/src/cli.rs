//! Command-line surface: arguments, error categories and exit codes.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use miette::{Diagnostic, Report};
use setup_tool_core::github::DEFAULT_API_URL;
use setup_tool_core::{HostArch, HostPlatform, MapInputs, PlatformContext};
use thiserror::Error;

use crate::tracing::{LogLevel, TracingFormat};

/// Successful exit code
pub const EXIT_OK: i32 = 0;
/// Run failure exit code (download, extraction, registry)
pub const EXIT_FAILURE: i32 = 1;
/// CLI or configuration error exit code
pub const EXIT_CONFIG: i32 = 2;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Missing or invalid inputs (exit code 2)
    #[error("{message}")]
    #[diagnostic(code(setup_tool::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Any other failure (exit code 1)
    #[error("{message}")]
    #[diagnostic(code(setup_tool::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// The message without category decoration.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Config { message, .. } | Self::Other { message, .. } => message,
        }
    }
}

/// Input and platform problems are configuration errors; everything else
/// is a run failure.
impl From<setup_tool_core::Error> for CliError {
    fn from(err: setup_tool_core::Error) -> Self {
        let message = err.to_string();
        let help = err.help().map(|h| h.to_string());
        if err.is_configuration() {
            Self::Config { message, help }
        } else {
            Self::Other { message, help }
        }
    }
}

/// Exit code for an error category
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CONFIG,
        CliError::Other { .. } => EXIT_FAILURE,
    }
}

/// Render an error to stderr with miette.
#[allow(clippy::print_stderr)]
pub fn render_error(err: &CliError) {
    let report = Report::new(err.clone());
    eprintln!("{report:?}");
    let _ = io::stderr().flush();
}

/// Fetch, extract and cache a released tool, then add it to `PATH`.
///
/// Tool inputs are read from `INPUT_<NAME>` variables as set by the Actions
/// runner. `--input` values take precedence over them.
#[derive(Parser, Debug)]
#[command(name = "setup-tool", version, about, long_about = None)]
pub struct Cli {
    /// Tool cache root.
    #[arg(long, env = "RUNNER_TOOL_CACHE", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Directory for downloads and extraction work.
    #[arg(long, env = "RUNNER_TEMP", value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Override the detected platform (e.g. linux, darwin, win32).
    #[arg(long)]
    pub platform: Option<String>,

    /// Override the detected architecture (e.g. x64, arm64).
    #[arg(long)]
    pub arch: Option<String>,

    /// Set an input, e.g. `--input url-linux=https://...`. Repeatable.
    #[arg(long = "input", short = 'i', value_name = "KEY=VALUE", value_parser = parse_input_pair)]
    pub inputs: Vec<(String, String)>,

    /// GitHub REST API root.
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub github_api_url: String,

    /// Logging verbosity level.
    #[arg(short = 'L', long, default_value = "warn", value_enum)]
    pub level: LogLevel,

    /// Log output format.
    #[arg(long, default_value = "compact", value_enum)]
    pub log_format: TracingFormat,
}

impl Cli {
    /// Host platform, honoring `--platform` and `--arch`.
    pub fn platform_context(&self) -> Result<PlatformContext, CliError> {
        let platform = match &self.platform {
            Some(value) => HostPlatform::parse(value)?,
            None => HostPlatform::current()?,
        };
        let arch = match &self.arch {
            Some(value) => HostArch::parse(value)?,
            None => HostArch::current()?,
        };
        Ok(PlatformContext::new(platform, arch))
    }

    /// Inputs given on the command line.
    #[must_use]
    pub fn input_overrides(&self) -> MapInputs {
        self.inputs.iter().cloned().collect()
    }

    /// Work directory parent, falling back to the system temp directory.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Parse a `KEY=VALUE` pair. The value may contain further `=` characters.
pub fn parse_input_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("input name is empty in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Whether the process runs as a GitHub Actions step.
#[must_use]
pub fn in_github_actions() -> bool {
    std::env::var("GITHUB_ACTIONS").is_ok_and(|value| value == "true")
}

/// Parse command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

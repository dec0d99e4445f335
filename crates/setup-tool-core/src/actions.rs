//! Runner host surface: inputs, diagnostics and step outputs.
//!
//! Everything the run needs from the CI host is reached through values
//! passed in explicitly, never through process-global state, so tests can
//! substitute doubles for each capability.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, error, info};

use crate::Result;
use crate::inputs::InputSource;

/// Logging capability handed to every component that reports progress.
pub trait Diagnostics: Send + Sync {
    /// Verbose detail, hidden unless step debugging is enabled.
    fn debug(&self, message: &str);
    /// Normal progress output.
    fn info(&self, message: &str);
    /// A problem worth an annotation. Does not by itself fail the run.
    fn error(&self, message: &str);
    /// Open a collapsible group.
    fn start_group(&self, title: &str);
    /// Close the most recently opened group.
    fn end_group(&self);
}

/// Diagnostics that only emit `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn debug(&self, message: &str) {
        debug!("{message}");
    }

    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }

    fn start_group(&self, title: &str) {
        info!(group = %title, "Begin group");
    }

    fn end_group(&self) {
        debug!("End group");
    }
}

/// Diagnostics written as GitHub Actions workflow commands.
///
/// Each call also emits the matching `tracing` event so the same run can be
/// followed in structured logs.
pub struct WorkflowCommands<W: Write + Send> {
    out: Mutex<W>,
}

impl WorkflowCommands<std::io::Stdout> {
    /// Write workflow commands to standard output, where the runner reads them.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> WorkflowCommands<W> {
    /// Write workflow commands to an arbitrary sink.
    pub const fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the sink, e.g. to inspect what was written.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_line(&self, line: &str) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Losing a log line must not fail the run
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

impl<W: Write + Send> Diagnostics for WorkflowCommands<W> {
    fn debug(&self, message: &str) {
        debug!("{message}");
        self.write_line(&format!("::debug::{}", escape_data(message)));
    }

    fn info(&self, message: &str) {
        info!("{message}");
        self.write_line(message);
    }

    fn error(&self, message: &str) {
        error!("{message}");
        self.write_line(&format!("::error::{}", escape_data(message)));
    }

    fn start_group(&self, title: &str) {
        info!(group = %title, "Begin group");
        self.write_line(&format!("::group::{}", escape_data(title)));
    }

    fn end_group(&self) {
        self.write_line("::endgroup::");
    }
}

/// Report the message that fails the run.
pub fn set_failed(diagnostics: &dyn Diagnostics, message: &str) {
    diagnostics.error(message);
}

/// Escape a workflow command payload so it stays on one line.
#[must_use]
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Inputs passed to the step as `INPUT_<NAME>` environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionsInputs;

impl ActionsInputs {
    /// The environment variable holding input `name`.
    #[must_use]
    pub fn env_var(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
    }
}

impl InputSource for ActionsInputs {
    fn get_input(&self, name: &str) -> Option<String> {
        std::env::var(Self::env_var(name))
            .ok()
            .map(|value| value.trim().to_string())
    }
}

/// Step outputs and `PATH` additions, written to the runner's command files.
#[derive(Debug, Clone, Default)]
pub struct RunnerFiles {
    output_file: Option<PathBuf>,
    path_file: Option<PathBuf>,
}

const OUTPUT_DELIMITER: &str = "ghadelimiter_setup_tool";

impl RunnerFiles {
    /// Use the files named by `GITHUB_OUTPUT` and `GITHUB_PATH`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            output_file: non_empty_env("GITHUB_OUTPUT"),
            path_file: non_empty_env("GITHUB_PATH"),
        }
    }

    /// Use explicit files.
    #[must_use]
    pub const fn new(output_file: Option<PathBuf>, path_file: Option<PathBuf>) -> Self {
        Self {
            output_file,
            path_file,
        }
    }

    /// Publish a named step output.
    pub fn set_output(&self, name: &str, value: &str) -> Result<()> {
        let Some(file) = &self.output_file else {
            debug!(%name, %value, "GITHUB_OUTPUT not set, output not recorded");
            return Ok(());
        };

        let entry = if value.contains('\n') {
            format!("{name}<<{OUTPUT_DELIMITER}\n{value}\n{OUTPUT_DELIMITER}\n")
        } else {
            format!("{name}={value}\n")
        };
        append(file, &entry)?;
        debug!(%name, ?file, "Recorded step output");
        Ok(())
    }

    /// Prepend a directory to `PATH` for subsequent steps.
    pub fn add_path(&self, dir: &Path) -> Result<()> {
        let Some(file) = &self.path_file else {
            debug!(?dir, "GITHUB_PATH not set, PATH not updated");
            return Ok(());
        };

        append(file, &format!("{}\n", dir.display()))?;
        debug!(?dir, ?file, "Added directory to PATH");
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn append(path: &Path, contents: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

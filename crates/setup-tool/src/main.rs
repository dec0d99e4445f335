//! setup-tool binary.
//!
//! Runs one setup inside a CI step: reads inputs, installs the tool into the
//! runner's tool cache and publishes the installed directory.

#![allow(clippy::print_stderr)]

use std::sync::Arc;

use setup_tool::cli::{self, CliError, EXIT_OK, exit_code_for, render_error};
use setup_tool::tracing::{TracingConfig, init_tracing};
use setup_tool_core::{
    ActionsInputs, ArchiveExtractor, AssetLocator, Collaborators, Diagnostics, GitHubClient,
    HttpDownloader, LayeredInputs, RunnerFiles, ToolCache, TracingDiagnostics, WorkflowCommands,
    set_failed,
};

fn main() {
    let cli = cli::parse();

    if let Err(e) = init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        filter: None,
    }) {
        eprintln!("Failed to initialize tracing: {e}");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            std::process::exit(cli::EXIT_FAILURE);
        }
    };

    // Workflow commands are only meaningful to an Actions runner
    let diagnostics: Box<dyn Diagnostics> = if cli::in_github_actions() {
        Box::new(WorkflowCommands::stdout())
    } else {
        Box::new(TracingDiagnostics)
    };
    let exit_code = match rt.block_on(run(&cli, diagnostics.as_ref())) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            set_failed(diagnostics.as_ref(), err.message());
            render_error(&err);
            exit_code_for(&err)
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: &cli::Cli, diagnostics: &dyn Diagnostics) -> Result<(), CliError> {
    let ctx = cli.platform_context()?;
    tracing::debug!(platform = %ctx, "Starting setup");

    let inputs = LayeredInputs::new()
        .with_layer(cli.input_overrides())
        .with_layer(ActionsInputs);

    let cache = cli
        .cache_dir
        .clone()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(ToolCache::default, ToolCache::new);

    let registry = GitHubClient::new()?.with_api_url(&cli.github_api_url);
    let locator = AssetLocator::new(Arc::new(registry));
    let downloader = HttpDownloader::new()?;
    let runner_files = RunnerFiles::from_env();

    let collaborators = Collaborators {
        cache: &cache,
        downloader: &downloader,
        extractor: &ArchiveExtractor,
        locator: &locator,
        diagnostics,
        runner_files: &runner_files,
        temp_dir: cli.work_dir(),
    };

    let outcome = setup_tool_core::run(&ctx, &inputs, &collaborators).await?;
    tracing::info!(
        name = %outcome.tool.name,
        version = %outcome.tool.version,
        dir = %outcome.dir.display(),
        "Setup complete"
    );
    Ok(())
}

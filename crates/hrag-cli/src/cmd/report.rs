//! `hrag report`: run one query through all three sources and print the
//! seven-section report.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Args;
use hrag_core::config::resolve_config;
use hrag_core::events::TracingSink;
use hrag_core::{ErrorCode, Query, RunError};
use hrag_search::Backends;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::output::{CliError, OutputMode, render, render_error};

const PROMPT: &str = "Enter telecom business query: ";

#[derive(Args, Debug, Default)]
#[command(
    about = "Generate a hybrid report for one query",
    long_about = "Fan a query out to the vector index, the graph store and web search, then print a seven-section report.\n\n\
                  Sources that fail or time out are shown as [no data] placeholders; the run still completes.",
    after_help = "EXAMPLES:\n    # Prompt for the query on stdin\n    hrag report\n\n\
                  # Pass the query directly\n    hrag report --query \"Why is churn rising in premium 5G plans?\"\n\n\
                  # Machine-readable report plus evidence\n    hrag --json report -q \"roaming revenue\""
)]
pub struct ReportArgs {
    /// Query to analyze. Read from stdin when omitted.
    #[arg(short, long)]
    pub query: Option<String>,

    /// Per-source retrieval timeout in milliseconds (overrides config).
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

/// Execute `hrag report`.
///
/// # Errors
///
/// Returns an error for a blank query, unusable configuration, a backend
/// that cannot be initialized, or a cancelled run. Per-source retrieval
/// failures are not errors.
pub fn run_report(
    args: &ReportArgs,
    output: OutputMode,
    config_path: Option<&Path>,
    verbose: bool,
    project_root: &Path,
) -> anyhow::Result<()> {
    let raw = match &args.query {
        Some(query) => query.clone(),
        None => prompt_for_query()?,
    };

    let query = match Query::parse(&raw) {
        Ok(query) => query,
        Err(err) => {
            render_error(output, &CliError::from_code(err.code(), err.to_string()))?;
            bail!(err);
        }
    };

    let mut config = match resolve_config(config_path, project_root) {
        Ok(config) => config,
        Err(err) => {
            render_error(
                output,
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };
    if let Some(timeout_ms) = args.timeout_ms {
        if timeout_ms == 0 {
            let message = "--timeout-ms must be greater than zero";
            render_error(
                output,
                &CliError::from_code(ErrorCode::ConfigParseError, message),
            )?;
            bail!(message);
        }
        config.retrieval.timeout_ms = timeout_ms;
    }

    let backends = match Backends::from_config(&config) {
        Ok(backends) => backends,
        Err(err) => {
            let err = RunError::Initialization(format!("{err:#}"));
            render_error(output, &CliError::from_code(err.code(), err.to_string()))?;
            bail!(err);
        }
    };
    let mut orchestrator = backends.into_orchestrator(&config);
    if verbose {
        orchestrator = orchestrator.with_sink(Arc::new(TracingSink));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let cancel = CancellationToken::new();
    let outcome = runtime.block_on(async {
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling run");
                on_interrupt.cancel();
            }
        });
        orchestrator.run_with_cancel(query.as_str(), &cancel).await
    });

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            render_error(output, &CliError::from_code(err.code(), err.to_string()))?;
            bail!(err);
        }
    };
    info!(confidence = %outcome.report.confidence(), "report ready");

    render(output, &outcome, |outcome, w| write!(w, "{}", outcome.report))
}

fn prompt_for_query() -> anyhow::Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        let mut err = io::stderr();
        write!(err, "{PROMPT}")?;
        err.flush()?;
    }
    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("failed to read query from stdin")?;
    Ok(line)
}

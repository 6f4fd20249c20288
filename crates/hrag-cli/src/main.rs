#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "hrag",
    author,
    version,
    about = "hrag: hybrid retrieval reports from vector, graph and web evidence",
    long_about = None
)]
struct Cli {
    /// Narrate retrieval progress (attempts, retries, per-source status) on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: $HRAG_CONFIG, ./hrag.toml, then the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a report (the default when no subcommand is given).
    Report(cmd::report::ReportArgs),

    /// Load documents into the vector index.
    Index(cmd::index::IndexArgs),

    #[command(
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    hrag completions bash\n\n    # Generate zsh completions\n    hrag completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HRAG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "hrag=debug,info"
        } else {
            "hrag=info,warn"
        })
    });

    let format = env::var("HRAG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Before tracing, so HRAG_LOG may come from .env.
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Err(err) = dotenv
        && !err.not_found()
    {
        warn!("ignoring unreadable .env file: {err}");
    }

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();
    let config = cli.config.as_deref();

    match cli.command {
        None => cmd::report::run_report(
            &cmd::report::ReportArgs::default(),
            output,
            config,
            cli.verbose,
            &project_root,
        ),
        Some(Commands::Report(ref args)) => {
            cmd::report::run_report(args, output, config, cli.verbose, &project_root)
        }
        Some(Commands::Index(ref args)) => {
            cmd::index::run_index(args, output, config, &project_root)
        }
        Some(Commands::Completions(ref args)) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args, &mut command)
        }
    }
}

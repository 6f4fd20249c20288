//! `hrag completions`: shell completion scripts.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use clap_complete::{Shell, generate};

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Generate the completion script for `args.shell`.
///
/// # Errors
///
/// Returns an error if the output file cannot be created or written.
pub fn run_completions(args: &CompletionsArgs, command: &mut clap::Command) -> Result<()> {
    match &args.output {
        Some(path) => write_to_file(args.shell, command, path),
        None => {
            let stdout = io::stdout();
            write_script(args.shell, command, &mut stdout.lock())
        }
    }
}

fn write_to_file(shell: Shell, command: &mut clap::Command, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_script(shell, command, &mut out)?;
    out.flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn write_script(shell: Shell, command: &mut clap::Command, out: &mut dyn Write) -> Result<()> {
    let name = command.get_name().to_owned();
    generate(shell, command, name, out);
    Ok(())
}

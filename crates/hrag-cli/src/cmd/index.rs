//! `hrag index`: bulk-load documents into the on-disk vector index.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use hrag_core::ErrorCode;
use hrag_core::config::{SeedDocument, resolve_config};
use hrag_search::semantic::{VectorIndex, build_embedder};
use serde::{Deserialize, Serialize};

use crate::output::{CliError, OutputMode, render, render_error};

#[derive(Args, Debug)]
#[command(
    about = "Load documents into the vector index",
    long_about = "Embed (id, text) documents and store them in the vector index.\n\n\
                  Documents whose text is unchanged are skipped; changed text is re-embedded. \
                  Duplicate ids within one file are rejected.",
    after_help = "EXAMPLES:\n    # Load a TOML file with [[documents]] tables\n    hrag index --file docs.toml\n\n\
                  # Load JSON Lines into a specific index file\n    hrag index --file docs.jsonl --db .hrag/vectors.db"
)]
pub struct IndexArgs {
    /// Documents to load: TOML with `[[documents]]` entries, or JSON Lines
    /// (`.jsonl`/`.ndjson`) with one `{"id", "text"}` object per line.
    #[arg(long, value_name = "PATH")]
    pub file: PathBuf,

    /// Index database (overrides `[vector] db_path`).
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct DocumentFile {
    #[serde(default)]
    documents: Vec<SeedDocument>,
}

#[derive(Debug, Serialize)]
struct IndexOutput {
    path: PathBuf,
    model: String,
    documents: usize,
    inserted: usize,
    updated: usize,
    unchanged: usize,
}

/// Execute `hrag index`.
///
/// # Errors
///
/// Returns an error if no index path is configured, the document file is
/// unreadable or malformed, or embedding/storage fails.
pub fn run_index(
    args: &IndexArgs,
    output: OutputMode,
    config_path: Option<&Path>,
    project_root: &Path,
) -> Result<()> {
    let config = resolve_config(config_path, project_root)?;

    let Some(db_path) = args.db.clone().or_else(|| config.vector.db_path.clone()) else {
        render_error(
            output,
            &CliError {
                message: "no vector index path configured".into(),
                suggestion: Some("pass --db or set [vector] db_path in hrag.toml".into()),
                error_code: Some(ErrorCode::ConfigParseError.code().into()),
            },
        )?;
        bail!("no vector index path configured");
    };

    let documents = read_documents(&args.file)?;
    let embedder = match build_embedder(&config.embedder) {
        Ok(embedder) => embedder,
        Err(err) => {
            render_error(
                output,
                &CliError::from_code(ErrorCode::InitializationFailed, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };

    let index = VectorIndex::open(&db_path)?;
    let stats = index.load_documents(embedder.as_ref(), &documents)?;

    let result = IndexOutput {
        path: db_path,
        model: embedder.model_id(),
        documents: documents.len(),
        inserted: stats.inserted,
        updated: stats.updated,
        unchanged: stats.unchanged,
    };
    render(output, &result, |r, w| {
        writeln!(
            w,
            "indexed {} documents into {} ({} new, {} updated, {} unchanged; model {})",
            r.documents,
            r.path.display(),
            r.inserted,
            r.updated,
            r.unchanged,
            r.model
        )
    })
}

fn read_documents(path: &Path) -> Result<Vec<SeedDocument>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_json_lines = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "jsonl" | "ndjson"));

    if is_json_lines {
        parse_json_lines(&content).with_context(|| format!("Failed to parse {}", path.display()))
    } else {
        toml::from_str::<DocumentFile>(&content)
            .map(|file| file.documents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

fn parse_json_lines(content: &str) -> Result<Vec<SeedDocument>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<SeedDocument>(line)
                .with_context(|| format!("line {}: expected {{\"id\", \"text\"}}", i + 1))
        })
        .collect()
}

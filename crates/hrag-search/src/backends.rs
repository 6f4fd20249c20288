//! Construct the three retrieval adapters from an [`AppConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use hrag_core::config::{AppConfig, VectorConfig};
use hrag_core::orchestrator::RetrievalPolicy;
use hrag_core::{GraphReasoner, Orchestrator, VectorRetriever, WebFetcher};
use tracing::info;

use crate::graph::{TraversalReasoner, build_graph_store};
use crate::semantic::{Embedder, SemanticRetriever, VectorIndex, build_embedder};
use crate::web::NewsFetcher;

pub struct Backends {
    pub vector: Arc<dyn VectorRetriever>,
    pub graph: Arc<dyn GraphReasoner>,
    pub web: Arc<dyn WebFetcher>,
}

impl Backends {
    /// Build every adapter. Seed documents from config are loaded into the
    /// vector index; unchanged documents are skipped.
    ///
    /// # Errors
    ///
    /// Any initialization failure: embedder unreachable, index unopenable,
    /// malformed graph or web settings.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let embedder =
            build_embedder(&config.embedder).context("failed to initialize embedder")?;
        let index = Arc::new(open_index(&config.vector)?);
        seed_index(&index, embedder.as_ref(), &config.vector)?;

        let store = build_graph_store(&config.graph).context("failed to initialize graph store")?;
        let web = NewsFetcher::new(&config.web).context("failed to initialize web fetcher")?;

        Ok(Self {
            vector: Arc::new(SemanticRetriever::new(embedder, index)),
            graph: Arc::new(TraversalReasoner::new(store, config.graph.traversal.clone())),
            web: Arc::new(web),
        })
    }

    #[must_use]
    pub fn into_orchestrator(self, config: &AppConfig) -> Orchestrator {
        Orchestrator::new(
            self.vector,
            self.graph,
            self.web,
            RetrievalPolicy::from(&config.retrieval),
            &config.report,
        )
    }
}

/// The configured on-disk index, or a fresh in-memory one.
///
/// # Errors
///
/// Returns an error if the index file cannot be opened.
pub fn open_index(config: &VectorConfig) -> Result<VectorIndex> {
    match &config.db_path {
        Some(path) => VectorIndex::open(path),
        None => VectorIndex::open_in_memory(),
    }
}

fn seed_index(index: &VectorIndex, embedder: &dyn Embedder, config: &VectorConfig) -> Result<()> {
    if config.documents.is_empty() {
        return Ok(());
    }
    let stats = index
        .load_documents(embedder, &config.documents)
        .context("failed to seed vector index from config")?;
    info!(
        inserted = stats.inserted,
        unchanged = stats.unchanged,
        "seed documents ready"
    );
    Ok(())
}

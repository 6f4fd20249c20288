//! Contracts the orchestrator consumes. Each adapter is opaque to the others
//! and may fail independently.

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::model::{GraphRecord, Query};

/// Semantic document search.
#[async_trait]
pub trait VectorRetriever: Send + Sync {
    /// Up to `k` document texts, most similar first. An empty index yields an
    /// empty list, not an error.
    async fn search(&self, query: &Query, k: usize) -> Result<Vec<String>, RetrievalError>;
}

/// Fixed structured traversal over the graph store.
#[async_trait]
pub trait GraphReasoner: Send + Sync {
    /// Rows of the configured traversal, at most five.
    async fn query_fixed(&self) -> Result<Vec<GraphRecord>, RetrievalError>;

    /// Relationship path shown next to the rows in the report.
    fn describe(&self) -> String;
}

/// Recent external headlines for a query.
#[async_trait]
pub trait WebFetcher: Send + Sync {
    /// At most five short snippets.
    async fn fetch_headlines(&self, query: &Query) -> Result<Vec<String>, RetrievalError>;
}

use std::sync::Arc;

use async_trait::async_trait;
use hrag_core::{Query, RetrievalError, VectorRetriever};
use tracing::debug;

use crate::semantic::index::VectorIndex;
use crate::semantic::model::{EmbedError, Embedder};

/// [`VectorRetriever`] over a [`VectorIndex`].
///
/// Embedding and SQLite work are blocking, so each search runs on the
/// blocking pool.
#[derive(Clone)]
pub struct SemanticRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
}

impl SemanticRetriever {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    fn search_blocking(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        let embedding = self.embedder.embed(query).map_err(|e| match e {
            EmbedError::Unavailable(_) => RetrievalError::EmbedderUnavailable(e.to_string()),
            other => RetrievalError::Failed(other.to_string()),
        })?;

        let hits = self
            .index
            .search(&self.embedder.model_id(), &embedding, k)
            .map_err(|e| RetrievalError::failed(&e))?;
        debug!(hits = hits.len(), "semantic search complete");
        Ok(hits.into_iter().map(|hit| hit.content).collect())
    }
}

#[async_trait]
impl VectorRetriever for SemanticRetriever {
    async fn search(&self, query: &Query, k: usize) -> Result<Vec<String>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let this = self.clone();
        let text = query.as_str().to_owned();
        tokio::task::spawn_blocking(move || this.search_blocking(&text, k))
            .await
            .map_err(|e| RetrievalError::Failed(format!("vector search task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::model::HashingEmbedder;
    use hrag_core::config::SeedDocument;

    struct Down;

    impl Embedder for Down {
        fn model_id(&self) -> String {
            "down".into()
        }
        fn dimension(&self) -> usize {
            4
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn empty_index_is_not_an_error() {
        let retriever = SemanticRetriever::new(
            Arc::new(HashingEmbedder::new(32).expect("embedder")),
            Arc::new(VectorIndex::open_in_memory().expect("index")),
        );
        let query = Query::parse("5G churn").expect("query");
        assert!(retriever.search(&query, 3).await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn unreachable_embedder_is_transient() {
        let retriever = SemanticRetriever::new(
            Arc::new(Down),
            Arc::new(VectorIndex::open_in_memory().expect("index")),
        );
        let query = Query::parse("5G churn").expect("query");
        let err = retriever.search(&query, 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbedderUnavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn returns_at_most_k_texts() {
        let embedder = Arc::new(HashingEmbedder::new(64).expect("embedder"));
        let index = Arc::new(VectorIndex::open_in_memory().expect("index"));
        let docs: Vec<SeedDocument> = (0..6)
            .map(|i| SeedDocument {
                id: format!("d{i}"),
                text: format!("plan {i} churn report"),
            })
            .collect();
        index.load_documents(embedder.as_ref(), &docs).expect("load");

        let retriever = SemanticRetriever::new(embedder, index);
        let query = Query::parse("churn").expect("query");
        assert_eq!(retriever.search(&query, 3).await.expect("search").len(), 3);
        assert!(retriever.search(&query, 0).await.expect("search").is_empty());
    }
}

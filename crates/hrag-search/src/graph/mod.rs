//! Graph reasoning over a fixed relationship traversal.
//!
//! A [`GraphStore`] executes one [`GraphTraversal`]; the
//! [`TraversalReasoner`] adapts any store to [`GraphReasoner`], running it
//! on the blocking pool and capping the row count.

pub mod memory;
pub mod neo4j;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use hrag_core::config::{GraphBackend, GraphConfig, GraphTraversal};
use hrag_core::{GraphReasoner, GraphRecord, RetrievalError};
use tracing::debug;

pub use memory::InMemoryGraph;
pub use neo4j::Neo4jStore;

/// Blocking executor for the configured traversal.
pub trait GraphStore: Send + Sync {
    /// Rows for `traversal`, keyed by its aliases.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::GraphUnavailable`] when the store cannot be reached;
    /// other variants for rejected or malformed responses.
    fn run_traversal(&self, traversal: &GraphTraversal) -> Result<Vec<GraphRecord>, RetrievalError>;
}

/// Build the store named by config.
///
/// # Errors
///
/// Returns an error for an invalid traversal or endpoint.
pub fn build_graph_store(config: &GraphConfig) -> Result<Arc<dyn GraphStore>> {
    config.traversal.validate()?;
    match config.backend {
        GraphBackend::Neo4j => Ok(Arc::new(Neo4jStore::new(config)?)),
        GraphBackend::Memory => Ok(Arc::new(InMemoryGraph::from_subscriptions(
            &config.traversal,
            &config.subscriptions,
        ))),
    }
}

#[derive(Clone)]
pub struct TraversalReasoner {
    store: Arc<dyn GraphStore>,
    traversal: Arc<GraphTraversal>,
}

impl TraversalReasoner {
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>, traversal: GraphTraversal) -> Self {
        Self {
            store,
            traversal: Arc::new(traversal),
        }
    }
}

#[async_trait]
impl GraphReasoner for TraversalReasoner {
    async fn query_fixed(&self) -> Result<Vec<GraphRecord>, RetrievalError> {
        let store = Arc::clone(&self.store);
        let traversal = Arc::clone(&self.traversal);
        let mut rows = tokio::task::spawn_blocking(move || store.run_traversal(&traversal))
            .await
            .map_err(|e| RetrievalError::Failed(format!("graph query task failed: {e}")))??;

        rows.truncate(self.traversal.effective_limit());
        debug!(rows = rows.len(), "graph traversal complete");
        Ok(rows)
    }

    fn describe(&self) -> String {
        self.traversal.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrag_core::config::SeedSubscription;

    struct Unreachable;

    impl GraphStore for Unreachable {
        fn run_traversal(&self, _: &GraphTraversal) -> Result<Vec<GraphRecord>, RetrievalError> {
            Err(RetrievalError::GraphUnavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn reasoner_caps_rows_at_limit() {
        let subs: Vec<SeedSubscription> = (0..9)
            .map(|i| SeedSubscription {
                customer: format!("C-{i}"),
                plan: "Basic".into(),
            })
            .collect();
        let traversal = GraphTraversal::default();
        let store = InMemoryGraph::from_subscriptions(&traversal, &subs);
        let reasoner = TraversalReasoner::new(Arc::new(store), traversal);

        let rows = reasoner.query_fixed().await.expect("rows");
        assert_eq!(rows.len(), 5);
        assert_eq!(reasoner.describe(), "Customer -> SUBSCRIBED_TO -> Plan");
    }

    #[tokio::test]
    async fn store_errors_pass_through() {
        let reasoner = TraversalReasoner::new(Arc::new(Unreachable), GraphTraversal::default());
        let err = reasoner.query_fixed().await.unwrap_err();
        assert!(matches!(err, RetrievalError::GraphUnavailable(_)));
    }

    #[test]
    fn invalid_traversal_is_rejected_at_build() {
        let mut config = GraphConfig {
            backend: GraphBackend::Memory,
            ..GraphConfig::default()
        };
        config.traversal.relationship = "SUBSCRIBED_TO]->(x) DETACH DELETE x //".into();
        assert!(build_graph_store(&config).is_err());
    }
}

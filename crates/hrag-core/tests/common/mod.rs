//! Scriptable retrieval adapters shared by the integration suites.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hrag_core::config::ReportConfig;
use hrag_core::{
    GraphReasoner, GraphRecord, Orchestrator, Query, RetrievalError, RetrievalPolicy,
    VectorRetriever, WebFetcher,
};

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Return canned evidence.
    Ok,
    /// Return an empty result set.
    Empty,
    /// Fail every call with this error.
    Fail(RetrievalError),
    /// Never resolve.
    Hang,
}

/// One adapter that can stand in for any of the three sources.
#[derive(Debug)]
pub struct MockSource {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::new(Behavior::Ok)
    }

    pub fn failing(err: RetrievalError) -> Arc<Self> {
        Self::new(Behavior::Fail(err))
    }

    pub fn hanging() -> Arc<Self> {
        Self::new(Behavior::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond<T>(&self, canned: Vec<T>) -> Result<Vec<T>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Ok => Ok(canned),
            Behavior::Empty => Ok(Vec::new()),
            Behavior::Fail(err) => Err(err.clone()),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl VectorRetriever for MockSource {
    async fn search(&self, _query: &Query, k: usize) -> Result<Vec<String>, RetrievalError> {
        let docs = vec![
            "High churn observed in 5G premium plans in metro regions.".to_string(),
            "ARPU increased by 12% after bundled OTT offerings.".to_string(),
            "Network congestion in Mumbai due to spectrum constraints.".to_string(),
        ];
        self.respond(docs.into_iter().take(k).collect()).await
    }
}

#[async_trait]
impl GraphReasoner for MockSource {
    async fn query_fixed(&self) -> Result<Vec<GraphRecord>, RetrievalError> {
        let records = (1..=3)
            .map(|i| {
                GraphRecord::new()
                    .with("customer", format!("C-{i}"))
                    .with("plan", "5G Premium")
            })
            .collect();
        self.respond(records).await
    }

    fn describe(&self) -> String {
        "Customer -> SUBSCRIBED_TO -> Plan".to_string()
    }
}

#[async_trait]
impl WebFetcher for MockSource {
    async fn fetch_headlines(&self, _query: &Query) -> Result<Vec<String>, RetrievalError> {
        self.respond(vec![
            "Regulator opens consultation on spectrum pricing".to_string(),
            "Operator reports subscriber growth in prepaid segment".to_string(),
        ])
        .await
    }
}

pub fn fast_policy(timeout: Duration) -> RetrievalPolicy {
    RetrievalPolicy {
        timeout,
        retries: 1,
        retry_backoff: Duration::from_millis(5),
        top_k: 3,
    }
}

pub fn build(
    vector: &Arc<MockSource>,
    graph: &Arc<MockSource>,
    web: &Arc<MockSource>,
    policy: RetrievalPolicy,
) -> Orchestrator {
    Orchestrator::new(
        vector.clone(),
        graph.clone(),
        web.clone(),
        policy,
        &ReportConfig::default(),
    )
}

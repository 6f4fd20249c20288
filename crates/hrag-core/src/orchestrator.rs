//! Fan-out over the three retrieval sources and fan-in into one report.
//!
//! The orchestrator intentionally degrades gracefully:
//! - all three retrievals are dispatched together and awaited together
//! - each source gets one deadline covering its first attempt, the backoff,
//!   and a single retry on transient (connection/network) failure
//! - a source that fails or runs past its deadline becomes a `failed` or
//!   `timed_out` item; the run itself still completes
//!
//! Only an invalid query, a cancelled run, or a malformed bundle aborts.
//! Dropping the run future drops every outstanding retrieval with it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::{MAX_GRAPH_RECORDS, MAX_HEADLINES, ReportConfig, RetrievalConfig};
use crate::error::{RetrievalError, RunError};
use crate::events::{NoopSink, ProgressEvent, ProgressSink};
use crate::model::{EvidenceBundle, EvidenceItem, EvidencePayload, Query, Source};
use crate::report::{Report, ReportAssembler};
use crate::retriever::{GraphReasoner, VectorRetriever, WebFetcher};

/// Timing and sizing knobs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalPolicy {
    /// Ceiling per source, retry included.
    pub timeout: Duration,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    pub retry_backoff: Duration,
    /// Documents requested from the vector source.
    pub top_k: usize,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrievalPolicy {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            timeout: config.timeout(),
            retries: config.retries,
            retry_backoff: config.retry_backoff(),
            top_k: config.top_k,
        }
    }
}

/// Report together with the evidence it was built from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RunOutcome {
    pub report: Report,
    pub evidence: EvidenceBundle,
}

pub struct Orchestrator {
    vector: Arc<dyn VectorRetriever>,
    graph: Arc<dyn GraphReasoner>,
    web: Arc<dyn WebFetcher>,
    policy: RetrievalPolicy,
    assembler: ReportAssembler,
    sink: Arc<dyn ProgressSink>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        vector: Arc<dyn VectorRetriever>,
        graph: Arc<dyn GraphReasoner>,
        web: Arc<dyn WebFetcher>,
        policy: RetrievalPolicy,
        report: &ReportConfig,
    ) -> Self {
        let assembler = ReportAssembler::new(report, graph.describe());
        Self {
            vector,
            graph,
            web,
            policy,
            assembler,
            sink: Arc::new(NoopSink),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run all three retrievals for `raw_query` and assemble the report.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidQuery`] before any retrieval when the query
    /// is blank. Per-source failures never surface here.
    pub async fn run_report(&self, raw_query: &str) -> Result<Report, RunError> {
        self.run(raw_query).await.map(|outcome| outcome.report)
    }

    /// Like [`Orchestrator::run_report`], abandoning every outstanding
    /// retrieval as soon as `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Cancelled`] when cancelled; no partial report is
    /// produced.
    pub async fn run_report_with_cancel(
        &self,
        raw_query: &str,
        cancel: &CancellationToken,
    ) -> Result<Report, RunError> {
        self.run_with_cancel(raw_query, cancel)
            .await
            .map(|outcome| outcome.report)
    }

    /// Cancellable run that also returns the evidence bundle.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::run`]; additionally [`RunError::Cancelled`].
    pub async fn run_with_cancel(
        &self,
        raw_query: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        let query = Query::parse(raw_query)?;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RunError::Cancelled),
            outcome = self.run_query(&query) => outcome,
        }
    }

    /// Run and return both the report and the evidence bundle.
    ///
    /// # Errors
    ///
    /// [`RunError::InvalidQuery`] for blank input;
    /// [`RunError::AssemblyContractViolation`] if an adapter result could not
    /// be slotted into the bundle.
    pub async fn run(&self, raw_query: &str) -> Result<RunOutcome, RunError> {
        let query = Query::parse(raw_query)?;
        self.run_query(&query).await
    }

    #[instrument(skip_all)]
    async fn run_query(&self, query: &Query) -> Result<RunOutcome, RunError> {
        self.sink.on_event(&ProgressEvent::RunStarted {
            query: query.as_str().to_owned(),
        });

        let evidence = self.gather(query).await?;
        let report = self.assembler.assemble(query, &evidence);

        self.sink.on_event(&ProgressEvent::RunFinished {
            confidence: report.confidence(),
        });
        Ok(RunOutcome { report, evidence })
    }

    /// Dispatch the three retrievals together and wait for all of them.
    ///
    /// # Errors
    ///
    /// Only a bundle contract violation, which indicates a bug.
    pub async fn gather(&self, query: &Query) -> Result<EvidenceBundle, RunError> {
        let k = self.policy.top_k;

        let (vector, graph, web) = tokio::join!(
            self.retrieve(Source::Vector, || async move {
                let mut docs = self.vector.search(query, k).await?;
                docs.truncate(k);
                Ok::<_, RetrievalError>(EvidencePayload::Documents(docs))
            }),
            self.retrieve(Source::Graph, || async move {
                let mut records = self.graph.query_fixed().await?;
                records.truncate(MAX_GRAPH_RECORDS);
                Ok::<_, RetrievalError>(EvidencePayload::Records(records))
            }),
            self.retrieve(Source::Web, || async move {
                let mut headlines = self.web.fetch_headlines(query).await?;
                headlines.truncate(MAX_HEADLINES);
                Ok::<_, RetrievalError>(EvidencePayload::Headlines(headlines))
            }),
        );

        EvidenceBundle::new(vector, graph, web)
    }

    async fn retrieve<F, Fut>(&self, source: Source, mut call: F) -> EvidenceItem
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<EvidencePayload, RetrievalError>>,
    {
        let started = Instant::now();
        let deadline = started + self.policy.timeout;
        let timed_out = RetrievalError::Timeout(self.policy.timeout);
        let mut attempt: u32 = 0;

        let item = loop {
            attempt += 1;
            self.sink
                .on_event(&ProgressEvent::AttemptStarted { source, attempt });

            let outcome = timeout_at(deadline, call())
                .await
                .unwrap_or_else(|_| Err(timed_out.clone()));

            match outcome {
                Ok(payload) => break EvidenceItem::from_payload(payload),
                Err(err) if err.is_transient() && attempt <= self.policy.retries => {
                    self.sink.on_event(&ProgressEvent::Retrying {
                        source,
                        attempt,
                        reason: err.to_string(),
                    });
                    if timeout_at(deadline, sleep(self.policy.retry_backoff))
                        .await
                        .is_err()
                    {
                        break EvidenceItem::from_error(source, &timed_out);
                    }
                }
                Err(err) => break EvidenceItem::from_error(source, &err),
            }
        };

        let elapsed = started.elapsed();
        self.sink.on_event(&ProgressEvent::SourceFinished {
            source,
            status: item.status(),
            elapsed,
        });
        item.with_timing(attempt, elapsed)
    }
}

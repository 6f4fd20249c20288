//! Evidence model shared by the orchestrator, the adapters, and the report
//! assembler.
//!
//! # Invariants
//!
//! - A [`Query`] is never empty or whitespace-only.
//! - An [`EvidenceItem`]'s payload shape always matches its [`Source`].
//! - An [`EvidenceBundle`] holds exactly one item per source; a failing source
//!   is represented by a `failed`/`timed_out` item, never by absence.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, RetrievalError, RunError};

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Validated free-text query for one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    /// Validate caller input. Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidQuery`] for empty or whitespace-only input.
    pub fn parse(raw: &str) -> Result<Self, RunError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RunError::InvalidQuery(
                "query must contain non-whitespace text".into(),
            ));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Source / status
// ---------------------------------------------------------------------------

/// Retrieval subsystem that produced an evidence item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Vector,
    Graph,
    Web,
}

impl Source {
    pub const ALL: [Self; 3] = [Self::Vector, Self::Graph, Self::Web];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Graph => "graph",
            Self::Web => "web",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    Ok,
    Empty,
    Failed,
    TimedOut,
}

impl EvidenceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Empty => "empty",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for EvidenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// One row of the fixed graph traversal, keyed by column alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphRecord(BTreeMap<String, serde_json::Value>);

impl GraphRecord {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GraphRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (field, value)) in self.0.iter().enumerate() {
            if idx != 0 {
                f.write_str(", ")?;
            }
            match value {
                serde_json::Value::String(s) => write!(f, "{field}={s}")?,
                other => write!(f, "{field}={other}")?,
            }
        }
        Ok(())
    }
}

/// Normalized retrieval output. The variant is fixed by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum EvidencePayload {
    /// Matched document texts, most similar first.
    Documents(Vec<String>),
    /// Graph traversal rows in store order.
    Records(Vec<GraphRecord>),
    /// Headline strings in page order.
    Headlines(Vec<String>),
}

impl EvidencePayload {
    #[must_use]
    pub const fn empty_for(source: Source) -> Self {
        match source {
            Source::Vector => Self::Documents(Vec::new()),
            Source::Graph => Self::Records(Vec::new()),
            Source::Web => Self::Headlines(Vec::new()),
        }
    }

    #[must_use]
    pub const fn source(&self) -> Source {
        match self {
            Self::Documents(_) => Source::Vector,
            Self::Records(_) => Source::Graph,
            Self::Headlines(_) => Source::Web,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Documents(v) | Self::Headlines(v) => v.len(),
            Self::Records(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text lines suitable for signal matching (documents and headlines).
    #[must_use]
    pub fn texts(&self) -> &[String] {
        match self {
            Self::Documents(v) | Self::Headlines(v) => v,
            Self::Records(_) => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// EvidenceItem
// ---------------------------------------------------------------------------

/// Normalized result of one source for one run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceItem {
    source: Source,
    status: EvidenceStatus,
    payload: EvidencePayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    /// `E####` code of the error behind a `failed` or `timed_out` item.
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
    attempts: u32,
    elapsed_ms: u64,
}

impl EvidenceItem {
    /// Successful retrieval. An empty payload is recorded as `empty`.
    #[must_use]
    pub fn from_payload(payload: EvidencePayload) -> Self {
        let status = if payload.is_empty() {
            EvidenceStatus::Empty
        } else {
            EvidenceStatus::Ok
        };
        Self {
            source: payload.source(),
            status,
            payload,
            reason: None,
            error_code: None,
            attempts: 1,
            elapsed_ms: 0,
        }
    }

    /// Failed retrieval; a timeout is recorded as `timed_out`.
    #[must_use]
    pub fn from_error(source: Source, err: &RetrievalError) -> Self {
        let status = if matches!(err, RetrievalError::Timeout(_)) {
            EvidenceStatus::TimedOut
        } else {
            EvidenceStatus::Failed
        };
        Self {
            source,
            status,
            payload: EvidencePayload::empty_for(source),
            reason: Some(err.to_string()),
            error_code: Some(err.code()),
            attempts: 1,
            elapsed_ms: 0,
        }
    }

    #[must_use]
    pub fn with_timing(mut self, attempts: u32, elapsed: Duration) -> Self {
        self.attempts = attempts;
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    #[must_use]
    pub const fn status(&self) -> EvidenceStatus {
        self.status
    }

    #[must_use]
    pub const fn payload(&self) -> &EvidencePayload {
        &self.payload
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[must_use]
    pub const fn error_code(&self) -> Option<ErrorCode> {
        self.error_code
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub const fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == EvidenceStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// EvidenceBundle
// ---------------------------------------------------------------------------

/// Exactly one evidence item per source for a single query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceBundle {
    vector: EvidenceItem,
    graph: EvidenceItem,
    web: EvidenceItem,
}

impl EvidenceBundle {
    /// Build a bundle from per-slot items.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::AssemblyContractViolation`] when an item sits in
    /// the wrong slot or its payload shape does not match its source.
    pub fn new(
        vector: EvidenceItem,
        graph: EvidenceItem,
        web: EvidenceItem,
    ) -> Result<Self, RunError> {
        for (slot, item) in [
            (Source::Vector, &vector),
            (Source::Graph, &graph),
            (Source::Web, &web),
        ] {
            check_item(slot, item)?;
        }
        Ok(Self { vector, graph, web })
    }

    /// Build a bundle from unordered items, one per source.
    ///
    /// # Errors
    ///
    /// Fails when a source is duplicated or missing.
    pub fn from_items(items: impl IntoIterator<Item = EvidenceItem>) -> Result<Self, RunError> {
        let mut slots: BTreeMap<Source, EvidenceItem> = BTreeMap::new();
        for item in items {
            let source = item.source();
            if slots.insert(source, item).is_some() {
                return Err(RunError::DuplicateSource(source));
            }
        }

        let mut take = |source: Source| {
            slots.remove(&source).ok_or_else(|| {
                RunError::AssemblyContractViolation(format!("missing evidence for {source}"))
            })
        };
        let vector = take(Source::Vector)?;
        let graph = take(Source::Graph)?;
        let web = take(Source::Web)?;
        Self::new(vector, graph, web)
    }

    #[must_use]
    pub const fn get(&self, source: Source) -> &EvidenceItem {
        match source {
            Source::Vector => &self.vector,
            Source::Graph => &self.graph,
            Source::Web => &self.web,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &EvidenceItem> {
        [&self.vector, &self.graph, &self.web].into_iter()
    }

    /// Number of sources whose status is `ok`.
    #[must_use]
    pub fn ok_count(&self) -> usize {
        self.items().filter(|item| item.is_ok()).count()
    }
}

fn check_item(slot: Source, item: &EvidenceItem) -> Result<(), RunError> {
    if item.source() != slot {
        return Err(RunError::AssemblyContractViolation(format!(
            "{} evidence placed in the {slot} slot",
            item.source()
        )));
    }
    if item.payload().source() != slot {
        return Err(RunError::AssemblyContractViolation(format!(
            "{slot} evidence carries a {} payload",
            item.payload().source()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> EvidencePayload {
        EvidencePayload::Documents(texts.iter().map(|t| (*t).to_owned()).collect())
    }

    #[test]
    fn query_rejects_blank_input() {
        assert!(matches!(Query::parse(""), Err(RunError::InvalidQuery(_))));
        assert!(matches!(
            Query::parse(" \t\n "),
            Err(RunError::InvalidQuery(_))
        ));
    }

    #[test]
    fn query_trims_surrounding_whitespace() {
        let q = Query::parse("  churn in 5G plans \n").expect("valid query");
        assert_eq!(q.as_str(), "churn in 5G plans");
    }

    #[test]
    fn empty_payload_is_recorded_as_empty() {
        let item = EvidenceItem::from_payload(docs(&[]));
        assert_eq!(item.status(), EvidenceStatus::Empty);
        assert_eq!(item.source(), Source::Vector);
    }

    #[test]
    fn timeout_error_is_recorded_as_timed_out() {
        let err = RetrievalError::Timeout(Duration::from_millis(50));
        let item = EvidenceItem::from_error(Source::Web, &err);
        assert_eq!(item.status(), EvidenceStatus::TimedOut);
        assert_eq!(item.payload(), &EvidencePayload::Headlines(Vec::new()));
        assert_eq!(item.reason(), Some("timed out after 50ms"));
        assert_eq!(item.error_code(), Some(ErrorCode::RetrievalTimeout));
    }

    #[test]
    fn failed_item_serializes_its_error_code() {
        let err = RetrievalError::FetchUnavailable("connection refused".into());
        let item = EvidenceItem::from_error(Source::Web, &err);
        let value = serde_json::to_value(&item).expect("serialize");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error_code"], "E2004");

        let ok = EvidenceItem::from_payload(docs(&["a"]));
        assert_eq!(ok.error_code(), None);
        let value = serde_json::to_value(&ok).expect("serialize");
        assert!(value.get("error_code").is_none());
    }

    #[test]
    fn bundle_rejects_misplaced_items() {
        let web = EvidenceItem::from_payload(EvidencePayload::Headlines(vec!["h".into()]));
        let err = EvidenceBundle::new(web.clone(), web.clone(), web).unwrap_err();
        assert!(matches!(err, RunError::AssemblyContractViolation(_)));
    }

    #[test]
    fn bundle_from_items_requires_each_source_once() {
        let vector = EvidenceItem::from_payload(docs(&["a"]));
        let graph = EvidenceItem::from_payload(EvidencePayload::Records(vec![]));

        let missing = EvidenceBundle::from_items([vector.clone(), graph.clone()]).unwrap_err();
        assert!(matches!(missing, RunError::AssemblyContractViolation(_)));

        let dup = EvidenceBundle::from_items([vector.clone(), vector, graph]).unwrap_err();
        assert_eq!(dup, RunError::DuplicateSource(Source::Vector));
    }

    #[test]
    fn bundle_counts_ok_sources() {
        let bundle = EvidenceBundle::from_items([
            EvidenceItem::from_error(Source::Web, &RetrievalError::Parse("x".into())),
            EvidenceItem::from_payload(docs(&["a"])),
            EvidenceItem::from_payload(EvidencePayload::Records(vec![
                GraphRecord::new().with("customer", "C1"),
            ])),
        ])
        .expect("valid bundle");
        assert_eq!(bundle.ok_count(), 2);
        assert_eq!(bundle.get(Source::Web).status(), EvidenceStatus::Failed);
    }

    #[test]
    fn graph_record_display_is_stable() {
        let record = GraphRecord::new()
            .with("plan", "5G Premium")
            .with("customer", "C-104");
        assert_eq!(record.to_string(), "customer=C-104, plan=5G Premium");
    }
}

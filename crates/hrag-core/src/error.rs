use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::model::Source;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidQuery,
    ConfigParseError,
    InitializationFailed,
    RetrievalTimeout,
    RetrievalFailed,
    GraphUnavailable,
    FetchUnavailable,
    ParseError,
    EmbedderUnavailable,
    AssemblyContractViolation,
    Cancelled,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidQuery => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InitializationFailed => "E1003",
            Self::RetrievalTimeout => "E2001",
            Self::RetrievalFailed => "E2002",
            Self::GraphUnavailable => "E2003",
            Self::FetchUnavailable => "E2004",
            Self::ParseError => "E2005",
            Self::EmbedderUnavailable => "E2006",
            Self::AssemblyContractViolation => "E3001",
            Self::Cancelled => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidQuery => "Invalid query",
            Self::ConfigParseError => "Config file parse error",
            Self::InitializationFailed => "Initialization failed",
            Self::RetrievalTimeout => "Retrieval timed out",
            Self::RetrievalFailed => "Retrieval failed",
            Self::GraphUnavailable => "Graph store unavailable",
            Self::FetchUnavailable => "Web search unavailable",
            Self::ParseError => "Web response could not be parsed",
            Self::EmbedderUnavailable => "Embedding backend unavailable",
            Self::AssemblyContractViolation => "Malformed evidence bundle",
            Self::Cancelled => "Run cancelled",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidQuery => Some("Provide a non-empty query."),
            Self::ConfigParseError => Some("Fix syntax in hrag.toml and retry."),
            Self::InitializationFailed => {
                Some("Check the [embedder] settings or switch to the `hashing` backend.")
            }
            Self::RetrievalTimeout => Some("Raise [retrieval] timeout_ms or check backend latency."),
            Self::RetrievalFailed => None,
            Self::GraphUnavailable => {
                Some("Verify NEO4J_URI, NEO4J_USER and NEO4J_PASSWORD and that the store is up.")
            }
            Self::FetchUnavailable => Some("Check network access to the [web] endpoint."),
            Self::ParseError => None,
            Self::EmbedderUnavailable => Some("Check that the embedding service is running."),
            Self::AssemblyContractViolation => {
                Some("This is a bug: report it with the logged evidence bundle.")
            }
            Self::Cancelled => None,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure of a single retrieval source.
///
/// These never abort a run: the orchestrator folds them into a `failed` or
/// `timed_out` evidence item for the source that produced them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetrievalError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("graph store unavailable: {0}")]
    GraphUnavailable(String),

    #[error("web search unavailable: {0}")]
    FetchUnavailable(String),

    #[error("could not parse web response: {0}")]
    Parse(String),

    #[error("embedding backend unavailable: {0}")]
    EmbedderUnavailable(String),

    #[error("{0}")]
    Failed(String),
}

impl RetrievalError {
    /// Connection and network failures are worth one more attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::GraphUnavailable(_) | Self::FetchUnavailable(_) | Self::EmbedderUnavailable(_)
        )
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout(_) => ErrorCode::RetrievalTimeout,
            Self::GraphUnavailable(_) => ErrorCode::GraphUnavailable,
            Self::FetchUnavailable(_) => ErrorCode::FetchUnavailable,
            Self::Parse(_) => ErrorCode::ParseError,
            Self::EmbedderUnavailable(_) => ErrorCode::EmbedderUnavailable,
            Self::Failed(_) => ErrorCode::RetrievalFailed,
        }
    }

    /// Wrap an `anyhow` chain from a backend as a non-transient failure.
    pub fn failed(err: &anyhow::Error) -> Self {
        Self::Failed(format!("{err:#}"))
    }
}

/// Errors that abort a whole report run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("evidence bundle violates assembly contract: {0}")]
    AssemblyContractViolation(String),

    #[error("duplicate evidence for source {0}")]
    DuplicateSource(Source),

    #[error("run cancelled before the report was assembled")]
    Cancelled,

    #[error("initialization failed: {0}")]
    Initialization(String),
}

impl RunError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidQuery(_) => ErrorCode::InvalidQuery,
            Self::AssemblyContractViolation(_) | Self::DuplicateSource(_) => {
                ErrorCode::AssemblyContractViolation
            }
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Initialization(_) => ErrorCode::InitializationFailed,
        }
    }
}

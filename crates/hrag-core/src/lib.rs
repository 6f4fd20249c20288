#![forbid(unsafe_code)]
//! hrag-core library.
//!
//! Evidence model, retrieval contracts, orchestration, and report assembly.
//! Concrete backends live in `hrag-search`.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at the run/adapter boundary
//!   ([`error::RunError`], [`error::RetrievalError`]); `anyhow::Result` for
//!   configuration and administrative paths.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//!   Never log credentials; see [`config::Secret`].

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod retriever;

pub use error::{ErrorCode, RetrievalError, RunError};
pub use model::{EvidenceBundle, EvidenceItem, EvidencePayload, EvidenceStatus, GraphRecord, Query, Source};
pub use orchestrator::{Orchestrator, RetrievalPolicy, RunOutcome};
pub use report::{Confidence, Report, ReportAssembler, Section, SectionKind};
pub use retriever::{GraphReasoner, VectorRetriever, WebFetcher};

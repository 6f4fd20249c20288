#![forbid(unsafe_code)]
//! hrag-search library.
//!
//! Concrete retrieval backends for the hrag orchestrator:
//!
//! - [`semantic`]: embedders, the SQLite vector index, and the vector retriever.
//! - [`graph`]: the fixed-traversal reasoner over Neo4j or an in-memory graph.
//! - [`web`]: the news headline fetcher.
//! - [`backends`]: wiring all three from configuration.

pub mod backends;
pub mod graph;
pub mod semantic;
pub mod web;

pub use backends::{Backends, open_index};

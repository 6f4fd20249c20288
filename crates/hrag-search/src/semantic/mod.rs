//! Semantic retrieval: embedders, the SQLite vector index, and the
//! [`hrag_core::VectorRetriever`] built on them.

pub mod index;
pub mod model;
pub mod retriever;
pub mod search;

pub use index::{LoadStats, VectorIndex};
pub use model::{EmbedError, Embedder, HashingEmbedder, OllamaEmbedder, build_embedder};
pub use retriever::SemanticRetriever;
pub use search::{ScoredDocument, cosine_similarity, knn_search};

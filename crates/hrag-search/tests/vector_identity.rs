//! Vector retrieval over the shipped telecom seed documents.
//!
//! A document's own text must rank that document first, and a fresh or
//! empty index must answer with nothing rather than an error.

use std::sync::Arc;

use hrag_core::config::SeedDocument;
use hrag_core::{Query, VectorRetriever};
use hrag_search::semantic::{HashingEmbedder, SemanticRetriever, VectorIndex};

const SEED: [(&str, &str); 3] = [
    ("1", "High churn observed in 5G premium plans in metro regions."),
    ("2", "ARPU increased by 12% after bundled OTT offerings."),
    ("3", "Network congestion in Mumbai due to spectrum constraints."),
];

fn seed_documents() -> Vec<SeedDocument> {
    SEED.iter()
        .map(|(id, text)| SeedDocument {
            id: (*id).to_owned(),
            text: (*text).to_owned(),
        })
        .collect()
}

fn retriever_with(index: VectorIndex) -> SemanticRetriever {
    let embedder = Arc::new(HashingEmbedder::new(384).expect("embedder"));
    index
        .load_documents(embedder.as_ref(), &seed_documents())
        .expect("load");
    SemanticRetriever::new(embedder, Arc::new(index))
}

#[tokio::test]
async fn own_text_ranks_first() {
    let retriever = retriever_with(VectorIndex::open_in_memory().expect("index"));
    for (_, text) in SEED {
        let query = Query::parse(text).expect("query");
        let results = retriever.search(&query, 3).await.expect("search");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], text);
    }
}

#[tokio::test]
async fn topical_query_finds_matching_document() {
    let retriever = retriever_with(VectorIndex::open_in_memory().expect("index"));
    let query = Query::parse("spectrum congestion Mumbai").expect("query");
    let results = retriever.search(&query, 1).await.expect("search");
    assert_eq!(results, [SEED[2].1]);
}

#[tokio::test]
async fn on_disk_index_serves_after_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("vectors.db");
    drop(retriever_with(VectorIndex::open(&path).expect("open")));

    let reopened = VectorIndex::open(&path).expect("reopen");
    assert_eq!(reopened.len().expect("len"), 3);

    let retriever = SemanticRetriever::new(
        Arc::new(HashingEmbedder::new(384).expect("embedder")),
        Arc::new(reopened),
    );
    let query = Query::parse(SEED[1].1).expect("query");
    let results = retriever.search(&query, 3).await.expect("search");
    assert_eq!(results[0], SEED[1].1);
}

#[tokio::test]
async fn empty_index_returns_empty_list() {
    let retriever = SemanticRetriever::new(
        Arc::new(HashingEmbedder::new(384).expect("embedder")),
        Arc::new(VectorIndex::open_in_memory().expect("index")),
    );
    let query = Query::parse("anything").expect("query");
    assert!(retriever.search(&query, 3).await.expect("search").is_empty());
}

//! Ollama embedder against a mocked embeddings service.

use hrag_search::semantic::{EmbedError, Embedder, OllamaEmbedder};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn service_with(embeddings: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(serde_json::json!({"model": "all-minilm"})))
        .respond_with(embeddings)
        .mount(&server)
        .await;
    server
}

/// Connect and embed one text off the async test thread.
async fn embed_once(server: &MockServer, dimension: usize) -> Result<Vec<f32>, EmbedError> {
    let base = server.uri();
    tokio::task::spawn_blocking(move || {
        let embedder = OllamaEmbedder::connect(&base, "all-minilm", dimension).expect("connect");
        assert_eq!(embedder.model_id(), "ollama:all-minilm");
        embedder.embed("5G churn in metro regions")
    })
    .await
    .expect("embed task")
}

#[tokio::test]
async fn embedding_is_returned_as_sent() {
    let server = service_with(
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({"embedding": [0.5, -0.25, 0.0, 1.0]})),
    )
    .await;

    let vector = embed_once(&server, 4).await.expect("embedding");
    assert_eq!(vector, [0.5, -0.25, 0.0, 1.0]);
}

#[tokio::test]
async fn wrong_dimension_is_rejected() {
    let server = service_with(
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"embedding": [0.1, 0.2]})),
    )
    .await;

    let err = embed_once(&server, 4).await.unwrap_err();
    assert!(
        matches!(err, EmbedError::Dimension { expected: 4, actual: 2 }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn server_errors_mean_unavailable() {
    let server = service_with(ResponseTemplate::new(503)).await;
    let err = embed_once(&server, 4).await.unwrap_err();
    assert!(matches!(err, EmbedError::Unavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn missing_model_is_rejected() {
    let server = service_with(ResponseTemplate::new(404)).await;
    let err = embed_once(&server, 4).await.unwrap_err();
    assert!(matches!(err, EmbedError::Rejected(_)), "got {err:?}");
}

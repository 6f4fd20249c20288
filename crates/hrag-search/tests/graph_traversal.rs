//! Graph reasoner integration tests.
//!
//! # Scenarios covered
//!
//! 1. **Row bound**: never more than five records, each carrying the
//!    traversal's aliased fields.
//! 2. **Neo4j wire behavior**: the fixed Cypher statement is posted with
//!    basic auth and the transaction is rolled back afterwards.
//! 3. **Neo4j failures**: server errors are transient, auth failures and
//!    statement errors are not, and credentials never leak into messages.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hrag_core::config::{AppConfig, GraphBackend, GraphConfig, GraphTraversal, SeedSubscription, Secret};
use hrag_core::{EvidenceStatus, GraphReasoner, RetrievalError, Source};
use hrag_search::Backends;
use hrag_search::graph::{GraphStore, InMemoryGraph, Neo4jStore, TraversalReasoner, build_graph_store};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PASSWORD: &str = "correct-horse-battery";

fn neo4j_config(uri: &str) -> GraphConfig {
    GraphConfig {
        backend: GraphBackend::Neo4j,
        uri: Some(uri.to_owned()),
        user: Some("neo4j".into()),
        password: Secret::new(PASSWORD),
        timeout_ms: 2_000,
        ..GraphConfig::default()
    }
}

fn basic_auth() -> String {
    format!("Basic {}", STANDARD.encode(format!("neo4j:{PASSWORD}")))
}

fn rows_body(n: usize) -> serde_json::Value {
    let data: Vec<serde_json::Value> = (0..n)
        .map(|i| serde_json::json!({"row": [format!("C-{i}"), format!("Plan {i}")], "meta": [null, null]}))
        .collect();
    serde_json::json!({
        "results": [{"columns": ["customer", "plan"], "data": data}],
        "errors": []
    })
}

/// Runs the blocking store call off the async test thread.
async fn traverse(server: &MockServer) -> Result<Vec<hrag_core::GraphRecord>, RetrievalError> {
    let store = Arc::new(Neo4jStore::new(&neo4j_config(&server.uri())).expect("store"));
    tokio::task::spawn_blocking(move || store.run_traversal(&GraphTraversal::default()))
        .await
        .expect("traversal task")
}

async fn mount_rollback(server: &MockServer, tx_path: &str) {
    Mock::given(method("DELETE"))
        .and(path(tx_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": [], "errors": []})))
        .expect(1)
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Scenario 1: row bound
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_backend_returns_at_most_five_records() {
    let config = GraphConfig {
        backend: GraphBackend::Memory,
        subscriptions: (0..12)
            .map(|i| SeedSubscription {
                customer: format!("C-{i:03}"),
                plan: if i % 2 == 0 { "5G Premium" } else { "Prepaid" }.into(),
            })
            .collect(),
        ..GraphConfig::default()
    };
    let store = build_graph_store(&config).expect("store");
    let reasoner = TraversalReasoner::new(store, config.traversal.clone());

    let rows = reasoner.query_fixed().await.expect("rows");
    assert_eq!(rows.len(), 5);
    for row in &rows {
        assert!(row.get("customer").is_some(), "missing customer in {row}");
        assert!(row.get("plan").is_some(), "missing plan in {row}");
    }
}

#[tokio::test]
async fn lower_configured_limit_is_honored() {
    let mut traversal = GraphTraversal::default();
    traversal.limit = 2;
    let subs: Vec<SeedSubscription> = (0..4)
        .map(|i| SeedSubscription {
            customer: format!("C-{i}"),
            plan: "Basic".into(),
        })
        .collect();
    let store = InMemoryGraph::from_subscriptions(&traversal, &subs);
    let reasoner = TraversalReasoner::new(Arc::new(store), traversal);
    assert_eq!(reasoner.query_fixed().await.expect("rows").len(), 2);
}

// ---------------------------------------------------------------------------
// Scenario 2: Neo4j wire behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn neo4j_posts_fixed_statement_and_rolls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/db/neo4j/tx"))
        .and(header("Authorization", basic_auth().as_str()))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Location", format!("{}/db/neo4j/tx/7", server.uri()).as_str())
                .set_body_json(rows_body(7)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_rollback(&server, "/db/neo4j/tx/7").await;

    let config = neo4j_config(&server.uri());
    let store = build_graph_store(&config).expect("store");
    let reasoner = TraversalReasoner::new(store, config.traversal.clone());

    let rows = reasoner.query_fixed().await.expect("rows");
    assert_eq!(rows.len(), 5, "reasoner caps rows even if the store over-returns");
    assert_eq!(rows[0].to_string(), "customer=C-0, plan=Plan 0");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2, "{requests:?}");

    let post = &requests[0];
    assert_eq!(post.method.as_str(), "POST");
    let body: serde_json::Value = serde_json::from_slice(&post.body).expect("json body");
    assert_eq!(
        body["statements"][0]["statement"],
        "MATCH (a:Customer)-[:SUBSCRIBED_TO]->(b:Plan) RETURN a.id AS customer, b.name AS plan LIMIT 5"
    );

    let rollback = &requests[1];
    assert_eq!(rollback.method.as_str(), "DELETE");
    assert_eq!(rollback.url.path(), "/db/neo4j/tx/7");
    assert_eq!(
        rollback.headers.get("Authorization").and_then(|v| v.to_str().ok()),
        Some(basic_auth().as_str())
    );
}

#[tokio::test]
async fn statement_errors_still_release_the_transaction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/db/neo4j/tx"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "results": [],
            "errors": [{"code": "Neo.ClientError.Statement.SyntaxError", "message": "bad"}],
            "commit": format!("{}/db/neo4j/tx/9/commit", server.uri()),
        })))
        .mount(&server)
        .await;
    mount_rollback(&server, "/db/neo4j/tx/9").await;

    let err = traverse(&server).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Failed(_)), "got {err:?}");

    let requests = server.received_requests().await.expect("recording enabled");
    let last = requests.last().expect("rollback request");
    assert_eq!(last.method.as_str(), "DELETE");
    assert_eq!(last.url.path(), "/db/neo4j/tx/9");
}

// ---------------------------------------------------------------------------
// Scenario 3: Neo4j failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = traverse(&server).await.unwrap_err();
    assert!(matches!(err, RetrievalError::GraphUnavailable(_)), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn rejected_credentials_fail_without_leaking_them() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "errors": [{"code": "Neo.ClientError.Security.Unauthorized", "message": "bad credentials"}]
        })))
        .mount(&server)
        .await;

    let err = traverse(&server).await.unwrap_err();
    assert!(!err.is_transient());
    let message = err.to_string();
    assert!(message.contains("credentials"));
    assert!(!message.contains(PASSWORD));
    assert!(!message.contains(&STANDARD.encode(format!("neo4j:{PASSWORD}"))));
}

#[tokio::test]
async fn missing_endpoint_costs_a_single_attempt() {
    let mut config = AppConfig::default();
    config.graph.uri = None;
    config.web.endpoint = "http://127.0.0.1:9/search".into();
    config.retrieval.retry_backoff_ms = 10;

    let orchestrator = Backends::from_config(&config)
        .expect("backends")
        .into_orchestrator(&config);
    let outcome = orchestrator.run("5G churn").await.expect("run completes");

    let graph = outcome.evidence.get(Source::Graph);
    assert_eq!(graph.status(), EvidenceStatus::Failed);
    assert_eq!(graph.attempts(), 1);
    assert!(graph.reason().is_some_and(|r| r.contains("NEO4J_URI")));
}

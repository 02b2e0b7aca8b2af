//! HTTP transport end-to-end: session admission on `initialize`, the
//! missing/unknown session-id error paths, and TTL-based expiry (§4.8, §8
//! scenario 5). Binds a real axum server on an ephemeral loopback port.

use litgraph::aggregator::LiteratureAggregator;
use litgraph::config::{IngestionConfig, LitgraphConfig, SessionMode};
use litgraph::fetch::PacingFetcher;
use litgraph::ingestion::IngestionEngine;
use litgraph::mcp::http::{build_router, HttpState, SESSION_HEADER};
use litgraph::mcp::session::SessionManager;
use litgraph::mcp::tools::ToolRegistry;
use litgraph::model::ProviderTag;
use litgraph::providers::scholar::ScholarProvider;
use litgraph::providers::SourceProvider;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

async fn spawn_server(config: LitgraphConfig) -> SocketAddr {
    let config = Arc::new(config);
    let providers: HashMap<ProviderTag, Arc<dyn SourceProvider>> = HashMap::new();
    let aggregator = Arc::new(LiteratureAggregator::new(providers, ProviderTag::C, Duration::from_secs(60), 64, 2.0, 0.82));
    let ingestion = IngestionEngine::new(
        aggregator.clone(),
        Arc::new(PacingFetcher::new("ingestion")),
        IngestionConfig { allow_remote_pdfs: false, allow_local_pdfs: true, structured_parser_url: None },
    );
    let scholar = Arc::new(ScholarProvider::new("https://scholar.example", Arc::new(PacingFetcher::new("D"))));
    let tools = Arc::new(ToolRegistry::new(aggregator, ingestion, scholar));
    let sessions = Arc::new(SessionManager::new(Duration::from_millis(config.session.session_ttl_ms), config.session.max_sessions));

    let state = HttpState { tools, sessions, config: config.clone() };
    let router = build_router(state);
    let bind_addr = format!("{}:0", config.transport.host);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn stateful_config(ttl_ms: u64) -> LitgraphConfig {
    let mut config = LitgraphConfig::default();
    config.session.mode = SessionMode::Stateful;
    config.session.session_ttl_ms = ttl_ms;
    config.transport.host = "127.0.0.1".to_string();
    config
}

#[tokio::test]
async fn initialize_without_session_header_issues_a_new_session() {
    let addr = spawn_server(stateful_config(60_000)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/mcp"))
        .json(&serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().get(SESSION_HEADER).is_some(), "initialize must issue a session id");
}

#[tokio::test]
async fn non_initialize_request_without_session_id_is_rejected() {
    let addr = spawn_server(stateful_config(60_000)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/mcp"))
        .json(&serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {} }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_session_id_is_rejected_with_404() {
    let addr = spawn_server(stateful_config(60_000)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/mcp"))
        .header(SESSION_HEADER, "not-a-real-session")
        .json(&serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {} }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

/// A session created with a 250ms TTL must be gone by the time a later
/// request arrives after that window, even though it was valid moments
/// before.
#[tokio::test]
async fn expired_session_is_pruned_on_the_next_request() {
    let addr = spawn_server(stateful_config(250)).await;
    let client = reqwest::Client::new();

    let init = client
        .post(format!("http://{addr}/mcp"))
        .json(&serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }))
        .send()
        .await
        .unwrap();
    let session_id = init.headers().get(SESSION_HEADER).unwrap().to_str().unwrap().to_string();

    let immediate = client
        .post(format!("http://{addr}/mcp"))
        .header(SESSION_HEADER, session_id.clone())
        .json(&serde_json::json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(immediate.status(), 200, "session should still be valid right after creation");

    tokio::time::sleep(Duration::from_millis(400)).await;

    let after_ttl = client
        .post(format!("http://{addr}/mcp"))
        .header(SESSION_HEADER, session_id)
        .json(&serde_json::json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/list", "params": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(after_ttl.status(), 404, "session must have been pruned once its TTL elapsed");
}

#[tokio::test]
async fn non_loopback_host_header_is_rejected() {
    let addr = spawn_server(stateful_config(60_000)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/mcp"))
        .header(reqwest::header::HOST, "evil.example.com")
        .json(&serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let addr = spawn_server(stateful_config(60_000)).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("http://{addr}/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

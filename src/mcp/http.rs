//! HTTP transport (C8): a single configurable endpoint accepting
//! GET/POST/DELETE/OPTIONS, plus a health endpoint (§6). Session admission,
//! TTL pruning, and LRU eviction are delegated to `SessionManager`; host,
//! origin, and bearer-token gating live in `crate::auth_middleware`.
//!
//! Simplification from the teacher's streaming transport: litgraph's tools
//! are short-lived request/response calls, not long-lived subscriptions, so
//! this transport drops the teacher's SSE/broadcast-channel server push in
//! favor of a plain JSON request/response cycle (documented in DESIGN.md).

use crate::config::{LitgraphConfig, SessionMode};
use crate::mcp::session::SessionManager;
use crate::mcp::tools::{self, ToolRegistry};
use crate::mcp::types::{error_codes, HealthCheckResponse, MCPError, MCPRequest, MCPResponse, RequestId};
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Clone)]
pub struct HttpState {
    pub tools: Arc<ToolRegistry>,
    pub sessions: Arc<SessionManager>,
    pub config: Arc<LitgraphConfig>,
}

pub fn build_router(state: HttpState) -> Router {
    let endpoint_path = state.config.transport.endpoint_path.clone();
    let health_path = state.config.transport.health_path.clone();

    Router::new()
        .route(
            &endpoint_path,
            get(mcp_get).post(mcp_post).delete(mcp_delete).options(mcp_options),
        )
        .route(&health_path, get(health))
        .layer(middleware::from_fn_with_state(state.clone(), crate::auth_middleware::auth_middleware))
        .with_state(state)
}

fn json_rpc_error(status: StatusCode, id: Option<RequestId>, error: MCPError) -> Response {
    (status, Json(MCPResponse::failure(id, error))).into_response()
}

fn internal_error_response() -> Response {
    let body = json!({
        "jsonrpc": "2.0",
        "error": { "code": error_codes::INTERNAL_ERROR, "message": "Internal server error" },
        "id": Value::Null,
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Shared JSON-RPC method dispatch: `initialize`, `tools/list`,
/// `resources/list`, and `tools/call`. Used by both the HTTP transport and
/// the line transport (`mcp::line`) so the two never drift.
pub async fn dispatch(tools: &ToolRegistry, request: MCPRequest) -> MCPResponse {
    match request.method.as_str() {
        "initialize" => MCPResponse::success(
            request.id,
            json!({
                "protocolVersion": "2024-11-05",
                "serverInfo": { "name": "litgraph", "version": env!("CARGO_PKG_VERSION") },
                "capabilities": { "tools": {} },
            }),
        ),
        "tools/list" => MCPResponse::success(request.id, json!({ "tools": tools::get_all_tool_definitions() })),
        "resources/list" => MCPResponse::success(request.id, json!({ "resources": Vec::<Value>::new() })),
        "tools/call" => {
            let Some(name) = request.params.get("name").and_then(|v| v.as_str()) else {
                return MCPResponse::failure(request.id, MCPError::invalid_params("'name' is required"));
            };
            let args = request.params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            let result = tools.call(name, args).await;
            MCPResponse::success(request.id, result)
        }
        other => MCPResponse::failure(request.id, MCPError::method_not_found(other)),
    }
}

async fn mcp_post(State(state): State<HttpState>, req: Request) -> Response {
    let session_id_header =
        req.headers().get(SESSION_HEADER).and_then(|v| v.to_str().ok()).map(|s| s.to_string());

    let body = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return json_rpc_error(StatusCode::BAD_REQUEST, None, MCPError::invalid_request("failed to read body")),
    };
    let request: MCPRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return json_rpc_error(StatusCode::BAD_REQUEST, None, MCPError::parse_error(e.to_string())),
    };

    let mut assigned_session_id: Option<String> = None;
    if state.config.session.mode == SessionMode::Stateful {
        state.sessions.prune_expired();
        match session_id_header.as_deref() {
            None => {
                if request.method != "initialize" {
                    return json_rpc_error(
                        StatusCode::BAD_REQUEST,
                        request.id,
                        MCPError::invalid_request("missing session id on non-initialize request"),
                    );
                }
                let runtime = state.sessions.create_session();
                assigned_session_id = Some(runtime.session_id);
            }
            Some(id) => {
                if !state.sessions.touch(id) {
                    return json_rpc_error(
                        StatusCode::NOT_FOUND,
                        request.id,
                        MCPError { code: error_codes::SESSION_NOT_FOUND, message: "unknown session id".to_string(), data: None },
                    );
                }
            }
        }
    }

    let task_tools = state.tools.clone();
    let response_payload = match tokio::spawn(async move { dispatch(&task_tools, request).await }).await {
        Ok(response) => response,
        Err(join_err) => {
            tracing::error!(error = %join_err, "tool dispatch panicked");
            return internal_error_response();
        }
    };

    let mut response = Json(response_payload).into_response();
    if let Some(session_id) = assigned_session_id {
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

/// Simplified session-status probe (no SSE server push, see module docs).
async fn mcp_get(State(state): State<HttpState>, req: Request) -> Response {
    let session_id = req.headers().get(SESSION_HEADER).and_then(|v| v.to_str().ok());

    if state.config.session.mode != SessionMode::Stateful {
        return (StatusCode::OK, Json(json!({ "stateful": false }))).into_response();
    }

    state.sessions.prune_expired();
    match session_id {
        None => (StatusCode::OK, Json(json!({ "stateful": true, "open_sessions": state.sessions.len() }))).into_response(),
        Some(id) => match state.sessions.get(id) {
            Some(runtime) => (
                StatusCode::OK,
                Json(json!({ "stateful": true, "active": true, "session_id": runtime.session_id, "created_at": runtime.created_at })),
            )
                .into_response(),
            None => json_rpc_error(
                StatusCode::NOT_FOUND,
                None,
                MCPError { code: error_codes::SESSION_NOT_FOUND, message: "unknown session id".to_string(), data: None },
            ),
        },
    }
}

async fn mcp_delete(State(state): State<HttpState>, req: Request) -> Response {
    let session_id = req.headers().get(SESSION_HEADER).and_then(|v| v.to_str().ok());
    let closed = match session_id {
        Some(id) => state.sessions.remove(id),
        None => false,
    };
    (StatusCode::OK, Json(json!({ "closed": closed }))).into_response()
}

async fn mcp_options() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

async fn health(State(state): State<HttpState>) -> Response {
    let open_sessions = if state.config.session.mode == SessionMode::Stateful {
        state.sessions.prune_expired();
        state.sessions.len()
    } else {
        0
    };
    let body = HealthCheckResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        open_sessions,
    };
    (StatusCode::OK, Json(body)).into_response()
}

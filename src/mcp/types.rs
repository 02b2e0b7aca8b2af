//! Model Context Protocol envelope types: the JSON-RPC request/response
//! shapes shared by the line transport (C9 stdio) and the HTTP transport
//! (C8), plus the tool/resource catalog descriptors surfaced by
//! `tools/list` and `resources/list`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MCPError>,
}

impl MCPResponse {
    pub fn success(id: Option<RequestId>, result: serde_json::Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    pub fn failure(id: Option<RequestId>, error: MCPError) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: None, error: Some(error) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(u64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Tool descriptor surfaced by `tools/list` (§6 fixed ten-tool catalog).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Resource descriptor surfaced by `resources/list`. Litgraph exposes no
/// addressable resources beyond tool calls; kept for protocol completeness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: Option<String>,
}

/// Health endpoint payload (§6): status, version, and the current open
/// session count so operators can watch C8's admission pressure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub open_sessions: usize,
}

pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const UNAUTHORIZED: i32 = -32001;
    pub const FORBIDDEN: i32 = -32002;
    pub const SESSION_NOT_FOUND: i32 = -32003;
}

impl MCPError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self { code: error_codes::PARSE_ERROR, message: message.into(), data: None }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self { code: error_codes::INVALID_REQUEST, message: message.into(), data: None }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self { code: error_codes::METHOD_NOT_FOUND, message: format!("Method '{method}' not found"), data: None }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self { code: error_codes::INVALID_PARAMS, message: message.into(), data: None }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self { code: error_codes::INTERNAL_ERROR, message: message.into(), data: None }
    }
}

//! Host/origin allow-listing, CORS header emission, and bearer-token
//! admission for the HTTP transport (C8, §4.8). OPTIONS preflight bypasses
//! auth entirely; every other response still gets `Vary: Origin` and, when
//! an `Origin` header is present and permitted, the matching CORS headers.

use crate::config::TransportConfig;
use crate::mcp::http::HttpState;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

const BEARER_PREFIX: &str = "Bearer ";

fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}

fn is_loopback_host(host: &str) -> bool {
    matches!(strip_port(host), "127.0.0.1" | "localhost" | "::1")
}

fn host_allowed(host_header: Option<&str>, config: &TransportConfig) -> bool {
    if !config.allowed_hosts.is_empty() {
        return host_header.map(|h| config.allowed_hosts.iter().any(|allowed| allowed == strip_port(h))).unwrap_or(false);
    }
    if is_loopback_host(&config.host) {
        host_header.map(is_loopback_host).unwrap_or(true)
    } else {
        true
    }
}

fn origin_allowed(origin: &str, config: &TransportConfig) -> bool {
    if !config.allowed_origins.is_empty() {
        return config.allowed_origins.iter().any(|allowed| allowed == origin);
    }
    if is_loopback_host(&config.host) {
        origin_is_loopback(origin)
    } else {
        true
    }
}

fn origin_is_loopback(origin: &str) -> bool {
    let without_scheme = origin.splitn(2, "://").nth(1).unwrap_or(origin);
    is_loopback_host(without_scheme)
}

fn bearer_token_valid(auth_header: Option<&str>, expected: &str) -> bool {
    match auth_header.and_then(|h| h.strip_prefix(BEARER_PREFIX)) {
        Some(token) => token == expected,
        None => false,
    }
}

fn forbidden(reason: &str) -> Response {
    (StatusCode::FORBIDDEN, axum::Json(json!({ "error": "forbidden", "message": reason }))).into_response()
}

fn unauthorized(reason: &str) -> Response {
    (StatusCode::UNAUTHORIZED, axum::Json(json!({ "error": "unauthorized", "message": reason }))).into_response()
}

pub async fn auth_middleware(State(state): State<HttpState>, req: Request, next: Next) -> Response {
    let config = &state.config.transport;
    let is_preflight = req.method() == Method::OPTIONS;

    let host_header = req.headers().get(axum::http::header::HOST).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let origin_header = req.headers().get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok()).map(|s| s.to_string());

    if !is_preflight {
        if !host_allowed(host_header.as_deref(), config) {
            return apply_cors_headers(forbidden("host not permitted"), origin_header.as_deref(), config);
        }
        if let Some(origin) = &origin_header {
            if !origin_allowed(origin, config) {
                return apply_cors_headers(forbidden("origin not permitted"), Some(origin.as_str()), config);
            }
        }
        if let Some(expected) = &config.api_key {
            let auth_header = req.headers().get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
            if !bearer_token_valid(auth_header, expected) {
                return apply_cors_headers(unauthorized("missing or invalid bearer token"), origin_header.as_deref(), config);
            }
        }
    }

    let response = next.run(req).await;
    apply_cors_headers(response, origin_header.as_deref(), config)
}

fn apply_cors_headers(mut response: Response, origin: Option<&str>, config: &TransportConfig) -> Response {
    let headers = response.headers_mut();
    headers.insert(axum::http::header::VARY, HeaderValue::from_static("Origin"));

    if let Some(origin) = origin {
        if origin_allowed(origin, config) {
            if let Ok(value) = HeaderValue::from_str(origin) {
                headers.insert(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
            headers.insert(
                axum::http::header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
            );
            headers.insert(
                axum::http::header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, Authorization, Mcp-Session-Id"),
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(allowed_hosts: Vec<&str>, allowed_origins: Vec<&str>, host: &str) -> TransportConfig {
        TransportConfig {
            mode: crate::config::TransportMode::Http,
            host: host.to_string(),
            port: 8420,
            endpoint_path: "/mcp".to_string(),
            health_path: "/health".to_string(),
            allowed_origins: allowed_origins.into_iter().map(|s| s.to_string()).collect(),
            allowed_hosts: allowed_hosts.into_iter().map(|s| s.to_string()).collect(),
            api_key: None,
        }
    }

    #[test]
    fn loopback_bind_defaults_reject_non_loopback_host_header() {
        let cfg = config(vec![], vec![], "127.0.0.1");
        assert!(host_allowed(Some("127.0.0.1:8420"), &cfg));
        assert!(!host_allowed(Some("evil.example.com"), &cfg));
    }

    #[test]
    fn explicit_allow_list_overrides_loopback_default() {
        let cfg = config(vec!["api.example.com"], vec![], "0.0.0.0");
        assert!(host_allowed(Some("api.example.com"), &cfg));
        assert!(!host_allowed(Some("other.example.com"), &cfg));
    }

    #[test]
    fn bearer_token_must_match_exactly() {
        assert!(bearer_token_valid(Some("Bearer secret"), "secret"));
        assert!(!bearer_token_valid(Some("Bearer wrong"), "secret"));
        assert!(!bearer_token_valid(None, "secret"));
    }
}

//! Pacing HTTP fetcher (C1): single-flight outbound HTTP with per-host delay,
//! timeout, and bounded retries. One instance paces all calls made through it.

use crate::error::ProviderError;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub accept_json: bool,
    pub body: Option<Vec<u8>>,
    pub body_content_type: Option<String>,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    pub min_spacing: Duration,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::GET,
            url: url.into(),
            headers: Vec::new(),
            accept_json: true,
            body: None,
            body_content_type: None,
            timeout: Duration::from_secs(10),
            retries: 2,
            retry_delay: Duration::from_millis(500),
            min_spacing: Duration::from_millis(250),
        }
    }

    pub fn post(url: impl Into<String>, body: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::POST,
            url: url.into(),
            headers: Vec::new(),
            accept_json: true,
            body: Some(body),
            body_content_type: Some(content_type.into()),
            timeout: Duration::from_secs(30),
            retries: 1,
            retry_delay: Duration::from_millis(500),
            min_spacing: Duration::from_millis(250),
        }
    }

    pub fn binary(mut self) -> Self {
        self.accept_json = false;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    pub fn with_min_spacing(mut self, spacing: Duration) -> Self {
        self.min_spacing = spacing;
        self
    }

    /// Apply a caller-supplied timeout/retry/spacing policy, overriding the
    /// per-request-kind defaults set by `get`/`post`.
    pub fn with_options(self, options: &FetchOptions) -> Self {
        self.with_timeout(options.timeout)
            .with_retries(options.retries, options.retry_delay)
            .with_min_spacing(options.min_spacing)
    }
}

/// A provider's configured timeout/retry/spacing policy (§6 configuration
/// surface: `requestTimeoutMs`, `retryAttempts`, `retryDelayMs`,
/// `requestDelayMs`), threaded from `LitgraphConfig` down to each
/// `FetchRequest` built by a provider adapter.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    pub min_spacing: Duration,
}

impl FetchOptions {
    pub fn new(timeout: Duration, retries: u32, retry_delay: Duration, min_spacing: Duration) -> Self {
        Self { timeout, retries, retry_delay, min_spacing }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 2,
            retry_delay: Duration::from_millis(500),
            min_spacing: Duration::from_millis(250),
        }
    }
}

/// A fetched payload: JSON when requested, otherwise raw bytes and a content-type.
pub enum FetchResponse {
    Json(serde_json::Value),
    Bytes { content_type: Option<String>, body: Vec<u8> },
}

impl FetchResponse {
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            FetchResponse::Json(v) => Some(v),
            FetchResponse::Bytes { .. } => None,
        }
    }

    pub fn into_bytes(self) -> Option<(Option<String>, Vec<u8>)> {
        match self {
            FetchResponse::Bytes { content_type, body } => Some((content_type, body)),
            FetchResponse::Json(_) => None,
        }
    }
}

const POLITE_USER_AGENT: &str = "litgraph-research-engine/0.1 (+https://github.com/litgraph-rs/litgraph)";

/// Paces every request issued through it with a shared `lastRequestAt`.
pub struct PacingFetcher {
    client: reqwest::Client,
    last_request_at: Mutex<Option<Instant>>,
    provider_tag: String,
}

impl PacingFetcher {
    pub fn new(provider_tag: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(POLITE_USER_AGENT)
            .build()
            .expect("reqwest client construction should not fail");
        Self { client, last_request_at: Mutex::new(None), provider_tag: provider_tag.into() }
    }

    async fn pace(&self, min_spacing: Duration) {
        let wait = {
            let mut last = self.last_request_at.lock();
            let now = Instant::now();
            let wait = match *last {
                Some(prev) => min_spacing.saturating_sub(now.duration_since(prev)),
                None => Duration::ZERO,
            };
            *last = Some(now + wait);
            wait
        };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    /// Issue a paced, retried, deadline-bounded request.
    pub async fn execute(&self, req: FetchRequest) -> Result<FetchResponse, ProviderError> {
        let mut attempt = 0u32;
        loop {
            self.pace(req.min_spacing).await;

            let result = self.attempt_once(&req).await;
            match result {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    if attempt >= req.retries {
                        return Err(err);
                    }
                    attempt += 1;
                    sleep(req.retry_delay).await;
                }
            }
        }
    }

    async fn attempt_once(&self, req: &FetchRequest) -> Result<FetchResponse, ProviderError> {
        let mut builder = self.client.request(req.method.clone(), &req.url).timeout(req.timeout);
        for (k, v) in &req.headers {
            builder = builder.header(k, v);
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
            if let Some(content_type) = &req.body_content_type {
                builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
            }
        }

        let response = tokio::time::timeout(req.timeout, builder.send())
            .await
            .map_err(|_| ProviderError::new(&self.provider_tag, &req.url, "request timed out"))?
            .map_err(|e| ProviderError::new(&self.provider_tag, &req.url, e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(&self.provider_tag, &req.url, format!("non-2xx status {status}"))
                .with_status(status.as_u16())
                .with_body_snippet(body));
        }

        if req.accept_json {
            let body = response.text().await.map_err(|e| ProviderError::new(&self.provider_tag, &req.url, e.to_string()))?;
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(value) => Ok(FetchResponse::Json(value)),
                Err(_) => Err(ProviderError::new(&self.provider_tag, &req.url, "expected JSON response body")
                    .with_status(status.as_u16())
                    .with_body_snippet(body)),
            }
        } else {
            let body = response.bytes().await.map_err(|e| ProviderError::new(&self.provider_tag, &req.url, e.to_string()))?;
            Ok(FetchResponse::Bytes { content_type, body: body.to_vec() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pacing_enforces_minimum_spacing() {
        let fetcher = PacingFetcher::new("test");
        let start = Instant::now();
        fetcher.pace(Duration::from_millis(50)).await;
        fetcher.pace(Duration::from_millis(50)).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}

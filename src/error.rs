//! Error taxonomy shared across the research engine.
//!
//! Each variant corresponds to one of the error kinds a caller can observe:
//! provider failures are always recovered locally by the aggregator, ingestion
//! failures are absorbed into the job record, and the remainder surface as
//! structured tool errors or HTTP error envelopes at the transport boundary.

use thiserror::Error;

/// A failed outbound call to a scholarly-metadata provider.
#[derive(Debug, Error, Clone)]
#[error("provider {provider} request failed: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub http_status: Option<u16>,
    pub url: String,
    pub body_snippet: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            http_status: None,
            url: url.into(),
            body_snippet: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_body_snippet(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        let truncated: String = body.chars().take(1024).collect();
        self.body_snippet = Some(truncated);
        self
    }
}

/// The ingestion pipeline could not resolve a source, acquire a PDF, or parse one.
#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct IngestionError {
    pub message: String,
}

impl IngestionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A requested job id or document id is not known to the engine.
#[derive(Debug, Error, Clone)]
#[error("{kind} {id} not found")]
pub struct NotFoundError {
    pub kind: String,
    pub id: String,
}

impl NotFoundError {
    pub fn job(id: impl Into<String>) -> Self {
        Self { kind: "job".into(), id: id.into() }
    }

    pub fn document(id: impl Into<String>) -> Self {
        Self { kind: "document".into(), id: id.into() }
    }

    pub fn session(id: impl Into<String>) -> Self {
        Self { kind: "session".into(), id: id.into() }
    }
}

/// Tool arguments violated the declared schema.
#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct ValidationError {
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { field: None, message: message.into() }
    }

    pub fn on_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: Some(field.into()), message: message.into() }
    }
}

/// The Google Scholar HTML scraper detected an anti-automation challenge page.
#[derive(Debug, Error, Clone)]
#[error("scholar scrape blocked: {reason}")]
pub struct ScholarScrapeBlockedError {
    pub reason: String,
}

impl ScholarScrapeBlockedError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Unexpected internal failure; logged in full, surfaced generically.
#[derive(Debug, Error)]
#[error("internal error: {0}")]
pub struct InternalError(pub String);

/// Top-level error enum unifying every kind the engine can produce.
///
/// Names are concepts, not wire types: the dispatcher (C9) and the HTTP
/// transport (C8) each map a `LitgraphError` onto their own envelope shape.
#[derive(Debug, Error)]
pub enum LitgraphError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    ScholarScrapeBlocked(#[from] ScholarScrapeBlockedError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl LitgraphError {
    /// Stable, machine-readable kind tag used in tool-error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            LitgraphError::Provider(_) => "provider_error",
            LitgraphError::Ingestion(_) => "ingestion_error",
            LitgraphError::NotFound(_) => "not_found",
            LitgraphError::Validation(_) => "validation_error",
            LitgraphError::ScholarScrapeBlocked(_) => "scholar_scrape_blocked",
            LitgraphError::Internal(_) => "internal_error",
        }
    }
}

impl From<LitgraphError> for anyhow::Error {
    fn from(err: LitgraphError) -> Self {
        anyhow::Error::new(err)
    }
}

//! Ingestion engine (C4): resolves a source, acquires a PDF, runs the
//! parser chain (C5), and stores the resulting `ParsedDocument` under a
//! deterministic `documentId`.

pub mod parser;

use crate::aggregator::LiteratureAggregator;
use crate::config::IngestionConfig;
use crate::error::{IngestionError, NotFoundError};
use crate::fetch::{FetchRequest, PacingFetcher};
use crate::model::{
    IngestionJob, IngestionSource, JobStatus, LicenseState, ParseMode, ParsedDocument, ParserInfo, ProvenanceEntry,
};
use crate::observability::{log_operation, Operation, OperationContext};
use crate::providers::normalize_doi;
use chrono::Utc;
use dashmap::DashMap;
use parser::{ParseOutput, SimpleParser, StructuredParser};
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

pub struct IngestionEngine {
    jobs: DashMap<String, IngestionJob>,
    documents: DashMap<String, ParsedDocument>,
    aggregator: Arc<LiteratureAggregator>,
    fetcher: Arc<PacingFetcher>,
    config: IngestionConfig,
}

impl IngestionEngine {
    pub fn new(aggregator: Arc<LiteratureAggregator>, fetcher: Arc<PacingFetcher>, config: IngestionConfig) -> Arc<Self> {
        Arc::new(Self { jobs: DashMap::new(), documents: DashMap::new(), aggregator, fetcher, config })
    }

    /// Deterministic `documentId` from source seeds: same inputs, same id (§4.4, §8).
    fn document_id(source: &IngestionSource) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.doi.as_deref().unwrap_or(""));
        hasher.update("|");
        hasher.update(source.paper_url.as_deref().unwrap_or(""));
        hasher.update("|");
        hasher.update(source.pdf_url.as_deref().unwrap_or(""));
        hasher.update("|");
        hasher.update(source.local_pdf_path.as_deref().unwrap_or(""));
        hex::encode(hasher.finalize())[..32].to_string()
    }

    /// `enqueue(input) -> IngestionJob` (§4.4). Returns immediately; execution
    /// happens on a spawned background worker.
    pub fn enqueue(self: &Arc<Self>, mut source: IngestionSource, parse_mode: ParseMode) -> Result<IngestionJob, IngestionError> {
        if !source.has_any_field() {
            return Err(IngestionError::new("At least one of doi, paper_url, pdf_url, local_pdf_path is required."));
        }
        if let Some(doi) = &source.doi {
            source.doi = Some(normalize_doi(doi));
        }

        let document_id = Self::document_id(&source);
        let job_uuid = Uuid::new_v4();
        let job_id = job_uuid.to_string();
        let now = Utc::now();

        let job = IngestionJob {
            job_id: job_id.clone(),
            document_id: document_id.clone(),
            status: JobStatus::Queued,
            created_at: now,
            started_at: None,
            completed_at: None,
            source: source.clone(),
            parser_name: None,
            parser_confidence: None,
            license_state: LicenseState::Unknown,
            error: None,
            warnings: Vec::new(),
            provenance: Vec::new(),
        };
        self.jobs.insert(job_id.clone(), job.clone());

        let ctx = OperationContext::new("ingestion.enqueue");
        log_operation(
            &ctx,
            &Operation::IngestionEnqueue { job_id: job_uuid, document_id: document_id.clone() },
            &Ok(()),
        );

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_job(job_id, document_id, source, parse_mode).await;
        });

        Ok(job)
    }

    pub fn get_job(&self, job_id: &str) -> Result<IngestionJob, NotFoundError> {
        self.jobs.get(job_id).map(|j| j.clone()).ok_or_else(|| NotFoundError::job(job_id))
    }

    pub fn get_document(&self, document_id: &str) -> Result<ParsedDocument, NotFoundError> {
        self.documents.get(document_id).map(|d| d.clone()).ok_or_else(|| NotFoundError::document(document_id))
    }

    fn transition(&self, job_id: &str, apply: impl FnOnce(&mut IngestionJob)) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            apply(&mut job);
        }
    }

    async fn run_job(self: Arc<Self>, job_id: String, document_id: String, source: IngestionSource, parse_mode: ParseMode) {
        let job_uuid = Uuid::parse_str(&job_id).unwrap_or_else(|_| Uuid::new_v4());
        let ctx = OperationContext::new("ingestion.run_job");

        self.transition(&job_id, |job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        });
        log_operation(
            &ctx,
            &Operation::IngestionTransition { job_id: job_uuid, from: "queued".to_string(), to: "running".to_string() },
            &Ok(()),
        );

        match self.execute(&source, parse_mode).await {
            Ok((document, parser_name, confidence, provenance)) => {
                self.documents.insert(document_id.clone(), document);
                self.transition(&job_id, |job| {
                    job.status = JobStatus::Succeeded;
                    job.completed_at = Some(Utc::now());
                    job.parser_name = Some(parser_name);
                    job.parser_confidence = Some(confidence);
                    job.provenance = provenance;
                });
                log_operation(
                    &ctx,
                    &Operation::IngestionTransition {
                        job_id: job_uuid,
                        from: "running".to_string(),
                        to: "succeeded".to_string(),
                    },
                    &Ok(()),
                );
            }
            Err(err) => {
                self.transition(&job_id, |job| {
                    job.status = JobStatus::Failed;
                    job.completed_at = Some(Utc::now());
                    job.error = Some(err.message.clone());
                });
                log_operation(
                    &ctx,
                    &Operation::IngestionTransition {
                        job_id: job_uuid,
                        from: "running".to_string(),
                        to: "failed".to_string(),
                    },
                    &Err(anyhow::anyhow!(err.message.clone())),
                );
            }
        }
    }

    async fn execute(
        &self,
        source: &IngestionSource,
        parse_mode: ParseMode,
    ) -> Result<(ParsedDocument, String, f64, Vec<ProvenanceEntry>), IngestionError> {
        let (pdf_bytes, license_state, source_url) = self.acquire_pdf(source).await?;

        // Scoped temp-file ownership (§5): the acquired PDF is written to a
        // single-job-owned temp file for the parser chain's lifetime and
        // removed on every exit path (success, parser failure, or error)
        // once `temp_file` drops at the end of this function.
        let mut temp_file = tempfile::Builder::new()
            .prefix("litgraph-ingest-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| IngestionError::new(format!("failed to create temp file: {e}")))?;
        std::io::Write::write_all(&mut temp_file, &pdf_bytes)
            .map_err(|e| IngestionError::new(format!("failed to write temp file: {e}")))?;
        let temp_path = temp_file.path().to_path_buf();

        let order = self.parser_order(parse_mode);
        let mut last_error: Option<String> = None;
        let mut output: Option<ParseOutput> = None;

        for parser_name in order {
            let attempt = match parser_name {
                "structured" => match &self.config.structured_parser_url {
                    Some(endpoint) => {
                        let parser = StructuredParser::new(endpoint.clone(), self.fetcher.clone());
                        parser.parse(&pdf_bytes).await
                    }
                    None => continue,
                },
                _ => SimpleParser::parse(&temp_path),
            };

            match attempt {
                Ok(result) => {
                    output = Some(result);
                    break;
                }
                Err(err) => {
                    tracing::warn!(parser = parser_name, error = %err, "parser strategy failed, trying next");
                    last_error = Some(err.message);
                }
            }
        }

        let output = output.ok_or_else(|| {
            IngestionError::new(last_error.unwrap_or_else(|| "all parser strategies failed".to_string()))
        });

        // `temp_file` is dropped here regardless of which branch above ran,
        // deleting the underlying file; deletion is idempotent (`tempfile`
        // tolerates a file already gone when the guard drops).
        drop(temp_file);
        let output = output?;

        let document_id = Self::document_id(source);
        let provenance = vec![ProvenanceEntry {
            provider: crate::model::ProviderTag::A,
            source_url: Some(source_url),
            fetched_at: Utc::now(),
            confidence: output.confidence,
        }];

        let document = ParsedDocument {
            document_id,
            source: source.clone(),
            parser: ParserInfo {
                name: output.parser_name.clone(),
                version: output.parser_version.clone(),
                confidence: output.confidence,
            },
            title: output.title,
            r#abstract: output.r#abstract,
            full_text: output.full_text,
            sections: output.sections,
            references: output.references,
            tables: Vec::new(),
            equations: Vec::new(),
            figures: Vec::new(),
            created_at: Utc::now(),
            provenance: provenance.clone(),
        };

        let _ = license_state;
        Ok((document, output.parser_name, output.confidence, provenance))
    }

    /// Parser order resolution by requested mode (§4.4).
    fn parser_order(&self, parse_mode: ParseMode) -> Vec<&'static str> {
        let structured_available = self.config.structured_parser_url.is_some();
        match parse_mode {
            ParseMode::Auto | ParseMode::Structured => {
                if structured_available {
                    vec!["structured", "simple"]
                } else {
                    vec!["simple"]
                }
            }
            ParseMode::Simple => vec!["simple"],
        }
    }

    async fn acquire_pdf(&self, source: &IngestionSource) -> Result<(Vec<u8>, LicenseState, String), IngestionError> {
        if let Some(local_path) = &source.local_pdf_path {
            if !self.config.allow_local_pdfs {
                return Err(IngestionError::new("Local PDF ingestion is not permitted by configuration."));
            }
            let path = std::path::Path::new(local_path);
            let absolute = std::fs::canonicalize(path)
                .map_err(|e| IngestionError::new(format!("local PDF path is not readable: {e}")))?;
            let bytes = std::fs::read(&absolute)
                .map_err(|e| IngestionError::new(format!("failed to read local PDF: {e}")))?;
            return Ok((bytes, LicenseState::UserProvided, absolute.display().to_string()));
        }

        if !self.config.allow_remote_pdfs {
            return Err(IngestionError::new("Unable to resolve a downloadable PDF URL from input."));
        }

        let pdf_url = self.resolve_remote_pdf_url(source).await?;
        let req = FetchRequest::get(&pdf_url)
            .binary()
            .with_header("User-Agent", "litgraph-research-engine/0.1 (polite crawler)");
        let response = self
            .fetcher
            .execute(req)
            .await
            .map_err(|e| IngestionError::new(format!("failed to download PDF: {}", e.message)))?;
        let (content_type, bytes) =
            response.into_bytes().ok_or_else(|| IngestionError::new("expected binary PDF response"))?;

        let looks_like_pdf = bytes.starts_with(b"%PDF");
        let declared_pdf = content_type.as_deref().map(|ct| ct.contains("application/pdf")).unwrap_or(false);
        if !looks_like_pdf && !declared_pdf {
            return Err(IngestionError::new("downloaded content is not a valid PDF"));
        }

        Ok((bytes, LicenseState::OpenAccess, pdf_url))
    }

    async fn resolve_remote_pdf_url(&self, source: &IngestionSource) -> Result<String, IngestionError> {
        if let Some(pdf_url) = &source.pdf_url {
            return Ok(pdf_url.clone());
        }

        if let Some(doi) = &source.doi {
            if let Some(canonical) = self.aggregator.resolve_by_doi(doi).await {
                if let Some(pdf_url) = &canonical.open_access.pdf_url {
                    return Ok(pdf_url.clone());
                }
                if let Some(url) = &canonical.url {
                    if url.to_lowercase().ends_with(".pdf") {
                        return Ok(url.clone());
                    }
                    if let Ok(discovered) = self.discover_pdf_link(url).await {
                        return Ok(discovered);
                    }
                }
            }
        }

        if let Some(paper_url) = &source.paper_url {
            if paper_url.to_lowercase().ends_with(".pdf") {
                return Ok(paper_url.clone());
            }
            if let Ok(discovered) = self.discover_pdf_link(paper_url).await {
                return Ok(discovered);
            }
        }

        Err(IngestionError::new("Unable to resolve a downloadable PDF URL from input."))
    }

    /// Landing-page PDF discovery (§4.4): `citation_pdf_url` meta, `og:pdf`
    /// meta, a `link[type=application/pdf]`, then the first `.pdf` anchor.
    async fn discover_pdf_link(&self, landing_url: &str) -> Result<String, IngestionError> {
        let req = FetchRequest::get(landing_url).binary();
        let response = self
            .fetcher
            .execute(req)
            .await
            .map_err(|e| IngestionError::new(format!("failed to fetch landing page: {}", e.message)))?;
        let (_, bytes) = response.into_bytes().ok_or_else(|| IngestionError::new("expected HTML landing page"))?;
        let html = String::from_utf8_lossy(&bytes);
        let document = Html::parse_document(&html);

        let meta_citation = Selector::parse(r#"meta[name="citation_pdf_url"]"#).unwrap();
        let meta_og_pdf = Selector::parse(r#"meta[property="og:pdf"]"#).unwrap();
        let link_pdf = Selector::parse(r#"link[type="application/pdf"]"#).unwrap();
        let anchor_selector = Selector::parse("a").unwrap();

        if let Some(url) = document.select(&meta_citation).next().and_then(|el| el.value().attr("content")) {
            return Ok(resolve_relative(landing_url, url));
        }
        if let Some(url) = document.select(&meta_og_pdf).next().and_then(|el| el.value().attr("content")) {
            return Ok(resolve_relative(landing_url, url));
        }
        if let Some(url) = document.select(&link_pdf).next().and_then(|el| el.value().attr("href")) {
            return Ok(resolve_relative(landing_url, url));
        }
        for anchor in document.select(&anchor_selector) {
            if let Some(href) = anchor.value().attr("href") {
                if href.to_lowercase().ends_with(".pdf") {
                    return Ok(resolve_relative(landing_url, href));
                }
            }
        }

        Err(IngestionError::new("no PDF link discovered on landing page"))
    }
}

fn resolve_relative(base: &str, candidate: &str) -> String {
    match url::Url::parse(base).and_then(|b| b.join(candidate)) {
        Ok(joined) => joined.to_string(),
        Err(_) => candidate.to_string(),
    }
}

/// Compact summary of a succeeded document, returned alongside a job's status (§6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub title: Option<String>,
    pub section_count: usize,
    pub reference_count: usize,
    pub parser_name: String,
    pub parser_confidence: f64,
}

impl DocumentSummary {
    pub fn from_document(document: &ParsedDocument) -> Self {
        Self {
            document_id: document.document_id.clone(),
            title: document.title.clone(),
            section_count: document.sections.len(),
            reference_count: document.references.len(),
            parser_name: document.parser.name.clone(),
            parser_confidence: document.parser.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_is_deterministic_for_identical_sources() {
        let source_a = IngestionSource { doi: Some("10.1/x".to_string()), ..Default::default() };
        let source_b = IngestionSource { doi: Some("10.1/x".to_string()), ..Default::default() };
        assert_eq!(IngestionEngine::document_id(&source_a), IngestionEngine::document_id(&source_b));
    }

    #[test]
    fn document_id_differs_for_distinct_sources() {
        let source_a = IngestionSource { doi: Some("10.1/x".to_string()), ..Default::default() };
        let source_b = IngestionSource { doi: Some("10.1/y".to_string()), ..Default::default() };
        assert_ne!(IngestionEngine::document_id(&source_a), IngestionEngine::document_id(&source_b));
    }

    #[test]
    fn resolve_relative_joins_against_landing_page() {
        assert_eq!(
            resolve_relative("https://example.org/paper/123", "/files/paper.pdf"),
            "https://example.org/files/paper.pdf"
        );
    }
}

//! Tool dispatcher (C9): the fixed ten-tool catalog (§6). Validates
//! arguments via `crate::validation`, calls into the core components, and
//! wraps the outcome in the MCP tool-result envelope — never lets a core
//! exception escape across the dispatch boundary.

use crate::aggregator::{LiteratureAggregator, SearchGraphInput};
use crate::citation::{self, ReferenceListInput, SuggestInput, ValidationReference};
use crate::error::{IngestionError, LitgraphError, NotFoundError, ProviderError, ValidationError};
use crate::extraction::{self, ExtractionInput};
use crate::ingestion::{DocumentSummary, IngestionEngine};
use crate::mcp::types::ToolDefinition;
use crate::model::{CanonicalWork, IngestionSource, JobStatus, ParseMode};
use crate::observability::{log_operation, Operation, OperationContext};
use crate::providers::scholar::ScholarProvider;
use crate::validation::{self, YearRange};
use serde_json::{json, Value};
use std::sync::Arc;

/// A dispatcher-level failure, already classified by kind so the transport
/// layers (C8 line/HTTP) never need to inspect a `LitgraphError` directly.
pub struct ToolError {
    pub kind: String,
    pub message: String,
    pub details: Option<Value>,
}

impl ToolError {
    fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into(), details: None }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<ValidationError> for ToolError {
    fn from(err: ValidationError) -> Self {
        let mut tool_err = ToolError::new("validation_error", err.message.clone());
        if let Some(field) = err.field {
            tool_err = tool_err.with_details(json!({ "field": field }));
        }
        tool_err
    }
}

impl From<NotFoundError> for ToolError {
    fn from(err: NotFoundError) -> Self {
        ToolError::new("not_found", err.to_string()).with_details(json!({ "kind": err.kind, "id": err.id }))
    }
}

impl From<IngestionError> for ToolError {
    fn from(err: IngestionError) -> Self {
        ToolError::new("ingestion_error", err.message)
    }
}

impl From<ProviderError> for ToolError {
    fn from(err: ProviderError) -> Self {
        ToolError::new("provider_error", err.to_string())
            .with_details(json!({ "provider": err.provider, "url": err.url, "http_status": err.http_status }))
    }
}

impl From<LitgraphError> for ToolError {
    fn from(err: LitgraphError) -> Self {
        ToolError::new(err.kind(), err.to_string())
    }
}

/// `{content, structuredContent}` on success, `{content, isError, error}` on failure (§4.9).
pub fn success_envelope(payload: Value) -> Value {
    json!({
        "content": [{ "type": "text", "text": payload.to_string() }],
        "structuredContent": payload,
    })
}

pub fn error_envelope(err: ToolError) -> Value {
    json!({
        "content": [{ "type": "text", "text": err.message }],
        "isError": true,
        "error": { "kind": err.kind, "message": err.message_for_envelope(), "details": err.details },
    })
}

impl ToolError {
    fn message_for_envelope(&self) -> String {
        self.message.clone()
    }
}

fn year_range_bounds(range: Option<YearRange>) -> (Option<i32>, Option<i32>) {
    match range {
        Some(r) => (r.min, r.max),
        None => (None, None),
    }
}

/// Holds the constructed core components and dispatches each of the ten
/// fixed tool names to its handler.
pub struct ToolRegistry {
    aggregator: Arc<LiteratureAggregator>,
    ingestion: Arc<IngestionEngine>,
    scholar: Arc<ScholarProvider>,
}

impl ToolRegistry {
    pub fn new(aggregator: Arc<LiteratureAggregator>, ingestion: Arc<IngestionEngine>, scholar: Arc<ScholarProvider>) -> Self {
        Self { aggregator, ingestion, scholar }
    }

    /// Dispatch a tool call by name; `Ok`/`Err` are both rendered as a tool
    /// result envelope by the caller — this never returns a transport error.
    pub async fn call(&self, name: &str, params: Value) -> Value {
        let mut ctx = OperationContext::new("mcp.call_tool");
        ctx.add_attribute("tool_name", name);

        let result = match name {
            "search_literature_graph" => self.search_literature_graph(params).await,
            "search_google_scholar_key_words" => self.search_google_scholar_key_words(params).await,
            "search_google_scholar_advanced" => self.search_google_scholar_advanced(params).await,
            "get_author_info" => self.get_author_info(params).await,
            "ingest_paper_fulltext" => self.ingest_paper_fulltext(params),
            "get_ingestion_status" => self.get_ingestion_status(params),
            "extract_granular_paper_details" => self.extract_granular_paper_details(params),
            "suggest_contextual_citations" => self.suggest_contextual_citations(params).await,
            "build_reference_list" => self.build_reference_list(params).await,
            "validate_manuscript_citations" => self.validate_manuscript_citations(params),
            other => Err(ToolError::new("not_found", format!("unknown tool '{other}'"))),
        };

        match result {
            Ok(payload) => {
                log_operation(
                    &ctx,
                    &Operation::ToolDispatch { tool: name.to_string(), is_error: false },
                    &Ok(()),
                );
                success_envelope(payload)
            }
            Err(err) => {
                log_operation(
                    &ctx,
                    &Operation::ToolDispatch { tool: name.to_string(), is_error: true },
                    &Err(anyhow::anyhow!(err.message.clone())),
                );
                error_envelope(err)
            }
        }
    }

    async fn search_literature_graph(&self, params: Value) -> Result<Value, ToolError> {
        let args = validation::validate_search_literature_graph(&params)?;
        let (min_year, max_year) = year_range_bounds(args.year_range);
        let input = SearchGraphInput {
            query: args.query,
            min_year,
            max_year,
            fields_of_study: args.fields_of_study,
            limit: args.limit,
            sources: args.sources,
        };
        let result = self.aggregator.search_graph(input).await;
        Ok(json!({ "results": result.results, "provider_errors": result.provider_errors }))
    }

    async fn search_google_scholar_key_words(&self, params: Value) -> Result<Value, ToolError> {
        let args = validation::validate_search_google_scholar_key_words(&params)?;
        let works = self.scholar.search_paginated(&args.query, args.num_results, args.start).await?;
        Ok(json!({ "results": works }))
    }

    async fn search_google_scholar_advanced(&self, params: Value) -> Result<Value, ToolError> {
        let args = validation::validate_search_google_scholar_advanced(&params)?;
        let query = compose_advanced_query(&args);
        let works = self.scholar.search_paginated(&query, args.num_results, args.start).await?;
        Ok(json!({ "results": works, "query_used": query }))
    }

    async fn get_author_info(&self, params: Value) -> Result<Value, ToolError> {
        let args = validation::validate_get_author_info(&params)?;
        let works = self.scholar.search_paginated(&format!("author:\"{}\"", args.author_name), args.max_publications, 0).await?;
        let total_citations: u64 = works.iter().map(|w| w.counts.total).sum();
        Ok(json!({
            "author_name": args.author_name,
            "publications": works,
            "publication_count": works.len(),
            "total_citations": total_citations,
        }))
    }

    fn ingest_paper_fulltext(&self, params: Value) -> Result<Value, ToolError> {
        let args = validation::validate_ingest_paper_fulltext(&params)?;
        let source = IngestionSource { doi: args.doi, paper_url: args.paper_url, pdf_url: args.pdf_url, local_pdf_path: args.local_pdf_path };
        let parse_mode = match args.parse_mode.as_str() {
            "structured" => ParseMode::Structured,
            "simple" => ParseMode::Simple,
            _ => ParseMode::Auto,
        };
        let job = self.ingestion.enqueue(source, parse_mode)?;
        Ok(json!({ "job": job }))
    }

    fn get_ingestion_status(&self, params: Value) -> Result<Value, ToolError> {
        let args = validation::validate_get_ingestion_status(&params)?;
        let job = self.ingestion.get_job(&args.job_id)?;
        let mut payload = json!({ "job": job });
        if job.status == JobStatus::Succeeded {
            if let Ok(document) = self.ingestion.get_document(&job.document_id) {
                payload["document_summary"] = serde_json::to_value(DocumentSummary::from_document(&document)).unwrap_or(Value::Null);
            }
        }
        Ok(payload)
    }

    fn extract_granular_paper_details(&self, params: Value) -> Result<Value, ToolError> {
        let args = validation::validate_extract_granular_paper_details(&params)?;
        let document = self.ingestion.get_document(&args.document_id)?;
        let details = extraction::extract(ExtractionInput {
            document: &document,
            sections: args.sections,
            include_references: args.include_references,
        });
        Ok(serde_json::to_value(details).unwrap_or(Value::Null))
    }

    async fn suggest_contextual_citations(&self, params: Value) -> Result<Value, ToolError> {
        let args = validation::validate_suggest_contextual_citations(&params)?;
        let output = citation::suggest(
            &self.aggregator,
            SuggestInput {
                manuscript_text: args.manuscript_text,
                cursor_context: args.cursor_context,
                k: args.k,
                recency_bias: args.recency_bias,
            },
        )
        .await;
        let style_works: Vec<(usize, crate::model::CommonStyleWork)> =
            output.candidates.iter().enumerate().map(|(i, c)| (i + 1, crate::model::CommonStyleWork::from(&c.work))).collect();
        let inline_suggestion = crate::citation::style::inline_suggestion(args.style, &style_works);
        Ok(json!({
            "candidates": output.candidates,
            "query_used": output.query_used,
            "inline_suggestion": inline_suggestion,
        }))
    }

    async fn build_reference_list(&self, params: Value) -> Result<Value, ToolError> {
        let args = validation::validate_build_reference_list(&params)?;
        let works = match args.works {
            Some(raw_works) => {
                let mut parsed = Vec::with_capacity(raw_works.len());
                for (idx, raw) in raw_works.into_iter().enumerate() {
                    let work: CanonicalWork = serde_json::from_value(raw)
                        .map_err(|e| ToolError::from(ValidationError::on_field("works", format!("works[{idx}]: {e}"))))?;
                    parsed.push(work);
                }
                Some(parsed)
            }
            None => None,
        };
        let result = citation::build_list(
            &self.aggregator,
            ReferenceListInput { style: args.style, works, manuscript_text: args.manuscript_text },
        )
        .await;
        Ok(json!({ "entries": result.entries, "bibliography_text": result.bibliography_text }))
    }

    fn validate_manuscript_citations(&self, params: Value) -> Result<Value, ToolError> {
        let args = validation::validate_validate_manuscript_citations(&params)?;
        let references: Vec<ValidationReference> = args
            .references
            .into_iter()
            .map(|r| ValidationReference { id: r.id, formatted: r.formatted, bibtex: r.bibtex })
            .collect();
        let result = citation::validate(&args.manuscript_text, &references, args.style);
        Ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }
}

fn compose_advanced_query(args: &validation::SearchGoogleScholarAdvancedArgs) -> String {
    let mut parts = vec![args.query.clone()];
    if let Some(phrase) = &args.exact_phrase {
        parts.push(format!("\"{phrase}\""));
    }
    if let Some(author) = &args.author {
        parts.push(format!("author:\"{author}\""));
    }
    if let Some(exclude) = &args.exclude_words {
        for word in exclude {
            parts.push(format!("-{word}"));
        }
    }
    if args.title_only {
        parts.push("intitle:yes".to_string());
    }
    if let Some(range) = &args.year_range {
        if let Some(min) = range.min {
            parts.push(format!("after:{min}"));
        }
        if let Some(max) = range.max {
            parts.push(format!("before:{max}"));
        }
    }
    parts.join(" ")
}

fn schema_string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

/// The fixed ten-tool catalog surfaced by `tools/list` (§6).
pub fn get_all_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "search_literature_graph".to_string(),
            description: "Federated search across the literature graph, merged and ranked across providers.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": schema_string("Free-text search query."),
                    "year_range": { "description": "[start, end] array or {start, end} object." },
                    "fields_of_study": { "type": "array", "items": { "type": "string" } },
                    "limit": { "type": "integer", "default": 10 },
                    "sources": { "type": "array", "items": { "type": "string", "enum": ["A", "B", "C", "D"] } },
                },
                "required": ["query"],
            }),
        },
        ToolDefinition {
            name: "search_google_scholar_key_words".to_string(),
            description: "Keyword search against Google Scholar.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": schema_string("Search keywords."),
                    "num_results": { "type": "integer", "default": 5 },
                    "start": { "type": "integer", "default": 0 },
                    "language": { "type": "string", "default": "en" },
                },
                "required": ["query"],
            }),
        },
        ToolDefinition {
            name: "search_google_scholar_advanced".to_string(),
            description: "Advanced Google Scholar search with author, phrase, exclusion, and year filters.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": schema_string("Base search query."),
                    "author": { "type": "string" },
                    "year_range": {},
                    "exact_phrase": { "type": "string" },
                    "exclude_words": { "type": "array", "items": { "type": "string" } },
                    "title_only": { "type": "boolean", "default": false },
                    "num_results": { "type": "integer", "default": 5 },
                    "start": { "type": "integer", "default": 0 },
                    "language": { "type": "string", "default": "en" },
                },
                "required": ["query"],
            }),
        },
        ToolDefinition {
            name: "get_author_info".to_string(),
            description: "Look up an author's publications and aggregate citation impact.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "author_name": schema_string("Author display name."),
                    "max_publications": { "type": "integer", "default": 5 },
                    "language": { "type": "string", "default": "en" },
                },
                "required": ["author_name"],
            }),
        },
        ToolDefinition {
            name: "ingest_paper_fulltext".to_string(),
            description: "Enqueue full-text ingestion of a paper from a DOI, URL, or local PDF path.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "doi": { "type": "string" },
                    "paper_url": { "type": "string" },
                    "pdf_url": { "type": "string" },
                    "local_pdf_path": { "type": "string" },
                    "parse_mode": { "type": "string", "enum": ["auto", "structured", "simple"], "default": "auto" },
                    "ocr_enabled": { "type": "boolean", "default": true },
                },
            }),
        },
        ToolDefinition {
            name: "get_ingestion_status".to_string(),
            description: "Fetch the status of a previously enqueued ingestion job.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "job_id": schema_string("Ingestion job id.") },
                "required": ["job_id"],
            }),
        },
        ToolDefinition {
            name: "extract_granular_paper_details".to_string(),
            description: "Extract claims, methods, limitations, datasets, and metrics from an ingested document.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "document_id": schema_string("Ingested document id."),
                    "sections": { "type": "array", "items": { "type": "string" } },
                    "include_references": { "type": "boolean", "default": true },
                },
                "required": ["document_id"],
            }),
        },
        ToolDefinition {
            name: "suggest_contextual_citations".to_string(),
            description: "Suggest citations relevant to the manuscript text near the cursor.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "manuscript_text": schema_string("Full manuscript text."),
                    "cursor_context": { "type": "string" },
                    "style": { "type": "string", "enum": ["apa", "ieee", "chicago", "vancouver"], "default": "apa" },
                    "k": { "type": "integer", "default": 10 },
                    "recency_bias": { "type": "number", "default": 0.5, "minimum": 0, "maximum": 1 },
                },
                "required": ["manuscript_text"],
            }),
        },
        ToolDefinition {
            name: "build_reference_list".to_string(),
            description: "Build a formatted reference list from explicit works or from manuscript-derived suggestions.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "style": { "type": "string", "enum": ["apa", "ieee", "chicago", "vancouver"], "default": "apa" },
                    "locale": { "type": "string", "default": "en-US" },
                    "manuscript_text": { "type": "string" },
                    "works": { "type": "array", "items": { "type": "object" } },
                },
            }),
        },
        ToolDefinition {
            name: "validate_manuscript_citations".to_string(),
            description: "Validate manuscript citations against a supplied reference list.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "manuscript_text": schema_string("Full manuscript text."),
                    "style": { "type": "string", "enum": ["apa", "ieee", "chicago", "vancouver"] },
                    "references": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "string" },
                                "formatted": { "type": "string" },
                                "bibtex": { "type": "string" },
                            },
                            "required": ["formatted"],
                        },
                    },
                },
                "required": ["manuscript_text", "references"],
            }),
        },
    ]
}

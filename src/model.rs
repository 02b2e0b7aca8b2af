//! Shared data model: the records that flow between components C1-C9.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Which of the four provider catalogs produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderTag {
    A,
    B,
    C,
    D,
}

impl ProviderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::A => "A",
            ProviderTag::B => "B",
            ProviderTag::C => "C",
            ProviderTag::D => "D",
        }
    }

    /// Fixed per-provider weight used in the blended-score formula (§4.3).
    pub fn provider_weight(&self) -> f64 {
        match self {
            ProviderTag::A => 1.0,
            ProviderTag::B => 0.9,
            ProviderTag::C => 1.1,
            ProviderTag::D => 0.7,
        }
    }

    /// Default relevance assigned when a provider does not supply one (§4.2).
    pub fn default_relevance(&self) -> f64 {
        match self {
            ProviderTag::A => 0.5,
            ProviderTag::B => 0.5,
            ProviderTag::C => 0.7,
            ProviderTag::D => 0.4,
        }
    }
}

/// One author as reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub provider_author_id: Option<String>,
}

/// Open-access metadata carried by a provider record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAccess {
    pub is_open: bool,
    pub pdf_url: Option<String>,
    pub license: Option<String>,
}

/// Citation-impact counters. All fields are non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationCounts {
    pub total: u64,
    pub influential: u64,
    pub reference_count: u64,
}

/// Raw per-provider record after adapter normalization (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderWork {
    pub provider: ProviderTag,
    pub provider_local_id: String,
    pub title: String,
    pub r#abstract: Option<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub doi: Option<String>,
    pub landing_url: Option<String>,
    pub counts: CitationCounts,
    pub authors: Vec<Author>,
    pub open_access: OpenAccess,
    pub external_ids: HashMap<String, String>,
    pub fields_of_study: BTreeSet<String>,
    pub relevance: f64,
    pub source_url: String,
}

impl ProviderWork {
    /// Title non-empty after normalization; falls back to "Untitled" (§3 invariant).
    pub fn normalize_title(raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            "Untitled".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// One entry in a canonical work's provenance list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub provider: ProviderTag,
    pub source_url: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub confidence: f64,
}

/// Merged cross-provider record plus an append-only provenance list (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalWork {
    pub canonical_id: String,
    pub doi: Option<String>,
    pub title: String,
    pub r#abstract: Option<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub url: Option<String>,
    pub counts: CitationCounts,
    pub authors: Vec<Author>,
    pub open_access: OpenAccess,
    pub external_ids: HashMap<String, String>,
    pub fields_of_study: BTreeSet<String>,
    pub score: f64,
    pub provenance: Vec<ProvenanceEntry>,
}

impl CanonicalWork {
    /// Stable identity: DOI when present, else `(normalizedTitle, year)`.
    pub fn stable_identity(&self) -> String {
        match &self.doi {
            Some(doi) => doi.clone(),
            None => format!(
                "{}::{}",
                crate::providers::normalize_title_key(&self.title),
                self.year.map(|y| y.to_string()).unwrap_or_default()
            ),
        }
    }
}

/// Ingestion job lifecycle state. Transitions only ever advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// Provenance of the PDF an ingestion job acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseState {
    Unknown,
    OpenAccess,
    UserProvided,
}

/// Requested parser order for an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    Auto,
    Structured,
    Simple,
}

/// Source input accepted by `ingest_paper_fulltext` (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionSource {
    pub doi: Option<String>,
    pub paper_url: Option<String>,
    pub pdf_url: Option<String>,
    pub local_pdf_path: Option<String>,
}

impl IngestionSource {
    pub fn has_any_field(&self) -> bool {
        self.doi.is_some() || self.paper_url.is_some() || self.pdf_url.is_some() || self.local_pdf_path.is_some()
    }
}

/// `{jobId, documentId, status, ...}` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJob {
    pub job_id: String,
    pub document_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub source: IngestionSource,
    pub parser_name: Option<String>,
    pub parser_confidence: Option<f64>,
    pub license_state: LicenseState,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub provenance: Vec<ProvenanceEntry>,
}

/// One chunk of a parsed document's body (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionChunk {
    pub id: String,
    pub heading: String,
    pub text: String,
    pub page_start: Option<u32>,
    pub page_end: Option<u32>,
}

/// A single parsed bibliographic entry (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedReference {
    pub raw_text: String,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub authors: Vec<String>,
}

/// Parser strategy metadata attached to a `ParsedDocument`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserInfo {
    pub name: String,
    pub version: String,
    pub confidence: f64,
}

/// The output of the parser chain, once normalized into the shared shape (§3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub document_id: String,
    pub source: IngestionSource,
    pub parser: ParserInfo,
    pub title: Option<String>,
    pub r#abstract: Option<String>,
    pub full_text: String,
    pub sections: Vec<SectionChunk>,
    pub references: Vec<ParsedReference>,
    pub tables: Vec<String>,
    pub equations: Vec<String>,
    pub figures: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub provenance: Vec<ProvenanceEntry>,
}

/// One bibliographic entry materialized in a requested style (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub id: String,
    pub common_style_object: CommonStyleWork,
    pub formatted_text: String,
    pub structured_export: String,
    pub source_work: CanonicalWork,
}

/// Flattened, style-agnostic view over a work, consumed by the style adapter (§4.3 of SPEC_FULL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonStyleWork {
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub title: String,
    pub venue: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
}

impl From<&CanonicalWork> for CommonStyleWork {
    fn from(work: &CanonicalWork) -> Self {
        Self {
            authors: work.authors.iter().map(|a| a.name.clone()).collect(),
            year: work.year,
            title: work.title.clone(),
            venue: work.venue.clone(),
            doi: work.doi.clone(),
            url: work.url.clone(),
        }
    }
}

/// A ranked suggestion returned by the contextual citation engine (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationCandidate {
    pub work: CanonicalWork,
    pub relevance_score: f64,
    pub rationale: String,
    pub matched_context: String,
}

/// A long-lived HTTP session record (§3, C8).
#[derive(Debug, Clone)]
pub struct SessionRuntime {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

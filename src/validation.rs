//! Tool dispatcher argument validation (C9): typed schemas for the fixed
//! ten-tool catalog (§6), including the year-range polymorphic-input
//! normalization required by §9 — two-element array or `{start,end}`
//! mapping, canonicalized to `{min,max}` before reaching the core.

use crate::citation::style::CitationStyle;
use crate::error::ValidationError;
use crate::model::ProviderTag;
use serde_json::Value;

/// Canonical year-range form. Only this shape reaches the core (§9).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct YearRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

fn field<'a>(params: &'a Value, key: &str) -> Option<&'a Value> {
    params.get(key).filter(|v| !v.is_null())
}

fn require_str(params: &Value, key: &str) -> Result<String, ValidationError> {
    match field(params, key).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        Some(_) => Err(ValidationError::on_field(key, format!("'{key}' must not be empty"))),
        None => Err(ValidationError::on_field(key, format!("'{key}' is required"))),
    }
}

fn opt_str(params: &Value, key: &str) -> Result<Option<String>, ValidationError> {
    match field(params, key) {
        None => Ok(None),
        Some(v) => match v.as_str() {
            Some(s) => Ok(Some(s.to_string())),
            None => Err(ValidationError::on_field(key, format!("'{key}' must be a string"))),
        },
    }
}

fn opt_str_list(params: &Value, key: &str) -> Result<Option<Vec<String>>, ValidationError> {
    match field(params, key) {
        None => Ok(None),
        Some(v) => {
            let arr = v.as_array().ok_or_else(|| ValidationError::on_field(key, format!("'{key}' must be an array")))?;
            let mut out = Vec::with_capacity(arr.len());
            for item in arr {
                let s = item
                    .as_str()
                    .ok_or_else(|| ValidationError::on_field(key, format!("'{key}' entries must be strings")))?;
                out.push(s.to_string());
            }
            Ok(Some(out))
        }
    }
}

fn usize_with_default(params: &Value, key: &str, default: usize) -> Result<usize, ValidationError> {
    match field(params, key) {
        None => Ok(default),
        Some(v) => {
            let n = v
                .as_u64()
                .ok_or_else(|| ValidationError::on_field(key, format!("'{key}' must be a non-negative integer")))?;
            Ok(n as usize)
        }
    }
}

fn bool_with_default(params: &Value, key: &str, default: bool) -> Result<bool, ValidationError> {
    match field(params, key) {
        None => Ok(default),
        Some(v) => v.as_bool().ok_or_else(|| ValidationError::on_field(key, format!("'{key}' must be a boolean"))),
    }
}

fn string_with_default(params: &Value, key: &str, default: &str) -> Result<String, ValidationError> {
    match field(params, key) {
        None => Ok(default.to_string()),
        Some(v) => v
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ValidationError::on_field(key, format!("'{key}' must be a string"))),
    }
}

fn f64_bounded(params: &Value, key: &str, default: f64, lo: f64, hi: f64) -> Result<f64, ValidationError> {
    match field(params, key) {
        None => Ok(default),
        Some(v) => {
            let n = v.as_f64().ok_or_else(|| ValidationError::on_field(key, format!("'{key}' must be a number")))?;
            if n < lo || n > hi {
                return Err(ValidationError::on_field(key, format!("'{key}' must be between {lo} and {hi}")));
            }
            Ok(n)
        }
    }
}

fn style_with_default(params: &Value, key: &str, default: CitationStyle) -> Result<CitationStyle, ValidationError> {
    match field(params, key).and_then(|v| v.as_str()) {
        None => Ok(default),
        Some(raw) => CitationStyle::parse(raw)
            .ok_or_else(|| ValidationError::on_field(key, format!("'{key}' must be one of apa, ieee, chicago, vancouver"))),
    }
}

/// Accepts `[start, end]` or `{start, end}`; rejects anything else.
pub fn normalize_year_range(params: &Value, key: &str) -> Result<Option<YearRange>, ValidationError> {
    let Some(raw) = field(params, key) else { return Ok(None) };

    if let Some(arr) = raw.as_array() {
        if arr.len() != 2 {
            return Err(ValidationError::on_field(key, format!("'{key}' array form must have exactly two elements")));
        }
        let min = arr[0].as_i64().map(|n| n as i32);
        let max = arr[1].as_i64().map(|n| n as i32);
        if (arr[0].is_number() && min.is_none()) || (arr[1].is_number() && max.is_none()) {
            return Err(ValidationError::on_field(key, format!("'{key}' elements must be integers")));
        }
        return Ok(Some(YearRange { min, max }));
    }

    if let Some(obj) = raw.as_object() {
        let min = obj.get("start").and_then(|v| v.as_i64()).map(|n| n as i32);
        let max = obj.get("end").and_then(|v| v.as_i64()).map(|n| n as i32);
        return Ok(Some(YearRange { min, max }));
    }

    Err(ValidationError::on_field(key, format!("'{key}' must be a [start, end] array or {{start, end}} object")))
}

fn parse_provider_tags(params: &Value, key: &str) -> Result<Option<Vec<ProviderTag>>, ValidationError> {
    let Some(raw) = opt_str_list(params, key)? else { return Ok(None) };
    let mut tags = Vec::with_capacity(raw.len());
    for s in raw {
        let tag = match s.to_uppercase().as_str() {
            "A" => ProviderTag::A,
            "B" => ProviderTag::B,
            "C" => ProviderTag::C,
            "D" => ProviderTag::D,
            other => return Err(ValidationError::on_field(key, format!("unknown source '{other}'"))),
        };
        tags.push(tag);
    }
    Ok(Some(tags))
}

#[derive(Debug, Clone)]
pub struct SearchLiteratureGraphArgs {
    pub query: String,
    pub year_range: Option<YearRange>,
    pub fields_of_study: Option<Vec<String>>,
    pub limit: usize,
    pub sources: Option<Vec<ProviderTag>>,
}

pub fn validate_search_literature_graph(params: &Value) -> Result<SearchLiteratureGraphArgs, ValidationError> {
    Ok(SearchLiteratureGraphArgs {
        query: require_str(params, "query")?,
        year_range: normalize_year_range(params, "year_range")?,
        fields_of_study: opt_str_list(params, "fields_of_study")?,
        limit: usize_with_default(params, "limit", 10)?,
        sources: parse_provider_tags(params, "sources")?,
    })
}

#[derive(Debug, Clone)]
pub struct SearchGoogleScholarKeyWordsArgs {
    pub query: String,
    pub num_results: usize,
    pub start: usize,
    pub language: String,
}

pub fn validate_search_google_scholar_key_words(params: &Value) -> Result<SearchGoogleScholarKeyWordsArgs, ValidationError> {
    Ok(SearchGoogleScholarKeyWordsArgs {
        query: require_str(params, "query")?,
        num_results: usize_with_default(params, "num_results", 5)?,
        start: usize_with_default(params, "start", 0)?,
        language: string_with_default(params, "language", "en")?,
    })
}

#[derive(Debug, Clone)]
pub struct SearchGoogleScholarAdvancedArgs {
    pub query: String,
    pub author: Option<String>,
    pub year_range: Option<YearRange>,
    pub exact_phrase: Option<String>,
    pub exclude_words: Option<Vec<String>>,
    pub title_only: bool,
    pub num_results: usize,
    pub start: usize,
    pub language: String,
}

pub fn validate_search_google_scholar_advanced(params: &Value) -> Result<SearchGoogleScholarAdvancedArgs, ValidationError> {
    Ok(SearchGoogleScholarAdvancedArgs {
        query: require_str(params, "query")?,
        author: opt_str(params, "author")?,
        year_range: normalize_year_range(params, "year_range")?,
        exact_phrase: opt_str(params, "exact_phrase")?,
        exclude_words: opt_str_list(params, "exclude_words")?,
        title_only: bool_with_default(params, "title_only", false)?,
        num_results: usize_with_default(params, "num_results", 5)?,
        start: usize_with_default(params, "start", 0)?,
        language: string_with_default(params, "language", "en")?,
    })
}

#[derive(Debug, Clone)]
pub struct GetAuthorInfoArgs {
    pub author_name: String,
    pub max_publications: usize,
    pub language: String,
}

pub fn validate_get_author_info(params: &Value) -> Result<GetAuthorInfoArgs, ValidationError> {
    Ok(GetAuthorInfoArgs {
        author_name: require_str(params, "author_name")?,
        max_publications: usize_with_default(params, "max_publications", 5)?,
        language: string_with_default(params, "language", "en")?,
    })
}

#[derive(Debug, Clone)]
pub struct IngestPaperFulltextArgs {
    pub doi: Option<String>,
    pub paper_url: Option<String>,
    pub pdf_url: Option<String>,
    pub local_pdf_path: Option<String>,
    pub parse_mode: String,
    pub ocr_enabled: bool,
}

pub fn validate_ingest_paper_fulltext(params: &Value) -> Result<IngestPaperFulltextArgs, ValidationError> {
    let args = IngestPaperFulltextArgs {
        doi: opt_str(params, "doi")?,
        paper_url: opt_str(params, "paper_url")?,
        pdf_url: opt_str(params, "pdf_url")?,
        local_pdf_path: opt_str(params, "local_pdf_path")?,
        parse_mode: string_with_default(params, "parse_mode", "auto")?,
        ocr_enabled: bool_with_default(params, "ocr_enabled", true)?,
    };
    if !matches!(args.parse_mode.as_str(), "auto" | "structured" | "simple") {
        return Err(ValidationError::on_field("parse_mode", "'parse_mode' must be one of auto, structured, simple"));
    }
    if args.doi.is_none() && args.paper_url.is_none() && args.pdf_url.is_none() && args.local_pdf_path.is_none() {
        return Err(ValidationError::new("at least one of doi, paper_url, pdf_url, local_pdf_path is required"));
    }
    Ok(args)
}

#[derive(Debug, Clone)]
pub struct GetIngestionStatusArgs {
    pub job_id: String,
}

pub fn validate_get_ingestion_status(params: &Value) -> Result<GetIngestionStatusArgs, ValidationError> {
    Ok(GetIngestionStatusArgs { job_id: require_str(params, "job_id")? })
}

#[derive(Debug, Clone)]
pub struct ExtractGranularPaperDetailsArgs {
    pub document_id: String,
    pub sections: Option<Vec<String>>,
    pub include_references: bool,
}

pub fn validate_extract_granular_paper_details(params: &Value) -> Result<ExtractGranularPaperDetailsArgs, ValidationError> {
    Ok(ExtractGranularPaperDetailsArgs {
        document_id: require_str(params, "document_id")?,
        sections: opt_str_list(params, "sections")?,
        include_references: bool_with_default(params, "include_references", true)?,
    })
}

#[derive(Debug, Clone)]
pub struct SuggestContextualCitationsArgs {
    pub manuscript_text: String,
    pub cursor_context: Option<String>,
    pub style: CitationStyle,
    pub k: usize,
    pub recency_bias: f64,
}

pub fn validate_suggest_contextual_citations(params: &Value) -> Result<SuggestContextualCitationsArgs, ValidationError> {
    Ok(SuggestContextualCitationsArgs {
        manuscript_text: require_str(params, "manuscript_text")?,
        cursor_context: opt_str(params, "cursor_context")?,
        style: style_with_default(params, "style", CitationStyle::Apa)?,
        k: usize_with_default(params, "k", 10)?,
        recency_bias: f64_bounded(params, "recency_bias", 0.5, 0.0, 1.0)?,
    })
}

#[derive(Debug, Clone)]
pub struct BuildReferenceListArgs {
    pub style: CitationStyle,
    pub locale: String,
    pub manuscript_text: Option<String>,
    pub works: Option<Vec<Value>>,
}

pub fn validate_build_reference_list(params: &Value) -> Result<BuildReferenceListArgs, ValidationError> {
    let manuscript_text = opt_str(params, "manuscript_text")?;
    let works = match field(params, "works") {
        None => None,
        Some(v) => {
            let arr = v.as_array().ok_or_else(|| ValidationError::on_field("works", "'works' must be an array"))?;
            Some(arr.clone())
        }
    };
    if manuscript_text.is_none() && works.is_none() {
        return Err(ValidationError::new("at least one of manuscript_text, works is required"));
    }
    Ok(BuildReferenceListArgs {
        style: style_with_default(params, "style", CitationStyle::Apa)?,
        locale: string_with_default(params, "locale", "en-US")?,
        manuscript_text,
        works,
    })
}

#[derive(Debug, Clone)]
pub struct ValidationReferenceArg {
    pub id: Option<String>,
    pub formatted: String,
    pub bibtex: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidateManuscriptCitationsArgs {
    pub manuscript_text: String,
    pub style: Option<CitationStyle>,
    pub references: Vec<ValidationReferenceArg>,
}

pub fn validate_validate_manuscript_citations(params: &Value) -> Result<ValidateManuscriptCitationsArgs, ValidationError> {
    let manuscript_text = require_str(params, "manuscript_text")?;
    let style = match field(params, "style").and_then(|v| v.as_str()) {
        None => None,
        Some(raw) => Some(
            CitationStyle::parse(raw)
                .ok_or_else(|| ValidationError::on_field("style", "'style' must be one of apa, ieee, chicago, vancouver"))?,
        ),
    };

    let raw_refs = field(params, "references")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ValidationError::on_field("references", "'references' is required and must be an array"))?;

    let mut references = Vec::with_capacity(raw_refs.len());
    for (idx, raw) in raw_refs.iter().enumerate() {
        let formatted = raw
            .get("formatted")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::on_field("references", format!("references[{idx}].formatted is required")))?
            .to_string();
        let id = raw.get("id").and_then(|v| v.as_str()).map(|s| s.to_string());
        let bibtex = raw.get("bibtex").and_then(|v| v.as_str()).map(|s| s.to_string());
        references.push(ValidationReferenceArg { id, formatted, bibtex });
    }

    Ok(ValidateManuscriptCitationsArgs { manuscript_text, style, references })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn year_range_accepts_array_form() {
        let params = json!({"year_range": [2019, 2023]});
        let range = normalize_year_range(&params, "year_range").unwrap().unwrap();
        assert_eq!(range.min, Some(2019));
        assert_eq!(range.max, Some(2023));
    }

    #[test]
    fn year_range_accepts_mapping_form() {
        let params = json!({"year_range": {"start": 2019, "end": 2023}});
        let range = normalize_year_range(&params, "year_range").unwrap().unwrap();
        assert_eq!(range.min, Some(2019));
        assert_eq!(range.max, Some(2023));
    }

    #[test]
    fn year_range_rejects_malformed_array() {
        let params = json!({"year_range": [2019, 2020, 2021]});
        assert!(normalize_year_range(&params, "year_range").is_err());
    }

    #[test]
    fn search_literature_graph_requires_query() {
        let params = json!({});
        assert!(validate_search_literature_graph(&params).is_err());
    }

    #[test]
    fn ingest_paper_fulltext_requires_a_source_field() {
        let params = json!({"parse_mode": "auto"});
        assert!(validate_ingest_paper_fulltext(&params).is_err());
    }

    #[test]
    fn ingest_paper_fulltext_rejects_unknown_parse_mode() {
        let params = json!({"doi": "10.1/x", "parse_mode": "ocr"});
        assert!(validate_ingest_paper_fulltext(&params).is_err());
    }

    #[test]
    fn suggest_contextual_citations_rejects_out_of_bounds_recency_bias() {
        let params = json!({"manuscript_text": "x", "recency_bias": 1.5});
        assert!(validate_suggest_contextual_citations(&params).is_err());
    }

    #[test]
    fn build_reference_list_requires_manuscript_or_works() {
        let params = json!({"style": "apa"});
        assert!(validate_build_reference_list(&params).is_err());
    }
}

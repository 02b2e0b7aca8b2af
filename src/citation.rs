//! Citation engine (C7): contextual suggestion, reference-list assembly,
//! and manuscript citation validation (§4.7).

pub mod style;

use crate::aggregator::{citation_score, recency_score, LiteratureAggregator, SearchGraphInput};
use crate::model::{CanonicalWork, CitationCandidate, CommonStyleWork, ReferenceEntry};
use crate::providers::normalize_title_key;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use style::CitationStyle;

fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= 4 && w.chars().all(|c| c.is_ascii_alphanumeric()))
        .collect()
}

fn overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let denom = a.len().max(b.len());
    if denom == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / denom as f64
}

fn last_window(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        text.to_string()
    } else {
        chars[chars.len() - max_chars..].iter().collect()
    }
}

fn first_window(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn derived_query(window: &str, manuscript_text: &str) -> String {
    let tokens = tokenize(window);
    if tokens.is_empty() {
        return first_window(manuscript_text, 200);
    }
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for token in &tokens {
        *counts.entry(token.clone()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(12).map(|(t, _)| t).collect::<Vec<_>>().join(" ")
}

pub struct SuggestInput {
    pub manuscript_text: String,
    pub cursor_context: Option<String>,
    pub k: usize,
    pub recency_bias: f64,
}

pub struct SuggestOutput {
    pub candidates: Vec<CitationCandidate>,
    pub query_used: String,
}

/// `suggest(input) -> CitationCandidate[]` (§4.7), plus the derived search
/// query driving the candidate search, surfaced for caller diagnostics.
pub async fn suggest(aggregator: &LiteratureAggregator, input: SuggestInput) -> SuggestOutput {
    let window_source = input.cursor_context.as_deref().unwrap_or(&input.manuscript_text);
    let window = last_window(window_source, 2500);
    let query = derived_query(&window, &input.manuscript_text);
    let context_tokens: HashSet<String> = tokenize(&window).into_iter().collect();

    let limit = (input.k.max(3 * input.k)).min(30);
    let search_input = SearchGraphInput { query: query.clone(), limit, ..Default::default() };
    let result = aggregator.search_graph(search_input).await;

    let mut candidates: Vec<CitationCandidate> = result
        .results
        .into_iter()
        .map(|work| {
            let work_text = format!("{} {}", work.title, work.r#abstract.clone().unwrap_or_default());
            let work_tokens: HashSet<String> = tokenize(&work_text).into_iter().collect();
            let overlap_score = overlap(&context_tokens, &work_tokens);
            let citation_component = citation_score(work.counts.total).min(1.0);
            let recency_component = clamp(recency_score(work.year) * input.recency_bias.max(0.0), 0.0, 1.0);
            let score = 0.55 * overlap_score + 0.3 * citation_component + 0.15 * recency_component;
            let matched_context = work
                .r#abstract
                .as_deref()
                .map(|a| first_window(a, 280))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| work.title.clone());
            CitationCandidate { work, relevance_score: score, rationale: "context token overlap".to_string(), matched_context }
        })
        .collect();

    candidates.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap());
    candidates.truncate(input.k);
    SuggestOutput { candidates, query_used: query }
}

pub struct ReferenceListInput {
    pub style: CitationStyle,
    pub works: Option<Vec<CanonicalWork>>,
    pub manuscript_text: Option<String>,
}

pub struct ReferenceListResult {
    pub entries: Vec<ReferenceEntry>,
    pub bibliography_text: String,
}

/// `buildList(input) -> {entries, bibliographyText}` (§4.7).
pub async fn build_list(aggregator: &LiteratureAggregator, input: ReferenceListInput) -> ReferenceListResult {
    let works: Vec<CanonicalWork> = match input.works {
        Some(works) => works,
        None => {
            let manuscript_text = input.manuscript_text.unwrap_or_default();
            let output = suggest(
                aggregator,
                SuggestInput { manuscript_text, cursor_context: None, k: 15, recency_bias: 0.6 },
            )
            .await;
            output.candidates.into_iter().map(|c| c.work).collect()
        }
    };

    let mut seen = HashSet::new();
    let mut deduped = Vec::new();
    for work in works {
        let key = work.doi.clone().unwrap_or_else(|| work.canonical_id.clone());
        if seen.insert(key) {
            deduped.push(work);
        }
    }

    let mut entries = Vec::new();
    let mut bibliography_lines = Vec::new();

    for (idx, work) in deduped.into_iter().enumerate() {
        let common = CommonStyleWork::from(&work);
        let (formatted_text, structured_export) = match style::format_work(input.style, &common) {
            Ok(pair) => pair,
            Err(()) => style::fallback_format(&common),
        };
        bibliography_lines.push(formatted_text.clone());
        entries.push(ReferenceEntry {
            id: format!("ref-{idx}"),
            common_style_object: common,
            formatted_text,
            structured_export,
            source_work: work,
        });
    }

    ReferenceListResult { bibliography_text: bibliography_lines.join("\n"), entries }
}

static NUMERIC_CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("static regex"));
static RANGE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,4})-(\d{1,4})$").expect("static regex"));
static SINGLE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,4}$").expect("static regex"));
static AUTHOR_YEAR_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^()]*\d{4}[a-z]?[^()]*)\)").expect("static regex"));
static AUTHOR_YEAR_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z][A-Za-z\-']+)(?:\s+(?:et al\.?|and|&)\s+[A-Za-z\-']+)?,?\s+(\d{4}[a-z]?)").expect("static regex"));
static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[\s*\]|\[TODO\]|\[CITATION\]").expect("static regex"));
static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(19|20)\d{2}").expect("static regex"));

#[derive(Debug, Clone)]
pub struct ValidationReference {
    pub id: Option<String>,
    pub formatted: String,
    pub bibtex: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompletenessDiagnostic {
    pub reference_index: usize,
    pub missing_fields: Vec<String>,
    pub has_persistent_identifier: bool,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DuplicateDiagnostic {
    pub key: String,
    pub reference_indices: Vec<usize>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ValidationResult {
    pub missing_references: Vec<String>,
    pub uncited_references: Vec<usize>,
    pub duplicate_references: Vec<DuplicateDiagnostic>,
    pub completeness_diagnostics: Vec<CompletenessDiagnostic>,
    pub style_warnings: Vec<String>,
    pub inline_citation_count: usize,
}

/// `validate(manuscript, references, options?) -> ValidationResult` (§4.7).
pub fn validate(manuscript: &str, references: &[ValidationReference], expected_style: Option<CitationStyle>) -> ValidationResult {
    let mut numeric_ordinals: HashSet<u32> = HashSet::new();
    let mut invalid_chunks = Vec::new();
    let mut has_numeric = false;
    let mut has_author_year = false;
    let mut cited_surnames: HashSet<String> = HashSet::new();
    let mut inline_citation_count: usize = 0;

    for capture in NUMERIC_CITATION.captures_iter(manuscript) {
        let inner = &capture[1];
        if PLACEHOLDER_PATTERN.is_match(&format!("[{inner}]")) {
            continue;
        }
        let mut chunk_is_numeric = false;
        for part in inner.split(|c| c == ',' || c == ';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some(range) = RANGE_PATTERN.captures(part) {
                let a: u32 = range[1].parse().unwrap_or(0);
                let b: u32 = range[2].parse().unwrap_or(0);
                if a <= b && b <= a + 100 {
                    chunk_is_numeric = true;
                    for n in a..=b {
                        numeric_ordinals.insert(n);
                        inline_citation_count += 1;
                    }
                } else {
                    invalid_chunks.push(part.to_string());
                }
            } else if SINGLE_PATTERN.is_match(part) {
                chunk_is_numeric = true;
                numeric_ordinals.insert(part.parse().unwrap_or(0));
                inline_citation_count += 1;
            } else {
                invalid_chunks.push(part.to_string());
            }
        }
        if chunk_is_numeric {
            has_numeric = true;
        }
    }

    for group_capture in AUTHOR_YEAR_GROUP.captures_iter(manuscript) {
        let group = &group_capture[1];
        for entry in AUTHOR_YEAR_ENTRY.captures_iter(group) {
            has_author_year = true;
            cited_surnames.insert(entry[1].to_lowercase());
            inline_citation_count += 1;
        }
    }

    let placeholders_present = PLACEHOLDER_PATTERN.is_match(manuscript);

    let reference_count = references.len();
    let mut missing_references = Vec::new();
    for ordinal in &numeric_ordinals {
        if *ordinal == 0 || *ordinal as usize > reference_count {
            missing_references.push(format!("[{ordinal}]"));
        }
    }

    let reference_surnames: Vec<HashSet<String>> = references
        .iter()
        .map(|r| {
            AUTHOR_YEAR_ENTRY
                .captures_iter(&r.formatted)
                .map(|c| c[1].to_lowercase())
                .chain(
                    r.formatted
                        .split(|c: char| c == ',' || c == '.')
                        .next()
                        .map(|s| s.trim().to_lowercase())
                        .into_iter(),
                )
                .collect::<HashSet<String>>()
        })
        .collect();

    for surname in &cited_surnames {
        if !reference_surnames.iter().any(|names| names.contains(surname)) {
            missing_references.push(surname.clone());
        }
    }

    let mut uncited_references = Vec::new();
    for (idx, surnames) in reference_surnames.iter().enumerate() {
        let one_based = idx + 1;
        let cited_numerically = numeric_ordinals.contains(&(one_based as u32));
        let cited_by_surname = surnames.iter().any(|s| cited_surnames.contains(s));
        if !cited_numerically && !cited_by_surname {
            uncited_references.push(idx);
        }
    }

    let mut duplicate_groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, reference) in references.iter().enumerate() {
        let key = duplicate_key(reference);
        duplicate_groups.entry(key).or_default().push(idx);
    }
    let duplicate_references: Vec<DuplicateDiagnostic> = duplicate_groups
        .into_iter()
        .filter(|(_, indices)| indices.len() > 1)
        .map(|(key, reference_indices)| DuplicateDiagnostic { key, reference_indices })
        .collect();

    let mut completeness_diagnostics = Vec::new();
    let mut missing_identifier_count = 0usize;
    for (idx, reference) in references.iter().enumerate() {
        let text = &reference.formatted;
        let has_author = text.split([',', '.']).next().map(|s| !s.trim().is_empty()).unwrap_or(false);
        let has_year = YEAR_PATTERN.is_match(text);
        let has_title = text.split_whitespace().count() >= 4;
        let has_source = text.to_lowercase().contains("doi.org/")
            || text.to_lowercase().contains("http")
            || text.split_whitespace().count() >= 8;

        let mut missing_fields = Vec::new();
        if !has_author {
            missing_fields.push("author".to_string());
        }
        if !has_year {
            missing_fields.push("year".to_string());
        }
        if !has_title {
            missing_fields.push("title".to_string());
        }
        if !has_source {
            missing_fields.push("source".to_string());
        }

        let has_doi = normalize_title_key(text).contains("doi") || text.to_lowercase().contains("doi:");
        let has_url = text.to_lowercase().contains("http");
        let has_persistent_identifier = has_doi || has_url;
        if !has_persistent_identifier {
            missing_identifier_count += 1;
        }

        let suggestion = if has_doi && !text.to_lowercase().contains("doi.org/") {
            Some("Append the DOI as a resolvable https://doi.org/ link.".to_string())
        } else {
            None
        };

        completeness_diagnostics.push(CompletenessDiagnostic {
            reference_index: idx,
            missing_fields,
            has_persistent_identifier,
            suggestion,
        });
    }

    let mut style_warnings = Vec::new();
    if placeholders_present {
        style_warnings.push("Manuscript contains unresolved citation placeholders.".to_string());
    }
    if !invalid_chunks.is_empty() {
        style_warnings.push(format!("Invalid citation bracket chunks: {}", invalid_chunks.join(", ")));
    }
    if has_numeric && has_author_year {
        style_warnings.push("Mixed numeric and author-year citation patterns detected.".to_string());
    }
    if let Some(style) = expected_style {
        match style {
            CitationStyle::Ieee | CitationStyle::Vancouver if has_author_year => {
                style_warnings.push("Author-year citations found but style expects numeric citations.".to_string());
            }
            CitationStyle::Apa | CitationStyle::Chicago if has_numeric => {
                style_warnings.push("Numeric citations found but style expects author-year citations.".to_string());
            }
            CitationStyle::Apa if missing_identifier_count > 0 => {
                style_warnings
                    .push(format!("{missing_identifier_count} reference(s) missing a persistent identifier."));
            }
            _ => {}
        }
    }
    if references.is_empty() {
        style_warnings.push("Reference list is empty.".to_string());
    }

    missing_references.sort();
    missing_references.dedup();
    uncited_references.sort();

    ValidationResult {
        missing_references,
        uncited_references,
        duplicate_references,
        completeness_diagnostics,
        style_warnings,
        inline_citation_count,
    }
}

fn duplicate_key(reference: &ValidationReference) -> String {
    if let Some(doi_idx) = reference.formatted.to_lowercase().find("doi.org/") {
        let rest = &reference.formatted[doi_idx + 8..];
        let doi: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
        if !doi.is_empty() {
            return format!("doi:{}", doi.to_lowercase());
        }
    }
    let title_like = normalize_whitespace(&reference.formatted).to_lowercase();
    let year = YEAR_PATTERN.find(&reference.formatted).map(|m| m.as_str().to_string()).unwrap_or_default();
    format!("{}::{}", normalize_title_key(&title_like), year)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(formatted: &str) -> ValidationReference {
        ValidationReference { id: None, formatted: formatted.to_string(), bibtex: None }
    }

    #[test]
    fn numeric_citation_range_expands_within_bound() {
        let manuscript = "Prior work established this [1-3] and more recently [9].";
        let refs: Vec<ValidationReference> = (0..9).map(|i| reference(&format!("Author {i}, Title {i}. 2020."))).collect();
        let result = validate(manuscript, &refs, None);
        assert!(result.missing_references.is_empty());
    }

    #[test]
    fn flags_out_of_range_numeric_citation() {
        let manuscript = "See [42] for details.";
        let refs = vec![reference("Smith, A. Paper Title. 2020.")];
        let result = validate(manuscript, &refs, None);
        assert!(result.missing_references.contains(&"[42]".to_string()));
    }

    #[test]
    fn detects_mixed_citation_styles() {
        let manuscript = "As shown [1], and also (Smith, 2020) argue similarly.";
        let refs = vec![reference("Smith, A. Paper Title. 2020.")];
        let result = validate(manuscript, &refs, None);
        assert!(result.style_warnings.iter().any(|w| w.contains("Mixed")));
    }

    #[test]
    fn empty_reference_list_warns() {
        let result = validate("No citations here.", &[], None);
        assert!(result.style_warnings.contains(&"Reference list is empty.".to_string()));
    }

    #[test]
    fn duplicate_references_grouped_by_doi() {
        let refs = vec![
            reference("Smith, A. Title One. 2020. https://doi.org/10.1/x"),
            reference("Smith, A. Title One Duplicate. 2021. https://doi.org/10.1/x"),
        ];
        let result = validate("", &refs, None);
        assert_eq!(result.duplicate_references.len(), 1);
        assert_eq!(result.duplicate_references[0].reference_indices.len(), 2);
    }

    #[test]
    fn placeholder_detection() {
        let result = validate("We cite this [TODO] result.", &[reference("Smith, A. Title. 2020.")], None);
        assert!(result.style_warnings.iter().any(|w| w.contains("placeholder")));
    }

    #[test]
    fn inline_citation_count_sums_numeric_range_and_author_year() {
        let manuscript = "Recent studies support this claim [1-3]. (Doe, 2023). [TODO]";
        let refs = vec![
            reference("Smith, A. A Survey of Retrieval Methods. 2021. https://doi.org/10.1/aaa"),
            reference("Lee, B. Graph Based Ranking. 2022. https://doi.org/10.1/bbb"),
        ];
        let result = validate(manuscript, &refs, None);
        assert_eq!(result.inline_citation_count, 4, "[1-3] contributes 3, (Doe, 2023) contributes 1");
    }
}

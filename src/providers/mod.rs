//! Provider adapters (C2): four catalogs mapped onto one `ProviderWork` shape.
//!
//! Catalog A (OpenAlex-style) decodes inverted-index abstracts. Catalog B
//! (Semantic-Scholar-style) strips HTML-embedded abstracts. Catalog C
//! (Crossref-style) additionally resolves works directly by DOI. Provider D
//! is the Google Scholar HTML scraper, out of scope for its internals per
//! the spec but still implementing the shared adapter interface.

pub mod catalog_a;
pub mod catalog_b;
pub mod catalog_c;
pub mod scholar;

use crate::error::ProviderError;
use crate::model::ProviderWork;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Shared capability every provider adapter implements (§9 "polymorphic providers").
#[async_trait]
pub trait SourceProvider: Send + Sync {
    fn tag(&self) -> crate::model::ProviderTag;

    async fn search_works(&self, query: &str, limit: usize) -> Result<Vec<ProviderWork>, ProviderError>;

    /// Only the DOI-resolving catalog (C) implements this meaningfully.
    async fn get_work_by_doi(&self, _doi: &str) -> Result<Option<ProviderWork>, ProviderError> {
        Ok(None)
    }
}

static DOI_URL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://(dx\.)?doi\.org/").expect("static regex"));
static YEAR_IN_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(19|20)\d{2}").expect("static regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static TAG_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// DOI normalization: lowercase, strip a `https?://(dx.)?doi.org/` prefix (§4.2).
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize_doi(raw: &str) -> String {
    let stripped = DOI_URL_PREFIX.replace(raw.trim(), "");
    stripped.to_lowercase()
}

/// Lowercase ASCII token stream used for title/author comparisons.
pub fn normalize_title_key(title: &str) -> String {
    let collapsed = collapse_whitespace(title).to_lowercase();
    collapsed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse runs of whitespace to a single space and trim ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").to_string()
}

/// Strip HTML tag markup and collapse whitespace (catalog B, §4.2).
pub fn strip_html(html: &str) -> String {
    let untagged = TAG_STRIP.replace_all(html, " ");
    collapse_whitespace(&untagged)
}

/// Accept an integer 1000-2100, else the first `(19|20)\d\d` occurrence in a
/// string, else `None` (§4.2 year parsing).
pub fn parse_year(raw: &serde_json::Value) -> Option<i32> {
    match raw {
        serde_json::Value::Number(n) => {
            let v = n.as_i64()?;
            if (1000..=2100).contains(&v) {
                Some(v as i32)
            } else {
                None
            }
        }
        serde_json::Value::String(s) => parse_year_from_str(s),
        _ => None,
    }
}

pub fn parse_year_from_str(s: &str) -> Option<i32> {
    YEAR_IN_TEXT.find(s).and_then(|m| m.as_str().parse::<i32>().ok())
}

/// Inverted-index abstract decoding (catalog A, §4.2): input is a mapping
/// `token -> positions[]`; output is `positions`-ordered token concatenation;
/// missing positions produce empty words; multiple whitespace collapsed.
pub fn inverted_index_to_text(index: &BTreeMap<String, Vec<u32>>) -> String {
    let max_position = index.values().flatten().copied().max();
    let Some(max_position) = max_position else {
        return String::new();
    };

    let mut words: Vec<&str> = vec![""; (max_position + 1) as usize];
    for (token, positions) in index {
        for &pos in positions {
            if let Some(slot) = words.get_mut(pos as usize) {
                *slot = token.as_str();
            }
        }
    }

    collapse_whitespace(&words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doi_normalization_is_idempotent() {
        let raw = "https://doi.org/10.1234/ABCD";
        let once = normalize_doi(raw);
        let twice = normalize_doi(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "10.1234/abcd");
    }

    #[test]
    fn doi_normalization_handles_dx_prefix() {
        assert_eq!(normalize_doi("https://dx.doi.org/10.1/X"), "10.1/x");
    }

    #[test]
    fn year_parsing_extracts_first_match() {
        assert_eq!(parse_year_from_str("Published in 2021, revised 2023"), Some(2021));
        assert_eq!(parse_year_from_str("no year here"), None);
    }

    #[test]
    fn inverted_index_decodes_in_position_order() {
        let mut index = BTreeMap::new();
        index.insert("Deep".to_string(), vec![0]);
        index.insert("learning".to_string(), vec![1]);
        index.insert("rocks".to_string(), vec![3]);
        assert_eq!(inverted_index_to_text(&index), "Deep learning rocks");
    }

    #[test]
    fn strip_html_removes_tags_and_collapses_whitespace() {
        assert_eq!(strip_html("<p>Hello   <b>world</b></p>"), "Hello world");
    }
}

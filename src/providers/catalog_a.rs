//! Catalog A: an OpenAlex-style JSON API. Abstracts arrive as an inverted
//! index (`token -> positions[]`) that must be reconstructed into text.

use super::{inverted_index_to_text, normalize_doi, parse_year, SourceProvider};
use crate::error::ProviderError;
use crate::fetch::{FetchOptions, FetchRequest, PacingFetcher};
use crate::model::{Author, CitationCounts, OpenAccess, ProviderTag, ProviderWork};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

pub struct CatalogAProvider {
    base_url: String,
    fetcher: Arc<PacingFetcher>,
    options: FetchOptions,
}

impl CatalogAProvider {
    pub fn new(base_url: impl Into<String>, fetcher: Arc<PacingFetcher>) -> Self {
        Self::with_options(base_url, fetcher, FetchOptions::default())
    }

    pub fn with_options(base_url: impl Into<String>, fetcher: Arc<PacingFetcher>, options: FetchOptions) -> Self {
        Self { base_url: base_url.into(), fetcher, options }
    }

    fn parse_work(&self, raw: &serde_json::Value) -> Option<ProviderWork> {
        let title = raw.get("title")?.as_str().unwrap_or("").to_string();
        let title = ProviderWork::normalize_title(&title);

        let abstract_text = raw
            .get("abstract_inverted_index")
            .and_then(|v| v.as_object())
            .map(|obj| {
                let mut index: BTreeMap<String, Vec<u32>> = BTreeMap::new();
                for (token, positions) in obj {
                    let positions: Vec<u32> = positions
                        .as_array()
                        .map(|arr| arr.iter().filter_map(|p| p.as_u64()).map(|p| p as u32).collect())
                        .unwrap_or_default();
                    index.insert(token.clone(), positions);
                }
                inverted_index_to_text(&index)
            })
            .filter(|s| !s.is_empty());

        let doi = raw
            .get("doi")
            .and_then(|v| v.as_str())
            .map(normalize_doi)
            .filter(|d| !d.is_empty());

        let year = raw.get("publication_year").and_then(parse_year_opt);

        let authors = raw
            .get("authorships")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| {
                        let name = a.get("author")?.get("display_name")?.as_str()?.to_string();
                        let id = a.get("author")?.get("id").and_then(|v| v.as_str()).map(|s| s.to_string());
                        Some(Author { name, provider_author_id: id })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let counts = CitationCounts {
            total: raw.get("cited_by_count").and_then(|v| v.as_u64()).unwrap_or(0),
            influential: 0,
            reference_count: raw
                .get("referenced_works")
                .and_then(|v| v.as_array())
                .map(|a| a.len() as u64)
                .unwrap_or(0),
        };

        let open_access = raw
            .get("open_access")
            .map(|oa| OpenAccess {
                is_open: oa.get("is_oa").and_then(|v| v.as_bool()).unwrap_or(false),
                pdf_url: oa.get("oa_url").and_then(|v| v.as_str()).map(|s| s.to_string()),
                license: None,
            })
            .unwrap_or_default();

        let fields_of_study: BTreeSet<String> = raw
            .get("concepts")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|c| c.get("display_name")?.as_str().map(|s| s.to_string())).collect())
            .unwrap_or_default();

        let mut external_ids = HashMap::new();
        if let Some(ids) = raw.get("ids").and_then(|v| v.as_object()) {
            for (k, v) in ids {
                if let Some(s) = v.as_str() {
                    external_ids.insert(k.clone(), s.to_string());
                }
            }
        }

        Some(ProviderWork {
            provider: ProviderTag::A,
            provider_local_id: raw.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            title,
            r#abstract: abstract_text,
            year,
            venue: raw
                .get("host_venue")
                .and_then(|v| v.get("display_name"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            doi,
            landing_url: raw.get("id").and_then(|v| v.as_str()).map(|s| s.to_string()),
            counts,
            authors,
            open_access,
            external_ids,
            fields_of_study,
            relevance: raw.get("relevance_score").and_then(|v| v.as_f64()).unwrap_or(ProviderTag::A.default_relevance()),
            source_url: format!("{}/works", self.base_url),
        })
    }
}

fn parse_year_opt(v: &serde_json::Value) -> Option<i32> {
    parse_year(v)
}

#[async_trait]
impl SourceProvider for CatalogAProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::A
    }

    async fn search_works(&self, query: &str, limit: usize) -> Result<Vec<ProviderWork>, ProviderError> {
        let url = format!(
            "{}/works?search={}&per-page={}",
            self.base_url,
            urlencoding_encode(query),
            limit
        );
        let req = FetchRequest::get(&url).with_options(&self.options);
        let response = self.fetcher.execute(req).await?;
        let body = response.into_json().ok_or_else(|| ProviderError::new("A", &url, "expected JSON body"))?;

        let works = body
            .get("results")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|w| self.parse_work(w)).collect())
            .unwrap_or_default();
        Ok(works)
    }
}

fn urlencoding_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inverted_index_abstract() {
        let fetcher = Arc::new(PacingFetcher::new("A"));
        let provider = CatalogAProvider::new("https://api.openalex.org", fetcher);
        let raw = serde_json::json!({
            "id": "W123",
            "title": "Graph Neural Networks",
            "publication_year": 2023,
            "doi": "https://doi.org/10.1/GNN",
            "abstract_inverted_index": {"Deep": [0], "learning": [1]},
            "cited_by_count": 42,
        });
        let work = provider.parse_work(&raw).expect("should parse");
        assert_eq!(work.r#abstract.as_deref(), Some("Deep learning"));
        assert_eq!(work.doi.as_deref(), Some("10.1/gnn"));
        assert_eq!(work.counts.total, 42);
    }
}

//! Catalog B: a Semantic-Scholar-style JSON API whose abstracts may carry
//! embedded HTML markup that must be stripped before storage (§4.2).

use super::{normalize_doi, parse_year, strip_html, SourceProvider};
use crate::error::ProviderError;
use crate::fetch::{FetchOptions, FetchRequest, PacingFetcher};
use crate::model::{Author, CitationCounts, OpenAccess, ProviderTag, ProviderWork};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub struct CatalogBProvider {
    base_url: String,
    fetcher: Arc<PacingFetcher>,
    options: FetchOptions,
}

impl CatalogBProvider {
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
            .get("abstract")
            .and_then(|v| v.as_str())
            .map(strip_html)
            .filter(|s| !s.is_empty());

        let doi = raw
            .get("externalIds")
            .and_then(|v| v.get("DOI"))
            .and_then(|v| v.as_str())
            .map(normalize_doi)
            .filter(|d| !d.is_empty());

        let year = raw.get("year").and_then(parse_year);

        let authors = raw
            .get("authors")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| {
                        let name = a.get("name")?.as_str()?.to_string();
                        let id = a.get("authorId").and_then(|v| v.as_str()).map(|s| s.to_string());
                        Some(Author { name, provider_author_id: id })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let counts = CitationCounts {
            total: raw.get("citationCount").and_then(|v| v.as_u64()).unwrap_or(0),
            influential: raw.get("influentialCitationCount").and_then(|v| v.as_u64()).unwrap_or(0),
            reference_count: raw.get("referenceCount").and_then(|v| v.as_u64()).unwrap_or(0),
        };

        let open_access = OpenAccess {
            is_open: raw.get("isOpenAccess").and_then(|v| v.as_bool()).unwrap_or(false),
            pdf_url: raw
                .get("openAccessPdf")
                .and_then(|v| v.get("url"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            license: raw
                .get("openAccessPdf")
                .and_then(|v| v.get("license"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        };

        let fields_of_study: BTreeSet<String> = raw
            .get("fieldsOfStudy")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|f| f.as_str().map(|s| s.to_string())).collect())
            .unwrap_or_default();

        let mut external_ids = HashMap::new();
        if let Some(ids) = raw.get("externalIds").and_then(|v| v.as_object()) {
            for (k, v) in ids {
                if let Some(s) = v.as_str() {
                    external_ids.insert(k.clone(), s.to_string());
                }
            }
        }

        Some(ProviderWork {
            provider: ProviderTag::B,
            provider_local_id: raw.get("paperId").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            title,
            r#abstract: abstract_text,
            year,
            venue: raw.get("venue").and_then(|v| v.as_str()).map(|s| s.to_string()),
            doi,
            landing_url: raw.get("url").and_then(|v| v.as_str()).map(|s| s.to_string()),
            counts,
            authors,
            open_access,
            external_ids,
            fields_of_study,
            relevance: raw.get("relevance").and_then(|v| v.as_f64()).unwrap_or(ProviderTag::B.default_relevance()),
            source_url: format!("{}/paper/search", self.base_url),
        })
    }
}

#[async_trait]
impl SourceProvider for CatalogBProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::B
    }

    async fn search_works(&self, query: &str, limit: usize) -> Result<Vec<ProviderWork>, ProviderError> {
        let fields = "title,abstract,year,venue,externalIds,authors,citationCount,influentialCitationCount,referenceCount,isOpenAccess,openAccessPdf,fieldsOfStudy,url,paperId";
        let url = format!(
            "{}/paper/search?query={}&limit={}&fields={}",
            self.base_url,
            urlencoding_encode(query),
            limit,
            fields
        );
        let req = FetchRequest::get(&url).with_options(&self.options);
        let response = self.fetcher.execute(req).await?;
        let body = response.into_json().ok_or_else(|| ProviderError::new("B", &url, "expected JSON body"))?;

        let works = body
            .get("data")
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
    fn strips_embedded_html_from_abstract() {
        let fetcher = Arc::new(PacingFetcher::new("B"));
        let provider = CatalogBProvider::new("https://api.semanticscholar.org/graph/v1", fetcher);
        let raw = serde_json::json!({
            "paperId": "abc",
            "title": "Retrieval Systems",
            "abstract": "<p>We study <b>retrieval</b>.</p>",
            "year": 2022,
        });
        let work = provider.parse_work(&raw).expect("should parse");
        assert_eq!(work.r#abstract.as_deref(), Some("We study retrieval ."));
    }
}

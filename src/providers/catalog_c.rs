//! Catalog C: a Crossref-style JSON API. The only adapter that additionally
//! exposes direct DOI resolution (§4.2, §4.3 `resolveByDoi`).

use super::{normalize_doi, parse_year_from_str, SourceProvider};
use crate::error::ProviderError;
use crate::fetch::{FetchOptions, FetchRequest, PacingFetcher};
use crate::model::{Author, CitationCounts, OpenAccess, ProviderTag, ProviderWork};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub struct CatalogCProvider {
    base_url: String,
    fetcher: Arc<PacingFetcher>,
    options: FetchOptions,
}

impl CatalogCProvider {
    pub fn new(base_url: impl Into<String>, fetcher: Arc<PacingFetcher>) -> Self {
        Self::with_options(base_url, fetcher, FetchOptions::default())
    }

    pub fn with_options(base_url: impl Into<String>, fetcher: Arc<PacingFetcher>, options: FetchOptions) -> Self {
        Self { base_url: base_url.into(), fetcher, options }
    }

    fn parse_work(&self, raw: &serde_json::Value) -> Option<ProviderWork> {
        let title = raw
            .get("title")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let title = ProviderWork::normalize_title(&title);

        let doi = raw.get("DOI").and_then(|v| v.as_str()).map(normalize_doi).filter(|d| !d.is_empty());

        let year = raw
            .get("published-print")
            .or_else(|| raw.get("published-online"))
            .and_then(|v| v.get("date-parts"))
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|inner| inner.as_array())
            .and_then(|inner| inner.first())
            .and_then(|v| v.as_i64())
            .map(|y| y as i32)
            .or_else(|| raw.get("issued").and_then(|v| v.as_str()).and_then(parse_year_from_str));

        let authors = raw
            .get("author")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| {
                        let given = a.get("given").and_then(|v| v.as_str()).unwrap_or("");
                        let family = a.get("family").and_then(|v| v.as_str()).unwrap_or("");
                        let name = format!("{given} {family}").trim().to_string();
                        if name.is_empty() {
                            None
                        } else {
                            Some(Author { name, provider_author_id: None })
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let counts = CitationCounts {
            total: raw.get("is-referenced-by-count").and_then(|v| v.as_u64()).unwrap_or(0),
            influential: 0,
            reference_count: raw.get("reference-count").and_then(|v| v.as_u64()).unwrap_or(0),
        };

        let fields_of_study: BTreeSet<String> = raw
            .get("subject")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|s| s.as_str().map(|s| s.to_string())).collect())
            .unwrap_or_default();

        let mut external_ids = HashMap::new();
        if let Some(doi) = &doi {
            external_ids.insert("doi".to_string(), doi.clone());
        }

        Some(ProviderWork {
            provider: ProviderTag::C,
            provider_local_id: doi.clone().unwrap_or_default(),
            title,
            r#abstract: raw.get("abstract").and_then(|v| v.as_str()).map(|s| s.to_string()),
            year,
            venue: raw
                .get("container-title")
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.first())
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            doi: doi.clone(),
            landing_url: raw.get("URL").and_then(|v| v.as_str()).map(|s| s.to_string()),
            counts,
            authors,
            open_access: OpenAccess::default(),
            external_ids,
            fields_of_study,
            relevance: raw.get("score").and_then(|v| v.as_f64()).unwrap_or(ProviderTag::C.default_relevance()),
            source_url: format!("{}/works", self.base_url),
        })
    }
}

#[async_trait]
impl SourceProvider for CatalogCProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::C
    }

    async fn search_works(&self, query: &str, limit: usize) -> Result<Vec<ProviderWork>, ProviderError> {
        let url = format!("{}/works?query={}&rows={}", self.base_url, urlencoding_encode(query), limit);
        let req = FetchRequest::get(&url).with_options(&self.options);
        let response = self.fetcher.execute(req).await?;
        let body = response.into_json().ok_or_else(|| ProviderError::new("C", &url, "expected JSON body"))?;

        let works = body
            .get("message")
            .and_then(|v| v.get("items"))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|w| self.parse_work(w)).collect())
            .unwrap_or_default();
        Ok(works)
    }

    async fn get_work_by_doi(&self, doi: &str) -> Result<Option<ProviderWork>, ProviderError> {
        let normalized = normalize_doi(doi);
        let url = format!("{}/works/{}", self.base_url, urlencoding_encode(&normalized));
        let req = FetchRequest::get(&url).with_options(&self.options);
        match self.fetcher.execute(req).await {
            Ok(response) => {
                let body = response.into_json().ok_or_else(|| ProviderError::new("C", &url, "expected JSON body"))?;
                Ok(body.get("message").and_then(|v| self.parse_work(v)))
            }
            Err(err) if err.http_status == Some(404) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn urlencoding_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crossref_style_author_names() {
        let fetcher = Arc::new(PacingFetcher::new("C"));
        let provider = CatalogCProvider::new("https://api.crossref.org", fetcher);
        let raw = serde_json::json!({
            "DOI": "10.1/XYZ",
            "title": ["Federated Search"],
            "author": [{"given": "Ada", "family": "Lovelace"}],
            "published-print": {"date-parts": [[2019]]},
        });
        let work = provider.parse_work(&raw).expect("should parse");
        assert_eq!(work.doi.as_deref(), Some("10.1/xyz"));
        assert_eq!(work.authors[0].name, "Ada Lovelace");
        assert_eq!(work.year, Some(2019));
    }
}

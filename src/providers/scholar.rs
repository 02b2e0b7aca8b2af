//! Provider D: a Google Scholar HTML scraper. Out of scope per the core
//! design (§1) beyond its adapter contract; implemented here as a thin
//! `scraper`-based parser so the tool catalog's Scholar-facing tools have a
//! real backend to call.

use super::{collapse_whitespace, parse_year_from_str, SourceProvider};
use crate::error::{ProviderError, ScholarScrapeBlockedError};
use crate::fetch::{FetchOptions, FetchRequest, PacingFetcher};
use crate::model::{Author, CitationCounts, OpenAccess, ProviderTag, ProviderWork};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub struct ScholarProvider {
    base_url: String,
    fetcher: Arc<PacingFetcher>,
    options: FetchOptions,
}

impl ScholarProvider {
    pub fn new(base_url: impl Into<String>, fetcher: Arc<PacingFetcher>) -> Self {
        Self::with_options(base_url, fetcher, FetchOptions::default())
    }

    pub fn with_options(base_url: impl Into<String>, fetcher: Arc<PacingFetcher>, options: FetchOptions) -> Self {
        Self { base_url: base_url.into(), fetcher, options }
    }

    fn detect_challenge(html: &str) -> bool {
        let lowered = html.to_lowercase();
        lowered.contains("unusual traffic") || lowered.contains("recaptcha") || lowered.contains("/sorry/")
    }

    fn parse_results(&self, html: &str) -> Vec<ProviderWork> {
        let document = Html::parse_document(html);
        let Ok(entry_selector) = Selector::parse("div.gs_r.gs_or.gs_scl") else {
            return Vec::new();
        };
        let Ok(title_selector) = Selector::parse("h3.gs_rt a") else {
            return Vec::new();
        };
        let Ok(meta_selector) = Selector::parse("div.gs_a") else {
            return Vec::new();
        };
        let Ok(snippet_selector) = Selector::parse("div.gs_rs") else {
            return Vec::new();
        };
        let Ok(cite_selector) = Selector::parse("div.gs_fl a") else {
            return Vec::new();
        };

        let mut works = Vec::new();
        for (idx, entry) in document.select(&entry_selector).enumerate() {
            let title_el = entry.select(&title_selector).next();
            let title = title_el.map(|el| collapse_whitespace(&el.text().collect::<String>())).unwrap_or_default();
            if title.is_empty() {
                continue;
            }
            let landing_url = title_el.and_then(|el| el.value().attr("href")).map(|s| s.to_string());

            let meta_text = entry
                .select(&meta_selector)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .unwrap_or_default();
            let year = parse_year_from_str(&meta_text);
            let authors: Vec<Author> = meta_text
                .split('-')
                .next()
                .unwrap_or("")
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| Author { name: s.to_string(), provider_author_id: None })
                .collect();

            let abstract_text = entry
                .select(&snippet_selector)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .filter(|s| !s.is_empty());

            let cited_by = entry
                .select(&cite_selector)
                .find_map(|el| {
                    let text = el.text().collect::<String>();
                    text.trim()
                        .strip_prefix("Cited by ")
                        .and_then(|rest| rest.trim().parse::<u64>().ok())
                })
                .unwrap_or(0);

            works.push(ProviderWork {
                provider: ProviderTag::D,
                provider_local_id: format!("scholar-{idx}"),
                title: ProviderWork::normalize_title(&title),
                r#abstract: abstract_text,
                year,
                venue: None,
                doi: None,
                landing_url,
                counts: CitationCounts { total: cited_by, influential: 0, reference_count: 0 },
                authors,
                open_access: OpenAccess::default(),
                external_ids: HashMap::new(),
                fields_of_study: BTreeSet::new(),
                relevance: ProviderTag::D.default_relevance(),
                source_url: self.base_url.clone(),
            });
        }
        works
    }
}

#[async_trait]
impl SourceProvider for ScholarProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::D
    }

    async fn search_works(&self, query: &str, limit: usize) -> Result<Vec<ProviderWork>, ProviderError> {
        self.search_paginated(query, limit, 0).await
    }
}

impl ScholarProvider {
    /// Paginated search backing `search_google_scholar_key_words` /
    /// `search_google_scholar_advanced`, whose `start` offset has no
    /// equivalent on the shared `SourceProvider::search_works` signature.
    pub async fn search_paginated(
        &self,
        query: &str,
        num_results: usize,
        start: usize,
    ) -> Result<Vec<ProviderWork>, ProviderError> {
        let url = format!(
            "{}/scholar?q={}&start={}",
            self.base_url,
            urlencoding_encode(query),
            start
        );
        let req = FetchRequest::get(&url).binary().with_options(&self.options);
        let response = self.fetcher.execute(req).await?;
        let (_, body) = response.into_bytes().ok_or_else(|| ProviderError::new("D", &url, "expected HTML body"))?;
        let html = String::from_utf8_lossy(&body).to_string();

        if Self::detect_challenge(&html) {
            let blocked = ScholarScrapeBlockedError::new("anti-automation challenge page detected");
            return Err(ProviderError::new("D", &url, blocked.to_string()));
        }

        let mut works = self.parse_results(&html);
        works.truncate(num_results);
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
    fn detects_anti_automation_challenge() {
        assert!(ScholarProvider::detect_challenge("Our systems have detected unusual traffic"));
        assert!(!ScholarProvider::detect_challenge("<html>normal results</html>"));
    }

    #[test]
    fn parses_result_entries() {
        let fetcher = Arc::new(PacingFetcher::new("D"));
        let provider = ScholarProvider::new("https://scholar.google.com", fetcher);
        let html = r#"
            <div class="gs_r gs_or gs_scl">
                <h3 class="gs_rt"><a href="https://example.org/paper">Graph Retrieval</a></h3>
                <div class="gs_a">A Smith, B Jones - 2021 - example.org</div>
                <div class="gs_rs">We study graph based retrieval systems.</div>
                <div class="gs_fl"><a>Cited by 12</a></div>
            </div>
        "#;
        let works = provider.parse_results(html);
        assert_eq!(works.len(), 1);
        assert_eq!(works[0].title, "Graph Retrieval");
        assert_eq!(works[0].year, Some(2021));
        assert_eq!(works[0].counts.total, 12);
    }
}

//! Literature aggregator (C3): fans a query out to the provider adapters
//! (C2) in parallel, canonicalizes and fuzzy-dedupes the results across
//! providers, ranks them, and caches the final payload.

use crate::error::ProviderError;
use crate::model::{CanonicalWork, CitationCounts, OpenAccess, ProvenanceEntry, ProviderTag, ProviderWork};
use crate::observability::{log_operation, Operation, OperationContext};
use crate::providers::{normalize_title_key, SourceProvider};
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One provider failure captured during fan-out; never fails the aggregate call (§4.3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProviderErrorEntry {
    pub provider: String,
    pub message: String,
}

impl From<ProviderError> for ProviderErrorEntry {
    fn from(err: ProviderError) -> Self {
        Self { provider: err.provider.clone(), message: err.message.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct SearchGraphInput {
    pub query: String,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub fields_of_study: Option<Vec<String>>,
    pub limit: usize,
    pub sources: Option<Vec<ProviderTag>>,
}

impl Default for SearchGraphInput {
    fn default() -> Self {
        Self {
            query: String::new(),
            min_year: None,
            max_year: None,
            fields_of_study: None,
            limit: 10,
            sources: None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    pub results: Vec<CanonicalWork>,
    pub provider_errors: Vec<ProviderErrorEntry>,
}

struct CacheEntry {
    payload: SearchResult,
    inserted_at: Instant,
}

/// Search cache: bounded by insertion order (FIFO eviction), TTL-expired on access (§3, §4.3).
struct SearchCache {
    entries: IndexMap<String, CacheEntry>,
}

impl SearchCache {
    fn new() -> Self {
        Self { entries: IndexMap::new() }
    }
}

/// Fixed provider scheduling weight (§4.3 `providerWeight`), also usable to order
/// which providers are consulted first — an internal scheduling detail, not a
/// new tool-facing behavior (SPEC_FULL §9).
pub fn provider_order(sources: &[ProviderTag]) -> Vec<ProviderTag> {
    let mut ordered = sources.to_vec();
    ordered.sort_by(|a, b| b.provider_weight().partial_cmp(&a.provider_weight()).unwrap());
    ordered
}

pub struct LiteratureAggregator {
    providers: HashMap<ProviderTag, Arc<dyn SourceProvider>>,
    doi_provider: ProviderTag,
    cache: RwLock<SearchCache>,
    cache_ttl: Duration,
    cache_cap: usize,
    provider_result_multiplier: f64,
    fuzzy_title_threshold: f64,
}

impl LiteratureAggregator {
    pub fn new(
        providers: HashMap<ProviderTag, Arc<dyn SourceProvider>>,
        doi_provider: ProviderTag,
        cache_ttl: Duration,
        cache_cap: usize,
        provider_result_multiplier: f64,
        fuzzy_title_threshold: f64,
    ) -> Self {
        Self {
            providers,
            doi_provider,
            cache: RwLock::new(SearchCache::new()),
            cache_ttl,
            cache_cap,
            provider_result_multiplier,
            fuzzy_title_threshold,
        }
    }

    fn cache_key(input: &SearchGraphInput) -> String {
        let mut sources: Vec<&str> =
            input.sources.as_ref().map(|s| s.iter().map(|t| t.as_str()).collect()).unwrap_or_else(|| {
                vec!["A", "B", "C", "D"]
            });
        sources.sort();
        let mut fields: Vec<String> = input.fields_of_study.clone().unwrap_or_default();
        fields.sort();
        format!(
            "{}|{}|{:?}|{:?}|{}|{}",
            normalize_title_key(&input.query),
            input.limit,
            input.min_year,
            input.max_year,
            fields.join(","),
            sources.join(",")
        )
    }

    fn requested_sources(input: &SearchGraphInput) -> Vec<ProviderTag> {
        input.sources.clone().unwrap_or_else(|| vec![ProviderTag::A, ProviderTag::B, ProviderTag::C, ProviderTag::D])
    }

    /// `searchGraph(input) -> SearchResult` (§4.3).
    pub async fn search_graph(&self, input: SearchGraphInput) -> SearchResult {
        if self.cache_ttl > Duration::ZERO {
            let key = Self::cache_key(&input);
            let mut cache = self.cache.write();
            if let Some(entry) = cache.entries.get(&key) {
                if entry.inserted_at.elapsed() <= self.cache_ttl {
                    let ctx = OperationContext::new("aggregator.cache_hit");
                    log_operation(&ctx, &Operation::AggregatorCacheHit { cache_key: key.clone() }, &Ok(()));
                    return entry.payload.clone();
                }
                cache.entries.shift_remove(&key);
            }
        }

        let payload = self.search_graph_uncached(&input).await;

        if self.cache_ttl > Duration::ZERO {
            let key = Self::cache_key(&input);
            let mut cache = self.cache.write();
            cache.entries.insert(key, CacheEntry { payload: payload.clone(), inserted_at: Instant::now() });
            while cache.entries.len() > self.cache_cap {
                cache.entries.shift_remove_index(0);
            }
        }

        payload
    }

    async fn search_graph_uncached(&self, input: &SearchGraphInput) -> SearchResult {
        let mut ctx = OperationContext::new("aggregator.search_graph");
        ctx.add_attribute("query", &input.query);

        let sources = provider_order(&Self::requested_sources(input));
        let per_provider_limit = ((input.limit as f64) * self.provider_result_multiplier).ceil() as usize;

        let mut tasks = Vec::new();
        for tag in &sources {
            let Some(provider) = self.providers.get(tag).cloned() else { continue };
            let query = input.query.clone();
            let limit = per_provider_limit.max(1);
            tasks.push(tokio::spawn(async move {
                let result = provider.search_works(&query, limit).await;
                (provider.tag(), result)
            }));
        }

        let mut provider_errors = Vec::new();
        let mut works: Vec<ProviderWork> = Vec::new();
        for task in tasks {
            match task.await {
                Ok((_, Ok(found))) => works.extend(found),
                Ok((tag, Err(err))) => {
                    let _ = tag;
                    provider_errors.push(ProviderErrorEntry::from(err));
                }
                Err(join_err) => {
                    provider_errors.push(ProviderErrorEntry {
                        provider: "unknown".to_string(),
                        message: format!("provider task panicked: {join_err}"),
                    });
                }
            }
        }

        let filtered = works.into_iter().filter(|w| passes_filters(w, input)).collect::<Vec<_>>();
        let merged = merge_works(filtered, self.fuzzy_title_threshold);

        let requested_providers = sources.len().max(1);
        let mut ranked: Vec<CanonicalWork> = merged.into_values().collect();
        for work in &mut ranked {
            work.score = blended_rank_score(work, requested_providers);
        }
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap()
                .then_with(|| b.counts.total.cmp(&a.counts.total))
        });
        ranked.truncate(input.limit);

        log_operation(
            &ctx,
            &Operation::AggregatorSearch {
                query: input.query.clone(),
                sources: sources.len(),
                result_count: ranked.len(),
            },
            &Ok(()),
        );

        SearchResult { results: ranked, provider_errors }
    }

    /// `resolveByDoi(doi) -> CanonicalWork | nil` (§4.3).
    pub async fn resolve_by_doi(&self, doi: &str) -> Option<CanonicalWork> {
        let normalized = crate::providers::normalize_doi(doi);

        if let Some(provider) = self.providers.get(&self.doi_provider) {
            if let Ok(Some(work)) = provider.get_work_by_doi(&normalized).await {
                let merged = merge_works(vec![work], self.fuzzy_title_threshold);
                if let Some(mut canonical) = merged.into_values().next() {
                    canonical.score = blended_rank_score(&canonical, 1);
                    return Some(canonical);
                }
            }
        }

        let fallback_sources = vec![ProviderTag::A, ProviderTag::B, ProviderTag::C];
        let input = SearchGraphInput {
            query: normalized.clone(),
            limit: 50,
            sources: Some(fallback_sources),
            ..Default::default()
        };
        let result = self.search_graph_uncached(&input).await;

        result
            .results
            .iter()
            .find(|w| {
                w.doi.as_deref() == Some(normalized.as_str())
                    || w.external_ids.get("doi").map(|d| d.as_str()) == Some(normalized.as_str())
            })
            .or_else(|| result.results.first())
            .cloned()
    }
}

fn passes_filters(work: &ProviderWork, input: &SearchGraphInput) -> bool {
    if let Some(year) = work.year {
        if let Some(min_year) = input.min_year {
            if year < min_year {
                return false;
            }
        }
        if let Some(max_year) = input.max_year {
            if year > max_year {
                return false;
            }
        }
    }

    if let Some(fields) = &input.fields_of_study {
        if !fields.is_empty() && !fields.iter().any(|f| work.fields_of_study.contains(f)) {
            return false;
        }
    }

    true
}

pub(crate) fn citation_score(total: u64) -> f64 {
    (total as f64 + 1.0).log10() / 4.0
}

fn per_provider_blend(work: &ProviderWork) -> f64 {
    let cscore = citation_score(work.counts.total).min(1.0);
    0.6 * work.relevance + 0.3 * cscore + 0.1 * work.provider.provider_weight()
}

fn title_tokens(title: &str) -> HashSet<String> {
    normalize_title_key(title).split_whitespace().map(|t| t.to_string()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

fn author_signal_present(a: &[crate::model::Author], b: &[crate::model::Author]) -> bool {
    if a.is_empty() || b.is_empty() {
        return true;
    }
    let ids_a: HashSet<&str> = a.iter().filter_map(|x| x.provider_author_id.as_deref()).collect();
    let ids_b: HashSet<&str> = b.iter().filter_map(|x| x.provider_author_id.as_deref()).collect();
    if ids_a.intersection(&ids_b).next().is_some() {
        return true;
    }
    let names_a: HashSet<String> = a.iter().map(|x| normalize_author_name(&x.name)).collect();
    let names_b: HashSet<String> = b.iter().map(|x| normalize_author_name(&x.name)).collect();
    names_a.intersection(&names_b).next().is_some()
}

fn normalize_author_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn years_compatible(a: Option<i32>, b: Option<i32>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() <= 2,
        _ => true,
    }
}

/// Entity resolution over a completion-order stream of provider works (§4.3).
fn merge_works(works: Vec<ProviderWork>, fuzzy_title_threshold: f64) -> IndexMap<String, CanonicalWork> {
    let mut canonicals: IndexMap<String, CanonicalWork> = IndexMap::new();
    let mut doi_index: HashMap<String, String> = HashMap::new();
    let mut title_index: HashMap<String, Vec<String>> = HashMap::new();

    for work in works {
        let target_key = resolve_target_key(&work, &canonicals, &doi_index, &title_index, fuzzy_title_threshold);

        let key = match target_key {
            Some(key) => {
                if let Some(existing) = canonicals.get_mut(&key) {
                    fold_into_canonical(existing, &work);
                }
                key
            }
            None => {
                let key = format!("k{}", canonicals.len());
                let canonical = new_canonical(&key, &work);
                canonicals.insert(key.clone(), canonical);
                key
            }
        };

        if let Some(doi) = &work.doi {
            doi_index.entry(doi.clone()).or_insert_with(|| key.clone());
        }
        title_index.entry(normalize_title_key(&work.title)).or_default().push(key);
    }

    canonicals
}

fn resolve_target_key(
    work: &ProviderWork,
    canonicals: &IndexMap<String, CanonicalWork>,
    doi_index: &HashMap<String, String>,
    title_index: &HashMap<String, Vec<String>>,
    fuzzy_title_threshold: f64,
) -> Option<String> {
    // 1. DOI match.
    if let Some(doi) = &work.doi {
        if let Some(key) = doi_index.get(doi) {
            return Some(key.clone());
        }
    }

    // 2. Equal normalized title, compatible year, author signal.
    let title_key = normalize_title_key(&work.title);
    if let Some(candidates) = title_index.get(&title_key) {
        for key in candidates {
            if let Some(existing) = canonicals.get(key) {
                if years_compatible(existing.year, work.year) && author_signal_present(&existing.authors, &work.authors) {
                    return Some(key.clone());
                }
            }
        }
    }

    // 3. Fuzzy title similarity against every existing canonical.
    let incoming_tokens = title_tokens(&work.title);
    let mut best: Option<(String, f64)> = None;
    for (key, existing) in canonicals.iter() {
        if !years_compatible(existing.year, work.year) || !author_signal_present(&existing.authors, &work.authors) {
            continue;
        }
        let existing_tokens = title_tokens(&existing.title);
        let sim = jaccard(&incoming_tokens, &existing_tokens);
        if sim >= fuzzy_title_threshold {
            if best.as_ref().map(|(_, best_sim)| sim > *best_sim).unwrap_or(true) {
                best = Some((key.clone(), sim));
            }
        }
    }
    if let Some((key, _)) = best {
        return Some(key);
    }

    None
}

fn new_canonical(key: &str, work: &ProviderWork) -> CanonicalWork {
    let mut canonical = CanonicalWork {
        canonical_id: key.to_string(),
        doi: work.doi.clone(),
        title: work.title.clone(),
        r#abstract: work.r#abstract.clone(),
        year: work.year,
        venue: work.venue.clone(),
        url: work.landing_url.clone(),
        counts: work.counts,
        authors: work.authors.clone(),
        open_access: work.open_access.clone(),
        external_ids: work.external_ids.clone(),
        fields_of_study: work.fields_of_study.clone(),
        score: per_provider_blend(work),
        provenance: Vec::new(),
    };
    push_provenance(&mut canonical, work);
    canonical
}

fn fold_into_canonical(canonical: &mut CanonicalWork, work: &ProviderWork) {
    canonical.r#abstract = canonical.r#abstract.clone().or_else(|| work.r#abstract.clone());
    canonical.year = canonical.year.or(work.year);
    canonical.venue = canonical.venue.clone().or_else(|| work.venue.clone());
    canonical.url = canonical.url.clone().or_else(|| work.landing_url.clone());
    canonical.doi = canonical.doi.clone().or_else(|| work.doi.clone());

    canonical.counts = CitationCounts {
        total: canonical.counts.total.max(work.counts.total),
        influential: canonical.counts.influential.max(work.counts.influential),
        reference_count: canonical.counts.reference_count.max(work.counts.reference_count),
    };

    if canonical.authors.is_empty() {
        canonical.authors = work.authors.clone();
    }

    canonical.fields_of_study.extend(work.fields_of_study.iter().cloned());

    for (k, v) in &work.external_ids {
        canonical.external_ids.entry(k.clone()).or_insert_with(|| v.clone());
    }

    canonical.open_access = OpenAccess {
        is_open: canonical.open_access.is_open || work.open_access.is_open,
        pdf_url: canonical.open_access.pdf_url.clone().or_else(|| work.open_access.pdf_url.clone()),
        license: canonical.open_access.license.clone().or_else(|| work.open_access.license.clone()),
    };

    push_provenance(canonical, work);

    let candidate_score = per_provider_blend(work);
    canonical.score = canonical.score.max(candidate_score);
}

fn push_provenance(canonical: &mut CanonicalWork, work: &ProviderWork) {
    canonical.provenance.push(ProvenanceEntry {
        provider: work.provider,
        source_url: Some(work.source_url.clone()),
        fetched_at: Utc::now(),
        confidence: work.relevance,
    });
}

pub(crate) fn recency_score(year: Option<i32>) -> f64 {
    match year {
        Some(y) => {
            let current_year = Utc::now().format("%Y").to_string().parse::<i32>().unwrap_or(y);
            1.0 / ((current_year - y + 1).max(1) as f64)
        }
        None => 0.15,
    }
}

fn blended_rank_score(work: &CanonicalWork, requested_providers: usize) -> f64 {
    let cscore = citation_score(work.counts.total).min(1.0);
    let distinct_providers: HashSet<ProviderTag> = work.provenance.iter().map(|p| p.provider).collect();
    let diversity = distinct_providers.len() as f64 / requested_providers.max(1) as f64;
    let recency = recency_score(work.year);
    0.5 * work.score + 0.25 * cscore + 0.15 * diversity + 0.1 * (2.0 * recency).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Author;
    use std::collections::BTreeSet;

    fn work(provider: ProviderTag, title: &str, year: Option<i32>, doi: Option<&str>, total: u64) -> ProviderWork {
        ProviderWork {
            provider,
            provider_local_id: format!("{:?}-id", provider),
            title: title.to_string(),
            r#abstract: None,
            year,
            venue: None,
            doi: doi.map(|d| d.to_string()),
            landing_url: None,
            counts: CitationCounts { total, influential: 0, reference_count: 0 },
            authors: vec![Author { name: "Alice Smith".to_string(), provider_author_id: Some("A1".to_string()) }],
            open_access: OpenAccess::default(),
            external_ids: HashMap::new(),
            fields_of_study: BTreeSet::new(),
            relevance: 0.5,
            source_url: "https://example.org".to_string(),
        }
    }

    #[test]
    fn federated_dedupe_merges_matching_titles_and_keeps_unrelated_separate() {
        let a = work(ProviderTag::A, "Graph Neural Networks for Scientific Retrieval", Some(2023), None, 10);
        let b = work(ProviderTag::B, "Graph Neural Networks for Scientific Retrieval.", Some(2024), None, 20);
        let c = work(ProviderTag::C, "Totally Unrelated Survey of Databases", Some(2023), None, 5);

        let merged = merge_works(vec![a, b, c], 0.82);
        assert_eq!(merged.len(), 2);

        let ab = merged.values().find(|w| w.provenance.len() == 2).expect("merged canonical exists");
        assert_eq!(ab.counts.total, 20);
        assert_eq!(ab.year, Some(2023));
    }

    #[test]
    fn merge_is_citation_count_monotone() {
        let a = work(ProviderTag::A, "Monotone Merge Example", Some(2020), Some("10.1/x"), 5);
        let b = work(ProviderTag::B, "Monotone Merge Example", Some(2020), Some("10.1/x"), 50);
        let merged = merge_works(vec![a, b], 0.82);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.values().next().unwrap().counts.total, 50);
    }

    #[test]
    fn fuzzy_title_threshold_gates_merge() {
        let a = work(ProviderTag::A, "Neural Retrieval Systems For Science", Some(2021), None, 1);
        let b = work(ProviderTag::B, "Completely Different Paper About Biology", Some(2021), None, 1);
        let merged = merge_works(vec![a, b], 0.82);
        assert_eq!(merged.len(), 2);
    }
}

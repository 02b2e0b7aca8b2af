//! Cross-component scenarios from the aggregator's spec section: federated
//! dedupe across providers (scenario 1) and cache reuse across identical
//! calls (scenario 2).

use async_trait::async_trait;
use litgraph::aggregator::{LiteratureAggregator, SearchGraphInput};
use litgraph::error::ProviderError;
use litgraph::model::{Author, CitationCounts, OpenAccess, ProviderTag, ProviderWork};
use litgraph::providers::SourceProvider;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn work(provider: ProviderTag, title: &str, year: Option<i32>, doi: Option<&str>, citations: u64, author: &str, author_id: Option<&str>) -> ProviderWork {
    ProviderWork {
        provider,
        provider_local_id: format!("{}-{}", provider.as_str(), title),
        title: title.to_string(),
        r#abstract: None,
        year,
        venue: None,
        doi: doi.map(|d| d.to_string()),
        landing_url: None,
        counts: CitationCounts { total: citations, influential: 0, reference_count: 0 },
        authors: vec![Author { name: author.to_string(), provider_author_id: author_id.map(|s| s.to_string()) }],
        open_access: OpenAccess::default(),
        external_ids: HashMap::new(),
        fields_of_study: BTreeSet::new(),
        relevance: provider.default_relevance(),
        source_url: format!("https://example.test/{}", provider.as_str()),
    }
}

/// A deterministic provider double that counts how many times it's called,
/// so the cache-reuse scenario can assert exactly one invocation per query.
struct FixedProvider {
    tag: ProviderTag,
    works: Vec<ProviderWork>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceProvider for FixedProvider {
    fn tag(&self) -> ProviderTag {
        self.tag
    }

    async fn search_works(&self, _query: &str, _limit: usize) -> Result<Vec<ProviderWork>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.works.clone())
    }
}

fn build_aggregator(
    a_works: Vec<ProviderWork>,
    b_works: Vec<ProviderWork>,
    c_works: Vec<ProviderWork>,
    cache_ttl: Duration,
) -> (Arc<LiteratureAggregator>, Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let calls_a = Arc::new(AtomicUsize::new(0));
    let calls_b = Arc::new(AtomicUsize::new(0));
    let calls_c = Arc::new(AtomicUsize::new(0));

    let mut providers: HashMap<ProviderTag, Arc<dyn SourceProvider>> = HashMap::new();
    providers.insert(ProviderTag::A, Arc::new(FixedProvider { tag: ProviderTag::A, works: a_works, calls: calls_a.clone() }));
    providers.insert(ProviderTag::B, Arc::new(FixedProvider { tag: ProviderTag::B, works: b_works, calls: calls_b.clone() }));
    providers.insert(ProviderTag::C, Arc::new(FixedProvider { tag: ProviderTag::C, works: c_works, calls: calls_c.clone() }));

    let aggregator = Arc::new(LiteratureAggregator::new(providers, ProviderTag::C, cache_ttl, 64, 2.0, 0.82));
    (aggregator, calls_a, calls_b, calls_c)
}

#[tokio::test]
async fn federated_dedupe_merges_matching_titles_across_providers() {
    let a = work(ProviderTag::A, "Graph Neural Networks for Scientific Retrieval", Some(2023), None, 40, "Alice Smith", Some("A1"));
    let mut b = work(ProviderTag::B, "Graph Neural Networks for Scientific Retrieval.", Some(2024), None, 55, "Alice Smith", None);
    b.provider = ProviderTag::B;
    let c = work(ProviderTag::C, "Totally Unrelated Survey of Databases", Some(2023), None, 5, "Bob Jones", None);

    let (aggregator, _, _, _) = build_aggregator(vec![a], vec![b], vec![c], Duration::from_secs(60));

    let input = SearchGraphInput { query: "graph retrieval".to_string(), limit: 10, sources: Some(vec![ProviderTag::A, ProviderTag::B, ProviderTag::C]), ..Default::default() };
    let result = aggregator.search_graph(input).await;

    assert_eq!(result.results.len(), 2, "A+B should merge into one canonical, C stays separate");

    let merged = result
        .results
        .iter()
        .find(|w| w.title.starts_with("Graph Neural Networks"))
        .expect("merged canonical present");
    assert_eq!(merged.provenance.len(), 2);
    assert_eq!(merged.counts.total, 55, "citation count is the max across merged sources");
    assert_eq!(merged.year, Some(2023), "first non-null wins, A completed before B in fan-out order");
}

#[tokio::test]
async fn identical_queries_under_ttl_hit_the_cache_and_deep_equal() {
    let a = work(ProviderTag::A, "Transformer Retrieval Approaches", Some(2022), Some("10.1/abc"), 12, "Carol Lee", None);
    let (aggregator, calls_a, calls_b, calls_c) = build_aggregator(vec![a], vec![], vec![], Duration::from_secs(60));

    let input = SearchGraphInput { query: "transformer retrieval".to_string(), limit: 10, sources: None, ..Default::default() };

    let first = aggregator.search_graph(input.clone()).await;
    let second = aggregator.search_graph(input).await;

    assert_eq!(calls_a.load(Ordering::SeqCst), 1, "second call should be served from cache");
    assert_eq!(calls_b.load(Ordering::SeqCst), 1);
    assert_eq!(calls_c.load(Ordering::SeqCst), 1);
    assert_eq!(first.results.len(), second.results.len());
    for (lhs, rhs) in first.results.iter().zip(second.results.iter()) {
        assert_eq!(lhs.canonical_id, rhs.canonical_id);
        assert_eq!(lhs.title, rhs.title);
        assert_eq!(lhs.counts.total, rhs.counts.total);
    }
}

#[tokio::test]
async fn all_providers_failing_returns_empty_results_with_one_error_per_source() {
    struct FailingProvider(ProviderTag);

    #[async_trait]
    impl SourceProvider for FailingProvider {
        fn tag(&self) -> ProviderTag {
            self.0
        }
        async fn search_works(&self, _query: &str, _limit: usize) -> Result<Vec<ProviderWork>, ProviderError> {
            Err(ProviderError::new(self.0.as_str(), "https://example.test", "connection refused"))
        }
    }

    let mut providers: HashMap<ProviderTag, Arc<dyn SourceProvider>> = HashMap::new();
    providers.insert(ProviderTag::A, Arc::new(FailingProvider(ProviderTag::A)));
    providers.insert(ProviderTag::B, Arc::new(FailingProvider(ProviderTag::B)));
    providers.insert(ProviderTag::C, Arc::new(FailingProvider(ProviderTag::C)));

    let aggregator = Arc::new(LiteratureAggregator::new(providers, ProviderTag::C, Duration::ZERO, 64, 2.0, 0.82));
    let input = SearchGraphInput {
        query: "anything".to_string(),
        limit: 10,
        sources: Some(vec![ProviderTag::A, ProviderTag::B, ProviderTag::C]),
        ..Default::default()
    };

    let result = aggregator.search_graph(input).await;
    assert!(result.results.is_empty());
    assert_eq!(result.provider_errors.len(), 3);
}

//! End-to-end scenarios driven through `ToolRegistry::call`, the same entry
//! point both transports use: manuscript citation validation, a failing
//! ingestion job, and contextual citation suggestion.

use async_trait::async_trait;
use litgraph::aggregator::LiteratureAggregator;
use litgraph::config::IngestionConfig;
use litgraph::error::ProviderError;
use litgraph::fetch::PacingFetcher;
use litgraph::ingestion::IngestionEngine;
use litgraph::mcp::tools::ToolRegistry;
use litgraph::model::{Author, CitationCounts, OpenAccess, ProviderTag, ProviderWork};
use litgraph::providers::scholar::ScholarProvider;
use litgraph::providers::SourceProvider;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

fn work(title: &str, year: i32, citations: u64, abstract_text: &str) -> ProviderWork {
    ProviderWork {
        provider: ProviderTag::A,
        provider_local_id: title.to_string(),
        title: title.to_string(),
        r#abstract: Some(abstract_text.to_string()),
        year: Some(year),
        venue: None,
        doi: None,
        landing_url: None,
        counts: CitationCounts { total: citations, influential: 0, reference_count: 0 },
        authors: vec![Author { name: "Jane Researcher".to_string(), provider_author_id: None }],
        open_access: OpenAccess::default(),
        external_ids: HashMap::new(),
        fields_of_study: BTreeSet::new(),
        relevance: 0.5,
        source_url: "https://example.test/a".to_string(),
    }
}

struct FixedProvider(Vec<ProviderWork>);

#[async_trait]
impl SourceProvider for FixedProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::A
    }
    async fn search_works(&self, _query: &str, _limit: usize) -> Result<Vec<ProviderWork>, ProviderError> {
        Ok(self.0.clone())
    }
}

fn build_registry(ingestion_config: IngestionConfig, works: Vec<ProviderWork>) -> ToolRegistry {
    let mut providers: HashMap<ProviderTag, Arc<dyn SourceProvider>> = HashMap::new();
    providers.insert(ProviderTag::A, Arc::new(FixedProvider(works)));
    let aggregator = Arc::new(LiteratureAggregator::new(providers, ProviderTag::A, Duration::from_secs(60), 64, 2.0, 0.82));
    let ingestion = IngestionEngine::new(aggregator.clone(), Arc::new(PacingFetcher::new("ingestion")), ingestion_config);
    let scholar = Arc::new(ScholarProvider::new("https://scholar.example", Arc::new(PacingFetcher::new("D"))));
    ToolRegistry::new(aggregator, ingestion, scholar)
}

/// A manuscript with a numeric range, an author-year pair, and an unresolved
/// placeholder against a two-entry reference list.
#[tokio::test]
async fn validate_manuscript_citations_flags_placeholder_and_mixed_styles() {
    let registry = build_registry(
        IngestionConfig { allow_remote_pdfs: false, allow_local_pdfs: true, structured_parser_url: None },
        vec![],
    );

    let params = serde_json::json!({
        "manuscript_text": "Recent studies support this claim [1-3]. (Doe, 2023). [TODO]",
        "style": "ieee",
        "references": [
            { "formatted": "Smith, A. A Survey of Retrieval Methods. 2021. https://doi.org/10.1/aaa" },
            { "formatted": "Lee, B. Graph Based Ranking. 2022. https://doi.org/10.1/bbb" },
        ],
    });

    let envelope = registry.call("validate_manuscript_citations", params).await;
    assert!(envelope["isError"].is_null(), "validation never errors out on malformed manuscripts");
    let result = &envelope["structuredContent"];

    assert!(
        result["missing_references"]
            .as_array()
            .unwrap()
            .iter()
            .any(|v| v.as_str() == Some("[3]") || v.as_str() == Some("doe")),
        "citation [1-3] references a third entry the two-item list doesn't have, or Doe isn't in the list"
    );
    assert!(
        result["style_warnings"].as_array().unwrap().iter().any(|w| w.as_str().unwrap().contains("placeholder")),
        "unresolved [TODO] placeholder must surface as a style warning"
    );
    assert!(
        result["style_warnings"].as_array().unwrap().iter().any(|w| w.as_str().unwrap().contains("Mixed")),
        "numeric [1-3] alongside (Doe, 2023) is a mixed citation pattern"
    );
    assert_eq!(
        result["inline_citation_count"].as_u64(),
        Some(4),
        "[1-3] expands to 3 inline citations plus the (Doe, 2023) group is 4"
    );
}

/// A job enqueued with only a DOI, remote PDF fetching disabled, must fail
/// with the exact message the ingestion engine reports when it can find no
/// downloadable PDF.
#[tokio::test]
async fn ingest_paper_fulltext_fails_when_no_pdf_is_resolvable() {
    let registry = build_registry(
        IngestionConfig { allow_remote_pdfs: false, allow_local_pdfs: true, structured_parser_url: None },
        vec![],
    );

    let enqueue = registry
        .call("ingest_paper_fulltext", serde_json::json!({ "doi": "10.1000/example-doi", "parse_mode": "auto" }))
        .await;
    assert!(enqueue["isError"].is_null());
    let job_id = enqueue["structuredContent"]["job"]["job_id"].as_str().unwrap().to_string();

    // The job runs on a background task; poll briefly until it settles.
    let mut status = serde_json::Value::Null;
    for _ in 0..50 {
        let envelope = registry.call("get_ingestion_status", serde_json::json!({ "job_id": job_id })).await;
        status = envelope["structuredContent"]["job"]["status"].clone();
        if status == "failed" || status == "succeeded" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(status, "failed");
    let envelope = registry.call("get_ingestion_status", serde_json::json!({ "job_id": job_id })).await;
    assert_eq!(
        envelope["structuredContent"]["job"]["error"].as_str(),
        Some("Unable to resolve a downloadable PDF URL from input.")
    );
}

/// Candidates are ranked by token overlap with the surrounding manuscript
/// text, and the inline suggestion numbers them in that ranked order.
#[tokio::test]
async fn suggest_contextual_citations_ranks_by_context_overlap() {
    let works = vec![
        work("Graph Retrieval for Scientific Literature", 2022, 80, "A graph based retrieval approach for scientific literature search."),
        work("Unrelated Cooking Techniques", 2021, 5, "A guide to unrelated cooking techniques and recipes."),
        work("Federated Search Across Bibliographic Catalogs", 2020, 30, "Federated search combining bibliographic catalogs."),
    ];
    let registry = build_registry(
        IngestionConfig { allow_remote_pdfs: false, allow_local_pdfs: true, structured_parser_url: None },
        works,
    );

    let params = serde_json::json!({
        "manuscript_text": "This section discusses graph based retrieval methods for scientific literature search systems.",
        "k": 3,
        "style": "ieee",
    });
    let envelope = registry.call("suggest_contextual_citations", params).await;
    assert!(envelope["isError"].is_null());
    let candidates = envelope["structuredContent"]["candidates"].as_array().unwrap();
    assert!(!candidates.is_empty());
    assert_eq!(
        candidates[0]["work"]["title"].as_str(),
        Some("Graph Retrieval for Scientific Literature"),
        "the work sharing the most context tokens should rank first"
    );

    let inline = envelope["structuredContent"]["inline_suggestion"].as_str().unwrap();
    assert!(inline.starts_with("[1]"), "inline suggestion numbers candidates starting from 1");
}

//! Shared startup wiring: builds the provider set, aggregator, ingestion
//! engine, session manager, and tool registry from a loaded `LitgraphConfig`.
//! All three entry points (`litgraph serve`, the stdio binary, the HTTP
//! binary) call `build` so there is one construction path instead of three
//! copies drifting apart.

use crate::aggregator::LiteratureAggregator;
use crate::config::LitgraphConfig;
use crate::fetch::{FetchOptions, PacingFetcher};
use crate::ingestion::IngestionEngine;
use crate::mcp::session::SessionManager;
use crate::mcp::tools::ToolRegistry;
use crate::model::ProviderTag;
use crate::providers::catalog_a::CatalogAProvider;
use crate::providers::catalog_b::CatalogBProvider;
use crate::providers::catalog_c::CatalogCProvider;
use crate::providers::scholar::ScholarProvider;
use crate::providers::SourceProvider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct Runtime {
    pub tools: Arc<ToolRegistry>,
    pub sessions: Arc<SessionManager>,
}

/// Construct every core component from configuration. Each provider gets its
/// own `PacingFetcher` instance, matching the spec's "per-instance
/// `lastRequestAt`" rule (§4.1) — fetchers are never shared across providers.
pub fn build(config: &LitgraphConfig) -> Runtime {
    let fetcher_a = Arc::new(PacingFetcher::new("A"));
    let fetcher_b = Arc::new(PacingFetcher::new("B"));
    let fetcher_c = Arc::new(PacingFetcher::new("C"));
    let fetcher_d = Arc::new(PacingFetcher::new("D"));
    let ingestion_fetcher = Arc::new(PacingFetcher::new("ingestion"));

    // `requestTimeoutMs`/`retryAttempts`/`retryDelayMs`/`requestDelayMs` (§6) are
    // shared across the three JSON catalogs and the scholar scraper — each
    // provider still paces through its own `PacingFetcher` instance (§4.1).
    let provider_options = FetchOptions::new(
        Duration::from_millis(config.providers.request_timeout_ms),
        config.providers.retry_attempts,
        Duration::from_millis(config.providers.retry_delay_ms),
        Duration::from_millis(config.providers.request_delay_ms),
    );

    let catalog_a = Arc::new(CatalogAProvider::with_options(
        config.providers.catalog_a.base_url.clone(),
        fetcher_a,
        provider_options,
    ));
    let catalog_b = Arc::new(CatalogBProvider::with_options(
        config.providers.catalog_b.base_url.clone(),
        fetcher_b,
        provider_options,
    ));
    let catalog_c = Arc::new(CatalogCProvider::with_options(
        config.providers.catalog_c.base_url.clone(),
        fetcher_c,
        provider_options,
    ));
    let scholar = Arc::new(ScholarProvider::with_options("https://scholar.google.com", fetcher_d, provider_options));

    let mut providers: HashMap<ProviderTag, Arc<dyn SourceProvider>> = HashMap::new();
    providers.insert(ProviderTag::A, catalog_a as Arc<dyn SourceProvider>);
    providers.insert(ProviderTag::B, catalog_b as Arc<dyn SourceProvider>);
    providers.insert(ProviderTag::C, catalog_c as Arc<dyn SourceProvider>);
    providers.insert(ProviderTag::D, scholar.clone() as Arc<dyn SourceProvider>);

    let aggregator = Arc::new(LiteratureAggregator::new(
        providers,
        ProviderTag::C,
        Duration::from_millis(config.aggregator.graph_cache_ttl_ms),
        config.aggregator.graph_max_cache_entries,
        config.aggregator.graph_provider_result_multiplier,
        config.aggregator.graph_fuzzy_title_threshold,
    ));

    let ingestion = IngestionEngine::new(aggregator.clone(), ingestion_fetcher, config.ingestion.clone());

    let tools = Arc::new(ToolRegistry::new(aggregator, ingestion, scholar));
    let sessions =
        Arc::new(SessionManager::new(Duration::from_millis(config.session.session_ttl_ms), config.session.max_sessions));

    Runtime { tools, sessions }
}

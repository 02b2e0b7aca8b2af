// Litgraph - research-automation server
// Root library module

pub mod aggregator;
pub mod citation;
pub mod config;
pub mod error;
pub mod extraction;
pub mod fetch;
pub mod ingestion;
pub mod model;
pub mod observability;
pub mod providers;
pub mod validation;

#[cfg(feature = "mcp-server")]
pub mod auth_middleware;
#[cfg(feature = "mcp-server")]
pub mod mcp;
#[cfg(feature = "mcp-server")]
pub mod runtime;

pub use error::{
    IngestionError, LitgraphError, NotFoundError, ProviderError, ScholarScrapeBlockedError,
    ValidationError,
};
pub use observability::{
    init_logging, init_logging_with_level, log_operation, record_metric, with_trace_id,
    MetricType, Operation,
};

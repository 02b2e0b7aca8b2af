//! Configuration surface (§6 of the expanded spec): transport selection,
//! session policy, provider endpoints, ingestion gating, and aggregator
//! tuning. Loaded from an optional TOML file, then overridden by environment
//! variables, layered file-then-env like a typical server config loader.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Line,
    Http,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Stateless,
    Stateful,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LitgraphConfig {
    pub transport: TransportConfig,
    pub session: SessionConfig,
    pub providers: ProviderEndpointsConfig,
    pub ingestion: IngestionConfig,
    pub aggregator: AggregatorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub host: String,
    pub port: u16,
    pub endpoint_path: String,
    pub health_path: String,
    pub allowed_origins: Vec<String>,
    pub allowed_hosts: Vec<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub session_ttl_ms: u64,
    pub max_sessions: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEndpointConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEndpointsConfig {
    pub catalog_a: ProviderEndpointConfig,
    pub catalog_b: ProviderEndpointConfig,
    pub catalog_c: ProviderEndpointConfig,
    pub request_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    pub allow_remote_pdfs: bool,
    pub allow_local_pdfs: bool,
    pub structured_parser_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
    pub graph_cache_ttl_ms: u64,
    pub graph_max_cache_entries: usize,
    pub graph_provider_result_multiplier: f64,
    pub graph_fuzzy_title_threshold: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LitgraphConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig {
                mode: TransportMode::Both,
                host: "127.0.0.1".to_string(),
                port: 8420,
                endpoint_path: "/mcp".to_string(),
                health_path: "/health".to_string(),
                allowed_origins: Vec::new(),
                allowed_hosts: Vec::new(),
                api_key: None,
            },
            session: SessionConfig {
                mode: SessionMode::Stateful,
                session_ttl_ms: 30 * 60 * 1000,
                max_sessions: 256,
            },
            providers: ProviderEndpointsConfig {
                catalog_a: ProviderEndpointConfig {
                    base_url: "https://api.openalex.org".to_string(),
                    api_key: None,
                },
                catalog_b: ProviderEndpointConfig {
                    base_url: "https://api.semanticscholar.org/graph/v1".to_string(),
                    api_key: None,
                },
                catalog_c: ProviderEndpointConfig {
                    base_url: "https://api.crossref.org".to_string(),
                    api_key: None,
                },
                request_timeout_ms: 10_000,
                retry_attempts: 2,
                retry_delay_ms: 500,
                request_delay_ms: 250,
            },
            ingestion: IngestionConfig {
                allow_remote_pdfs: true,
                allow_local_pdfs: true,
                structured_parser_url: None,
            },
            aggregator: AggregatorConfig {
                graph_cache_ttl_ms: 60_000,
                graph_max_cache_entries: 512,
                graph_provider_result_multiplier: 2.0,
                graph_fuzzy_title_threshold: 0.82,
            },
            logging: LoggingConfig { level: "info".to_string() },
        }
    }
}

impl LitgraphConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LitgraphConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from an optional file, then apply environment overrides.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };

        if let Ok(host) = std::env::var("LITGRAPH_HOST") {
            config.transport.host = host;
        }
        if let Ok(port) = std::env::var("LITGRAPH_PORT") {
            config.transport.port = port.parse()?;
        }
        if let Ok(key) = std::env::var("LITGRAPH_API_KEY") {
            config.transport.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("LITGRAPH_CATALOG_A_URL") {
            config.providers.catalog_a.base_url = url;
        }
        if let Ok(url) = std::env::var("LITGRAPH_CATALOG_B_URL") {
            config.providers.catalog_b.base_url = url;
        }
        if let Ok(url) = std::env::var("LITGRAPH_CATALOG_C_URL") {
            config.providers.catalog_c.base_url = url;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_internally_consistent() {
        let config = LitgraphConfig::default();
        assert_eq!(config.transport.mode, TransportMode::Both);
        assert!(config.aggregator.graph_fuzzy_title_threshold > 0.0);
        assert!(config.providers.retry_attempts >= 1);
    }

    #[test]
    fn load_without_file_falls_back_to_default() {
        let config = LitgraphConfig::load(None).expect("default load should succeed");
        assert_eq!(config.session.max_sessions, 256);
    }
}

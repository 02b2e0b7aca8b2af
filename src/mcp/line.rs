//! Line transport (§6): a newline-delimited JSON-RPC duplex over stdin and
//! stdout. One request per line in, one response per line out; no session
//! concept (the stateless/stateful split in §4.8 is an HTTP-transport-only
//! axis). Shares the same `ToolRegistry` dispatch as the HTTP transport via
//! `mcp::http::dispatch`.

use crate::mcp::http::dispatch;
use crate::mcp::tools::ToolRegistry;
use crate::mcp::types::{MCPError, MCPRequest, MCPResponse};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Run the line transport to completion (EOF on stdin). Malformed JSON on a
/// line yields a parse-error response rather than terminating the loop.
pub async fn run_stdio(tools: Arc<ToolRegistry>) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<MCPRequest>(trimmed) {
            Ok(request) => dispatch(&tools, request).await,
            Err(e) => MCPResponse::failure(None, MCPError::parse_error(e.to_string())),
        };

        let serialized = serde_json::to_string(&response)
            .unwrap_or_else(|_| "{\"jsonrpc\":\"2.0\",\"error\":{\"code\":-32603,\"message\":\"Internal server error\"},\"id\":null}".to_string());
        stdout.write_all(serialized.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::LiteratureAggregator;
    use crate::config::IngestionConfig;
    use crate::fetch::PacingFetcher;
    use crate::ingestion::IngestionEngine;
    use crate::model::ProviderTag;
    use crate::providers::scholar::ScholarProvider;
    use std::collections::HashMap;
    use std::time::Duration;

    fn test_tools() -> Arc<ToolRegistry> {
        let aggregator = Arc::new(LiteratureAggregator::new(HashMap::new(), ProviderTag::C, Duration::from_secs(60), 64, 2.0, 0.82));
        let ingestion = IngestionEngine::new(
            aggregator.clone(),
            Arc::new(PacingFetcher::new("test")),
            IngestionConfig { allow_remote_pdfs: false, allow_local_pdfs: true, structured_parser_url: None },
        );
        let scholar = Arc::new(ScholarProvider::new("https://scholar.example", Arc::new(PacingFetcher::new("D"))));
        Arc::new(ToolRegistry::new(aggregator, ingestion, scholar))
    }

    #[tokio::test]
    async fn dispatch_handles_initialize_directly() {
        let tools = test_tools();
        let request = MCPRequest { jsonrpc: "2.0".to_string(), id: None, method: "initialize".to_string(), params: serde_json::json!({}) };
        let response = dispatch(&tools, request).await;
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn dispatch_reports_unknown_method() {
        let tools = test_tools();
        let request = MCPRequest { jsonrpc: "2.0".to_string(), id: None, method: "nope".to_string(), params: serde_json::json!({}) };
        let response = dispatch(&tools, request).await;
        assert!(response.error.is_some());
    }
}

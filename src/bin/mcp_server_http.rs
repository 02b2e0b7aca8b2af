//! litgraph MCP server — HTTP transport entry point.
//!
//! A thin binary around `litgraph::mcp::http`'s router, for MCP clients that
//! speak the bidirectional HTTP endpoint (§6) rather than a stdio pipe.

#[cfg(feature = "mcp-server")]
fn main() -> anyhow::Result<()> {
    use clap::Parser;
    use litgraph::config::LitgraphConfig;
    use litgraph::mcp::http::HttpState;
    use std::sync::Arc;

    #[derive(Parser)]
    #[command(name = "litgraph-mcp-http", version, about = "litgraph MCP server (HTTP transport)")]
    struct Cli {
        /// Path to a TOML configuration file.
        #[arg(short, long)]
        config: Option<String>,
        /// Override the configured bind host.
        #[arg(long)]
        host: Option<String>,
        /// Override the configured bind port.
        #[arg(long)]
        port: Option<u16>,
        /// Debug-level logging.
        #[arg(long)]
        verbose: bool,
        /// Error-level-only logging.
        #[arg(long)]
        quiet: bool,
    }

    let cli = Cli::parse();
    litgraph::init_logging_with_level(cli.verbose, cli.quiet)?;

    let mut config = LitgraphConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.transport.host = host;
    }
    if let Some(port) = cli.port {
        config.transport.port = port;
    }
    let config = Arc::new(config);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let runtime = litgraph::runtime::build(&config);
        let state = HttpState { tools: runtime.tools, sessions: runtime.sessions, config: config.clone() };
        let router = litgraph::mcp::http::build_router(state);

        let addr = format!("{}:{}", config.transport.host, config.transport.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(%addr, endpoint = %config.transport.endpoint_path, "litgraph MCP http server listening");
        axum::serve(listener, router).await?;
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

#[cfg(not(feature = "mcp-server"))]
fn main() {
    eprintln!("litgraph-mcp-http requires the `mcp-server` feature.");
    std::process::exit(1);
}

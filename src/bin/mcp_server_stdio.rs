//! litgraph MCP server — line transport entry point.
//!
//! A thin binary around `litgraph::mcp::line::run_stdio`, for MCP clients
//! that launch a subprocess and speak newline-delimited JSON-RPC over its
//! stdio pipes rather than connecting over HTTP.

#[cfg(feature = "mcp-server")]
fn main() -> anyhow::Result<()> {
    use clap::Parser;
    use litgraph::config::LitgraphConfig;

    #[derive(Parser)]
    #[command(name = "litgraph-mcp-stdio", version, about = "litgraph MCP server (line transport)")]
    struct Cli {
        /// Path to a TOML configuration file.
        #[arg(short, long)]
        config: Option<String>,
        /// Debug-level logging (written to stderr; stdout carries the protocol).
        #[arg(long)]
        verbose: bool,
    }

    let cli = Cli::parse();

    let filter = if cli.verbose { "litgraph=debug,info" } else { "litgraph=info,warn" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = LitgraphConfig::load(cli.config.as_deref())?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting litgraph MCP stdio server");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let runtime = litgraph::runtime::build(&config);
        litgraph::mcp::line::run_stdio(runtime.tools).await
    })?;

    Ok(())
}

#[cfg(not(feature = "mcp-server"))]
fn main() {
    eprintln!("litgraph-mcp-stdio requires the `mcp-server` feature.");
    std::process::exit(1);
}

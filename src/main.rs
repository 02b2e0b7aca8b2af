//! litgraph CLI: load configuration, then serve the research-automation
//! engine over the line transport, the HTTP transport, or both (§6).

#[cfg(feature = "mcp-server")]
mod app {
    use anyhow::Result;
    use clap::{Parser, Subcommand, ValueEnum};
    use litgraph::config::{LitgraphConfig, TransportMode};
    use litgraph::mcp::http::HttpState;
    use litgraph::mcp::{SessionManager, ToolRegistry};
    use litgraph::runtime;
    use std::sync::Arc;

    #[derive(Parser)]
    #[command(
        name = "litgraph",
        version,
        about = "Research-automation server brokering federated literature search, full-text ingestion, and citation tooling"
    )]
    struct Cli {
        /// Path to a TOML configuration file.
        #[arg(short, long, global = true)]
        config: Option<String>,

        /// Debug-level logging.
        #[arg(long, global = true)]
        verbose: bool,

        /// Error-level-only logging.
        #[arg(long, global = true)]
        quiet: bool,

        #[command(subcommand)]
        command: Commands,
    }

    #[derive(Subcommand)]
    enum Commands {
        /// Start serving tool calls.
        Serve {
            /// Override the configured transport.
            #[arg(long, value_enum)]
            transport: Option<TransportArg>,
            /// Override the configured HTTP bind host.
            #[arg(long)]
            host: Option<String>,
            /// Override the configured HTTP bind port.
            #[arg(long)]
            port: Option<u16>,
        },
        /// Print the resolved configuration as JSON and exit without serving.
        PrintConfig,
    }

    #[derive(Copy, Clone, ValueEnum)]
    enum TransportArg {
        Line,
        Http,
        Both,
    }

    impl From<TransportArg> for TransportMode {
        fn from(t: TransportArg) -> Self {
            match t {
                TransportArg::Line => TransportMode::Line,
                TransportArg::Http => TransportMode::Http,
                TransportArg::Both => TransportMode::Both,
            }
        }
    }

    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        litgraph::init_logging_with_level(cli.verbose, cli.quiet)?;

        let mut config = LitgraphConfig::load(cli.config.as_deref())?;

        match cli.command {
            Commands::PrintConfig => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            Commands::Serve { transport, host, port } => {
                if let Some(t) = transport {
                    config.transport.mode = t.into();
                }
                if let Some(h) = host {
                    config.transport.host = h;
                }
                if let Some(p) = port {
                    config.transport.port = p;
                }
                serve(config).await
            }
        }
    }

    async fn serve(config: LitgraphConfig) -> Result<()> {
        let config = Arc::new(config);
        let runtime = runtime::build(&config);

        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            transport = ?config.transport.mode,
            "starting litgraph"
        );

        match config.transport.mode {
            TransportMode::Line => {
                litgraph::mcp::line::run_stdio(runtime.tools.clone()).await?;
            }
            TransportMode::Http => {
                serve_http(config.clone(), runtime.tools.clone(), runtime.sessions.clone()).await?;
            }
            TransportMode::Both => {
                let http_config = config.clone();
                let http_tools = runtime.tools.clone();
                let http_sessions = runtime.sessions.clone();
                let http_handle = tokio::spawn(async move {
                    if let Err(e) = serve_http(http_config, http_tools, http_sessions).await {
                        tracing::error!(error = %e, "http transport exited with error");
                    }
                });
                litgraph::mcp::line::run_stdio(runtime.tools.clone()).await?;
                http_handle.abort();
            }
        }

        runtime.sessions.close_all();
        Ok(())
    }

    async fn serve_http(config: Arc<LitgraphConfig>, tools: Arc<ToolRegistry>, sessions: Arc<SessionManager>) -> Result<()> {
        let state = HttpState { tools, sessions, config: config.clone() };
        let router = litgraph::mcp::http::build_router(state);

        let addr = format!("{}:{}", config.transport.host, config.transport.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(%addr, endpoint = %config.transport.endpoint_path, "http transport listening");
        axum::serve(listener, router).await?;
        Ok(())
    }
}

#[cfg(feature = "mcp-server")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}

#[cfg(not(feature = "mcp-server"))]
fn main() {
    eprintln!("litgraph was built without the `mcp-server` feature; no transports are available.");
    std::process::exit(1);
}

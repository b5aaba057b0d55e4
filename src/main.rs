use std::sync::Arc;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use unsplash_mcp_server::config::{ServerConfig, TransportKind};
use unsplash_mcp_server::handlers;
use unsplash_mcp_server::server::{McpServer, ServerError, ServerInfo};
use unsplash_mcp_server::transport::{MessageProxy, TracingObserver, Transport};

/// An Unsplash photos MCP server.
///
/// Provides tools for searching and retrieving photos from Unsplash over
/// stdio. Requires the UNSPLASH_ACCESS_KEY environment variable to be set
/// for tool calls to succeed.
#[derive(Debug, Parser)]
#[command(name = "unsplash-mcp-server", version, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit
    #[allow(dead_code)]
    #[arg(short = 'v', short_alias = 'V', long, action = ArgAction::Version)]
    version: Option<bool>,

    /// Transport type (only stdio is available)
    #[arg(short = 't', long, default_value = "stdio")]
    transport: String,

    /// Port for network transports (unused with stdio)
    #[arg(short = 'p', long, default_value_t = 8080)]
    port: u16,

    /// Log filter used when RUST_LOG is unset (logs go to stderr)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // stdout is reserved for the protocol.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let server = match start(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("unsplash-mcp-server: startup failed: {e}");
            std::process::exit(1);
        }
    };

    let transport = MessageProxy::wrap(Transport::stdio(), Arc::new(TracingObserver));
    tracing::info!("Unsplash MCP Server running on stdio");
    server.serve(transport).await;
}

fn start(cli: &Cli) -> Result<McpServer, ServerError> {
    let TransportKind::Stdio = cli.transport.parse::<TransportKind>()?;
    tracing::debug!(port = cli.port, "port is ignored by the stdio transport");

    let config = ServerConfig::from_env()?;
    if config.access_key.is_none() {
        tracing::warn!("UNSPLASH_ACCESS_KEY is not set; tool calls will fail until it is");
    }

    let registry = handlers::default_registry(&config)?;
    Ok(McpServer::new(ServerInfo::default(), registry))
}

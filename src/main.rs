//! MSSQL MCP Server entry point.
//!
//! This binary starts the MCP server using stdio transport for integration
//! with Claude Desktop, Cursor, and other MCP clients. Configuration comes
//! from `MSSQL_*` environment variables; `MSSQL_COMMAND` names an extra
//! alias for the `query-database` tool.

use anyhow::Result;
use mssql_mcp::config::is_truthy;
use mssql_mcp::constants::env;
use mssql_mcp::{ConnectionConfig, MssqlMcpServer};
use rmcp::ServiceExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is reserved for JSON-RPC)
    init_logging();

    let version = env!("CARGO_PKG_VERSION");
    info!("MSSQL MCP Server v{} starting (transport: stdio)", version);

    // Set up panic hook for debugging
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] {}", info);
    }));

    let config = ConnectionConfig::from_env();
    info!("Database config: {}", config);

    // Missing values are reported on each tool call, not here
    if let Err(e) = config.validate() {
        warn!("{}", e);
    }

    let alias = std::env::var(env::COMMAND).ok();
    let server = MssqlMcpServer::new(config).with_query_alias(alias.as_deref());

    let service = server.serve(rmcp::transport::stdio()).await?;
    info!("Server initialized. Ready to accept requests");

    match service.waiting().await {
        Ok(reason) => info!("Service stopped: {:?}", reason),
        Err(e) => warn!("Service error: {}", e),
    }

    Ok(())
}

/// Initialize tracing subscriber with stderr output.
///
/// Logs MUST go to stderr because stdout is used for JSON-RPC communication.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(default_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// `MCP_DEBUG=1` raises this crate to debug level.
fn default_filter() -> &'static str {
    match std::env::var(env::DEBUG) {
        Ok(v) if is_truthy(v.trim()) => "warn,mssql_mcp=debug",
        _ => "warn,mssql_mcp=info",
    }
}

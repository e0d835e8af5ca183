//! ServerHandler implementation for the MSSQL MCP Server.
//!
//! This module implements the rmcp `ServerHandler` trait which defines how
//! the server responds to MCP protocol requests.

use crate::resources::{build_resource_list, read_resource};
use crate::server::MssqlMcpServer;
use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    Implementation, ListResourcesResult, PaginatedRequestParam, ProtocolVersion,
    ReadResourceRequestParam, ReadResourceResult, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool_handler, ErrorData};
use tracing::info;

/// The `#[tool_handler]` macro wires up tool routing automatically.
/// It generates the `list_tools` and `call_tool` method implementations.
#[tool_handler]
impl ServerHandler for MssqlMcpServer {
    /// Server identification - called during initialization handshake.
    fn get_info(&self) -> ServerInfo {
        info!("MCP client requesting server info");

        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,

            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),

            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                title: Some("MSSQL MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },

            instructions: Some(build_instructions(self)),
        }
    }

    /// List one resource per base table.
    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let resources = build_resource_list(self).await;

        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: None,
        })
    }

    /// Read the first rows of a table.
    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        read_resource(self, &request.uri).await
    }
}

/// Build server instructions for the configured database.
fn build_instructions(server: &MssqlMcpServer) -> String {
    let mut instructions = String::new();

    instructions.push_str("# MSSQL MCP Server\n\n");
    instructions.push_str("This server provides access to a Microsoft SQL Server database.\n\n");

    match server.current_database() {
        Some(db) => instructions.push_str(&format!("**Configured database:** `{}`\n\n", db)),
        None => instructions.push_str(
            "**No database configured.** Set MSSQL_DATABASE before calling tools.\n\n",
        ),
    }

    instructions.push_str("### Tools\n");
    instructions.push_str("- `list-tables`: list base tables as schema.table\n");
    instructions.push_str("- `query-database`: run a SQL statement; bind values with `params` as @P1, @P2, ...\n");
    instructions.push_str("- `describe-table`: show the columns of a table\n\n");

    instructions.push_str("### Resources\n");
    instructions.push_str(&format!(
        "- `mssql://<schema.table>/data`: first {} rows of a table\n",
        crate::constants::DEFAULT_SAMPLE_ROWS
    ));

    instructions
}

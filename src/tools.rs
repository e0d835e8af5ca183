//! MCP Tools for SQL Server operations.
//!
//! - `list-tables`: List the base tables of the configured database
//! - `query-database`: Execute a SQL statement with optional positional parameters
//! - `describe-table`: Show the columns of one table

mod inputs;

pub use inputs::*;

use crate::database::truncate_for_log;
use crate::error::ServerError;
use crate::server::MssqlMcpServer;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content};
use rmcp::{tool, tool_router, ErrorData as McpError};
use tracing::{debug, info, warn};

#[tool_router(vis = "pub(crate)")]
impl MssqlMcpServer {
    /// List the base tables of the configured database.
    #[tool(
        name = "list-tables",
        description = "List all base tables in the configured database as schema.table names."
    )]
    pub async fn list_tables(&self) -> Result<CallToolResult, McpError> {
        debug!("Listing tables");

        match self.gate.list_tables().await {
            Ok(tables) => {
                info!("Listed {} tables", tables.len());
                Ok(CallToolResult::success(vec![Content::text(
                    format_table_list(self.current_database(), &tables),
                )]))
            }
            Err(e) => Ok(tool_error("list-tables", e)),
        }
    }

    /// Execute a SQL statement.
    ///
    /// The statement is sent as-is; values belong in `params` and are bound
    /// as `@P1..@Pn`.
    #[tool(
        name = "query-database",
        description = "Execute a SQL statement against SQL Server. SELECT and procedure calls return CSV-like rows; INSERT, UPDATE, DELETE and DDL return the affected row count. Pass values in 'params' and reference them as @P1, @P2, ..."
    )]
    pub async fn query_database(
        &self,
        Parameters(input): Parameters<QueryDatabaseInput>,
    ) -> Result<CallToolResult, McpError> {
        info!("query-database: {}", truncate_for_log(&input.sql, 100));

        if input.sql.trim().is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(
                "SQL statement is required",
            )]));
        }

        let params = input.params.unwrap_or_default();
        match self.gate.execute_query(None, &input.sql, &params).await {
            Ok(outcome) => Ok(CallToolResult::success(vec![Content::text(
                outcome.to_text(),
            )])),
            Err(e) => Ok(tool_error("query-database", e)),
        }
    }

    /// Describe the columns of a table.
    #[tool(
        name = "describe-table",
        description = "Describe the columns of a table: name, data type, nullability, max length and default. Accepts 'Table' or 'schema.Table'."
    )]
    pub async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Describing table: {}", input.table);

        match self.gate.describe_table(&input.table).await {
            Ok(outcome) => Ok(CallToolResult::success(vec![Content::text(
                outcome.to_text(),
            )])),
            Err(e) => Ok(tool_error("describe-table", e)),
        }
    }
}

/// Render the table list with a header naming the database.
fn format_table_list(database: Option<&str>, tables: &[String]) -> String {
    let mut out = format!("Tables_in_{}", database.unwrap_or("database"));
    for table in tables {
        out.push('\n');
        out.push_str(table);
    }
    out
}

/// Turn a gate failure into a tool-level error result.
fn tool_error(tool: &str, error: ServerError) -> CallToolResult {
    warn!("{} failed ({}): {}", tool, error.kind(), error);
    CallToolResult::error(vec![Content::text(error.to_tool_text())])
}

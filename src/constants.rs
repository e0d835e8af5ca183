//! Centralized constants for the MSSQL MCP server.
//!
//! Default values and well-known strings used by the config resolver and the
//! query gate live here so they are easy to find and change.

// =============================================================================
// Connection Defaults
// =============================================================================

/// Default SQL Server port.
pub const DEFAULT_PORT: u16 = 1433;

/// Default server when `MSSQL_SERVER` is unset.
pub const DEFAULT_SERVER: &str = "localhost";

/// Default schema for unqualified table names.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Application name reported to SQL Server.
pub const APPLICATION_NAME: &str = "mssql-mcp";

// =============================================================================
// Environment Detection
// =============================================================================

/// Host suffix identifying an Azure SQL Database endpoint.
pub const AZURE_SQL_SUFFIX: &str = ".database.windows.net";

/// TDS protocol version Azure SQL requires.
pub const AZURE_TDS_VERSION: &str = "7.4";

/// Prefix of a LocalDB server name, e.g. `(localdb)\MSSQLLocalDB`.
pub const LOCALDB_PREFIX: &str = "(localdb)\\";

/// Host alias for the local machine in `.\instance` server names.
pub const LOCAL_HOST_ALIAS: &str = ".";

// =============================================================================
// Result Size Constants
// =============================================================================

/// Rows returned when reading a table resource.
pub const DEFAULT_SAMPLE_ROWS: u32 = 100;

/// Name of the free-form statement tool.
pub const QUERY_TOOL_NAME: &str = "query-database";

/// Maximum length of SQL text echoed into log lines.
pub const LOG_SQL_MAX_LEN: usize = 200;

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable names read by the config resolver.
pub mod env {
    pub const SERVER: &str = "MSSQL_SERVER";
    pub const DATABASE: &str = "MSSQL_DATABASE";
    pub const USER: &str = "MSSQL_USER";
    pub const PASSWORD: &str = "MSSQL_PASSWORD";
    pub const PORT: &str = "MSSQL_PORT";
    pub const WINDOWS_AUTH: &str = "MSSQL_WINDOWS_AUTH";
    pub const ENCRYPT: &str = "MSSQL_ENCRYPT";
    pub const TRUST_CERT: &str = "MSSQL_TRUST_CERT";
    pub const COMMAND: &str = "MSSQL_COMMAND";
    pub const DEBUG: &str = "MCP_DEBUG";
}

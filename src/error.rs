//! Error types for the MSSQL MCP server.
//!
//! Every failure a tool call can hit is one of four kinds. They are reported
//! back to the MCP client as structured failure results, never as a crash.

use rmcp::ErrorData;
use thiserror::Error;

/// Domain errors for the config resolver and the query gate.
///
/// Named `ServerError` to avoid collision with `rmcp`'s `McpError` alias.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A required environment value is missing, surfaced at connection time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A table name failed the identifier allow-list.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The driver could not connect (network, TLS, login).
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<tiberius::error::Error>,
    },

    /// The driver rejected or failed a statement.
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid identifier error.
    pub fn invalid_identifier(msg: impl Into<String>) -> Self {
        Self::InvalidIdentifier(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error wrapping the driver error.
    pub fn connection_with_source(msg: impl Into<String>, source: tiberius::error::Error) -> Self {
        Self::Connection {
            message: format!("{}: {}", msg.into(), source),
            source: Some(source),
        }
    }

    /// Create a query failure carrying the driver's message.
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::InvalidIdentifier(_) => "InvalidIdentifier",
            Self::Connection { .. } => "ConnectionError",
            Self::QueryFailed(_) => "QueryFailed",
        }
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Configuration(_) => {
                Some("Set MSSQL_DATABASE, and MSSQL_USER/MSSQL_PASSWORD unless MSSQL_WINDOWS_AUTH=true")
            }
            Self::InvalidIdentifier(_) => {
                Some("Use a plain table name or schema.table with letters, digits and underscores")
            }
            Self::Connection { .. } => {
                Some("Check MSSQL_SERVER, MSSQL_PORT, credentials and network connectivity")
            }
            Self::QueryFailed(_) => None,
        }
    }

    /// Render the error as text for a tool failure result.
    pub fn to_tool_text(&self) -> String {
        match self.suggestion() {
            Some(hint) => format!("{}\nHint: {}", self, hint),
            None => self.to_string(),
        }
    }
}

/// Convert ServerError to rmcp's ErrorData for protocol-level responses.
///
/// Tool calls report failures as `CallToolResult::error` instead; this is
/// used by resource reads.
impl From<ServerError> for ErrorData {
    fn from(e: ServerError) -> Self {
        let data = Some(serde_json::json!({ "kind": e.kind() }));
        match e {
            ServerError::InvalidIdentifier(_) | ServerError::Configuration(_) => {
                ErrorData::invalid_params(e.to_string(), data)
            }
            ServerError::Connection { .. } | ServerError::QueryFailed(_) => {
                ErrorData::internal_error(e.to_string(), data)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ServerError::config("x").kind(), "ConfigurationError");
        assert_eq!(
            ServerError::invalid_identifier("x").kind(),
            "InvalidIdentifier"
        );
        assert_eq!(ServerError::connection("x").kind(), "ConnectionError");
        assert_eq!(ServerError::query_failed("x").kind(), "QueryFailed");
    }

    #[test]
    fn test_query_failed_keeps_driver_message() {
        let err = ServerError::query_failed("Invalid object name 'foo'.");
        assert_eq!(err.to_string(), "Query failed: Invalid object name 'foo'.");
        assert_eq!(err.to_tool_text(), err.to_string());
    }

    #[test]
    fn test_tool_text_includes_hint() {
        let err = ServerError::config("MSSQL_DATABASE is required");
        let text = err.to_tool_text();
        assert!(text.starts_with("Configuration error: MSSQL_DATABASE is required"));
        assert!(text.contains("Hint:"));
    }

    #[test]
    fn test_into_error_data() {
        let data: ErrorData = ServerError::invalid_identifier("a.b.c").into();
        assert!(data.message.contains("a.b.c"));

        let data: ErrorData = ServerError::query_failed("boom").into();
        assert!(data.message.contains("boom"));
    }
}

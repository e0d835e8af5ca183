//! MCP Resources exposing table contents.
//!
//! Every base table of the configured database is listed as one resource:
//!
//! - `mssql://{schema}.{table}/data` - First rows of the table as delimited text
//!
//! A bare table name (`mssql://Orders/data`) is also accepted on read and
//! resolves against the default schema.

use crate::constants::DEFAULT_SAMPLE_ROWS;
use crate::security::TableName;
use crate::server::MssqlMcpServer;
use rmcp::model::{AnnotateAble, RawResource, ReadResourceResult, Resource, ResourceContents};
use rmcp::ErrorData;
use tracing::{debug, error, info};

const URI_SCHEME: &str = "mssql://";
const DATA_SEGMENT: &str = "data";

/// Build one resource per base table.
///
/// Listing failures are logged and produce an empty list so that a
/// misconfigured server still answers `resources/list`.
pub async fn build_resource_list(server: &MssqlMcpServer) -> Vec<Resource> {
    match server.gate().list_tables().await {
        Ok(tables) => {
            info!("Found {} tables for resources", tables.len());
            tables.iter().map(|table| table_resource(table)).collect()
        }
        Err(e) => {
            error!("Failed to list resources: {}", e);
            Vec::new()
        }
    }
}

/// Read a table resource by URI.
pub async fn read_resource(
    server: &MssqlMcpServer,
    uri: &str,
) -> Result<ReadResourceResult, ErrorData> {
    info!("Reading resource: {}", uri);

    let table = parse_resource_uri(uri).map_err(|e| ErrorData::invalid_params(e.to_string(), None))?;

    let outcome = server
        .gate()
        .sample_table(&table.to_string(), DEFAULT_SAMPLE_ROWS)
        .await
        .map_err(|e| {
            error!("Database error reading resource {}: {}", uri, e);
            ErrorData::from(e)
        })?;

    debug!("Read resource {}", uri);

    Ok(ReadResourceResult {
        contents: vec![ResourceContents::text(outcome.to_text(), uri.to_string())],
    })
}

/// The resource URI for a table.
pub fn table_uri(table: &str) -> String {
    format!("{}{}/{}", URI_SCHEME, table, DATA_SEGMENT)
}

fn table_resource(table: &str) -> Resource {
    create_resource(
        &table_uri(table),
        &format!("Table: {}", table),
        &format!("Data in table: {}", table),
        "text/plain",
    )
}

/// Create a resource definition.
fn create_resource(uri: &str, name: &str, description: &str, mime_type: &str) -> Resource {
    let mut resource = RawResource::new(uri, name);
    resource.description = Some(description.to_string());
    resource.mime_type = Some(mime_type.to_string());
    resource.no_annotation()
}

// =========================================================================
// Resource URI Parsing
// =========================================================================

/// Error type for resource URI parsing with detailed context.
#[derive(Debug)]
struct ResourceParseError {
    uri: String,
    reason: ParseErrorReason,
}

/// Specific reasons why a resource URI parse failed.
#[derive(Debug)]
enum ParseErrorReason {
    /// URI does not start with mssql:// scheme
    InvalidScheme,
    /// No table segment
    EmptyPath,
    /// Second segment is not `data`
    UnknownResourceType { segment: String },
    /// Table segment failed identifier validation
    InvalidIdentifier { identifier: String, reason: String },
    /// Too many path segments
    TooManySegments { got: usize },
}

impl std::fmt::Display for ResourceParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid resource URI '{}': ", self.uri)?;
        match &self.reason {
            ParseErrorReason::InvalidScheme => {
                write!(f, "URI must start with 'mssql://' scheme")
            }
            ParseErrorReason::EmptyPath => write!(f, "missing table name"),
            ParseErrorReason::UnknownResourceType { segment } => {
                write!(f, "unknown resource type '{}', expected 'data'", segment)
            }
            ParseErrorReason::InvalidIdentifier { identifier, reason } => {
                write!(f, "invalid identifier '{}': {}", identifier, reason)
            }
            ParseErrorReason::TooManySegments { got } => {
                write!(f, "too many path segments (expected 2, got {})", got)
            }
        }
    }
}

impl std::error::Error for ResourceParseError {}

/// Parse `mssql://{table}/data` into a validated table name.
fn parse_resource_uri(uri: &str) -> Result<TableName, ResourceParseError> {
    let fail = |reason| ResourceParseError {
        uri: uri.to_string(),
        reason,
    };

    let path = uri
        .strip_prefix(URI_SCHEME)
        .ok_or_else(|| fail(ParseErrorReason::InvalidScheme))?;

    let segments: Vec<&str> = path.split('/').collect();
    let table = match segments.first() {
        Some(t) if !t.is_empty() => *t,
        _ => return Err(fail(ParseErrorReason::EmptyPath)),
    };

    match segments.len() {
        1 => {}
        2 if segments[1] == DATA_SEGMENT => {}
        2 => {
            return Err(fail(ParseErrorReason::UnknownResourceType {
                segment: segments[1].to_string(),
            }))
        }
        got => return Err(fail(ParseErrorReason::TooManySegments { got })),
    }

    TableName::parse(table).map_err(|e| {
        fail(ParseErrorReason::InvalidIdentifier {
            identifier: table.to_string(),
            reason: e.to_string(),
        })
    })
}

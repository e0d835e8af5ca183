//! Tool input types with JSON Schema generation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input for the `query-database` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryDatabaseInput {
    /// The SQL statement to execute.
    #[schemars(description = "SQL statement to execute. Reference bound parameters as @P1, @P2, ...")]
    pub sql: String,

    /// Positional parameters bound to @P1..@Pn.
    #[serde(default)]
    #[schemars(description = "Optional positional parameters bound to @P1, @P2, ... in order")]
    pub params: Option<Vec<Value>>,
}

/// Input for the `describe-table` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Table name, optionally schema-qualified.
    #[schemars(description = "Table name, e.g. 'Customers' or 'dbo.Orders'")]
    pub table: String,
}

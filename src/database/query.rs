//! The query gate: table listing, free-form statement execution and
//! generated per-table statements.

use crate::config::ConnectionConfig;
use crate::constants::LOG_SQL_MAX_LEN;
use crate::database::connection::{open_connection, RawConnection};
use crate::database::types::{SqlParam, SqlValue, TypeMapper};
use crate::error::ServerError;
use crate::security::TableName;
use futures_util::stream::TryStreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tiberius::{Query, QueryItem, QueryStream};
use tracing::{debug, warn};

/// Placeholder in generated statements replaced by an escaped table name.
pub const TABLE_PLACEHOLDER: &str = "{table}";

const LIST_TABLES_SQL: &str = "SELECT TABLE_SCHEMA, TABLE_NAME \
     FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_TYPE = 'BASE TABLE' \
     ORDER BY TABLE_SCHEMA, TABLE_NAME";

const SAMPLE_TABLE_SQL: &str = "SELECT TOP (@P1) * FROM {table}";

const DESCRIBE_TABLE_SQL: &str = "SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, \
     IS_NULLABLE, COLUMN_DEFAULT \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2 \
     ORDER BY ORDINAL_POSITION";

/// Top-level verbs that never produce a result set.
const AFFECTED_VERBS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "CREATE", "ALTER", "DROP", "TRUNCATE", "GRANT",
    "REVOKE", "DENY",
];

/// Verbs that can follow the CTE definitions of a `WITH` clause.
const CTE_MAIN_VERBS: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE", "MERGE"];

/// How a statement is run and how its outcome is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementShape {
    /// SELECT, or a CTE whose main statement is a SELECT.
    Rows,
    /// DML and DDL, including `SELECT ... INTO` and CTE-prefixed DML.
    Affected,
    /// Procedure calls and batches (`EXEC`, `SET NOCOUNT ON; ...`, `DECLARE`).
    /// Rows are returned if the server sends a result set.
    Batch,
}

impl StatementShape {
    /// Classify a statement by its top-level keywords.
    ///
    /// Comments, string literals, quoted identifiers and parenthesized
    /// subexpressions are skipped.
    pub fn detect(sql: &str) -> Self {
        let words = top_level_words(sql);
        let Some(first) = words.first() else {
            return StatementShape::Batch;
        };

        match first.as_str() {
            "SELECT" => select_shape(&words[1..]),
            "WITH" => match words.iter().position(|w| CTE_MAIN_VERBS.contains(&w.as_str())) {
                Some(pos) if words[pos] == "SELECT" => select_shape(&words[pos + 1..]),
                Some(_) => StatementShape::Affected,
                None => StatementShape::Batch,
            },
            verb if AFFECTED_VERBS.contains(&verb) => StatementShape::Affected,
            _ => StatementShape::Batch,
        }
    }
}

/// `SELECT ... INTO` creates a table and reports a count.
fn select_shape(after_select: &[String]) -> StatementShape {
    for word in after_select {
        match word.as_str() {
            "INTO" => return StatementShape::Affected,
            "FROM" | "WHERE" | "UNION" | "EXCEPT" | "INTERSECT" => break,
            _ => {}
        }
    }
    StatementShape::Rows
}

/// Rows of a result set with their column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names in order.
    pub columns: Vec<String>,

    /// Values per row, in column order.
    pub rows: Vec<Vec<SqlValue>>,

    /// Execution time in milliseconds.
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Format the result as comma-delimited text with a header line.
    ///
    /// `NULL` marks null values. Values containing commas, quotes or
    /// newlines are quoted CSV-style.
    pub fn to_delimited_text(&self) -> String {
        if self.rows.is_empty() {
            return format!(
                "Query returned 0 rows.\nColumns: {}",
                self.columns.join(", ")
            );
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(
            self.columns
                .iter()
                .map(|c| escape_field(c))
                .collect::<Vec<_>>()
                .join(","),
        );

        for row in &self.rows {
            lines.push(
                row.iter()
                    .map(|v| escape_field(&v.to_display_string()))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }

        lines.join("\n")
    }
}

/// Outcome of executing a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// A result set, from a SELECT-shaped statement.
    Rows(QueryResult),
    /// Rows affected by a non-SELECT statement.
    Affected(u64),
    /// A procedure call or batch that sent no result set.
    Completed,
}

impl QueryOutcome {
    /// Render the outcome as the text returned to the MCP client.
    pub fn to_text(&self) -> String {
        match self {
            QueryOutcome::Rows(result) => result.to_delimited_text(),
            QueryOutcome::Affected(n) => {
                format!("Query executed successfully. Rows affected: {}", n)
            }
            QueryOutcome::Completed => "Query executed successfully.".to_string(),
        }
    }
}

/// Executes statements against SQL Server, one connection per call.
///
/// Free-form SQL is trusted and only ever sent through the parameterized
/// entry point. Table names are the only caller text interpolated into SQL,
/// and only after passing [`TableName::parse`].
#[derive(Debug, Clone)]
pub struct QueryGate {
    config: Arc<ConnectionConfig>,
}

impl QueryGate {
    /// Create a gate over a resolved connection configuration.
    pub fn new(config: Arc<ConnectionConfig>) -> Self {
        Self { config }
    }

    /// The connection configuration this gate uses.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// List base tables of the current database as `schema.table`.
    pub async fn list_tables(&self) -> Result<Vec<String>, ServerError> {
        let mut client = open_connection(&self.config).await?;

        let result = async {
            let stream = client.query(LIST_TABLES_SQL, &[]).await?;
            let rows = stream.into_first_result().await?;
            Ok::<_, tiberius::error::Error>(
                rows.iter()
                    .filter_map(|row| {
                        let schema: Option<&str> = row.get(0);
                        let name: Option<&str> = row.get(1);
                        Some(format!("{}.{}", schema?, name?))
                    })
                    .collect::<Vec<_>>(),
            )
        }
        .await
        .map_err(|e| ServerError::query_failed(e.to_string()));

        close_quietly(client).await;

        let tables = result?;
        debug!("Found {} tables", tables.len());
        Ok(tables)
    }

    /// Execute a statement.
    ///
    /// When `table_name` is given it must pass the identifier allow-list; its
    /// escaped form replaces `{table}` in `sql`. Validation happens before any
    /// connection is opened. `params` bind positionally as `@P1..@Pn`.
    pub async fn execute_query(
        &self,
        table_name: Option<&str>,
        sql: &str,
        params: &[Value],
    ) -> Result<QueryOutcome, ServerError> {
        let sql = match table_name {
            Some(raw) => {
                let table = TableName::parse(raw)?;
                sql.replace(TABLE_PLACEHOLDER, &table.escaped())
            }
            None => sql.to_string(),
        };

        debug!(
            "Executing query: {} ({} params)",
            truncate_for_log(&sql, LOG_SQL_MAX_LEN),
            params.len()
        );

        let shape = StatementShape::detect(&sql);
        let mut client = open_connection(&self.config).await?;
        let start = Instant::now();

        let result = run_statement(&mut client, &sql, params, shape, start).await;
        close_quietly(client).await;

        match &result {
            Ok(QueryOutcome::Rows(r)) => debug!(
                "Query completed: {} rows in {} ms",
                r.rows.len(),
                r.execution_time_ms
            ),
            Ok(QueryOutcome::Affected(n)) => debug!("Statement completed: {} rows affected", n),
            Ok(QueryOutcome::Completed) => debug!("Statement completed"),
            Err(e) => warn!("Query failed: {}", e),
        }

        result
    }

    /// Return the first `limit` rows of a table.
    pub async fn sample_table(
        &self,
        table_name: &str,
        limit: u32,
    ) -> Result<QueryOutcome, ServerError> {
        self.execute_query(
            Some(table_name),
            SAMPLE_TABLE_SQL,
            &[Value::from(i64::from(limit))],
        )
        .await
    }

    /// Describe the columns of a table.
    pub async fn describe_table(&self, table_name: &str) -> Result<QueryOutcome, ServerError> {
        let table = TableName::parse(table_name)?;
        self.execute_query(
            None,
            DESCRIBE_TABLE_SQL,
            &[
                Value::from(table.schema_or_default()),
                Value::from(table.name()),
            ],
        )
        .await
    }
}

/// Run one statement on an open connection.
async fn run_statement(
    client: &mut RawConnection,
    sql: &str,
    params: &[Value],
    shape: StatementShape,
    start: Instant,
) -> Result<QueryOutcome, ServerError> {
    let mut query = Query::new(sql);
    for param in params {
        SqlParam::from_json(param).bind_to(&mut query);
    }

    match shape {
        StatementShape::Rows | StatementShape::Batch => {
            let stream = query
                .query(client)
                .await
                .map_err(|e| ServerError::query_failed(e.to_string()))?;
            process_stream(stream, start).await
        }
        StatementShape::Affected => {
            let result = query
                .execute(client)
                .await
                .map_err(|e| ServerError::query_failed(e.to_string()))?;
            Ok(QueryOutcome::Affected(result.total()))
        }
    }
}

/// Collect the first result set of a stream.
async fn process_stream(
    mut stream: QueryStream<'_>,
    start: Instant,
) -> Result<QueryOutcome, ServerError> {
    let mut columns: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<SqlValue>> = Vec::new();

    while let Some(item) = stream
        .try_next()
        .await
        .map_err(|e| ServerError::query_failed(e.to_string()))?
    {
        match item {
            QueryItem::Metadata(meta) => {
                if meta.result_index() > 0 {
                    // Later result sets are drained but not returned
                    continue;
                }
                columns = Some(meta.columns().iter().map(|c| c.name().to_string()).collect());
            }
            QueryItem::Row(row) => {
                if row.result_index() > 0 {
                    continue;
                }
                let values = (0..row.len())
                    .map(|idx| TypeMapper::extract_column(&row, idx))
                    .collect();
                rows.push(values);
            }
        }
    }

    Ok(match columns {
        Some(columns) => QueryOutcome::Rows(QueryResult {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        }),
        None => QueryOutcome::Completed,
    })
}

async fn close_quietly(client: RawConnection) {
    if let Err(e) = client.close().await {
        debug!("Error closing connection: {}", e);
    }
}

/// Quote a field for comma-delimited output when it needs it.
fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Uppercased keywords and identifiers outside parentheses, literals and comments.
fn top_level_words(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            '\'' | '"' | '[' => {
                let close = if c == '[' { ']' } else { c };
                i += 1;
                while i < chars.len() {
                    if chars[i] == close {
                        // Doubled closer is an escaped character
                        if chars.get(i + 1) == Some(&close) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            '(' => {
                depth += 1;
                i += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' || c == '@' || c == '#' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '@' | '#' | '$'))
                {
                    i += 1;
                }
                if depth == 0 {
                    words.push(chars[start..i].iter().collect::<String>().to_uppercase());
                }
            }
            _ => i += 1,
        }
    }

    words
}

/// Truncate a string for logging purposes.
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

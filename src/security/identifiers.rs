//! Table-name allow-list and SQL Server identifier escaping.
//!
//! A table name is accepted only if it is a plain identifier or a single
//! `schema.table` pair made of ASCII letters, digits and underscores. Accepted
//! names are rendered in bracket notation before they reach SQL text.

use crate::constants::DEFAULT_SCHEMA;
use crate::error::ServerError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Maximum length for SQL Server identifiers.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Plain `table` or a single `schema.table` pair, ASCII word characters only.
static TABLE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .unwrap_or_else(|e| panic!("Internal error: invalid table name pattern: {}", e))
});

/// A table name that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

impl TableName {
    /// Validate a caller-supplied table name.
    ///
    /// # Examples
    ///
    /// ```
    /// use mssql_mcp::security::TableName;
    ///
    /// assert_eq!(TableName::parse("dbo.Orders").unwrap().escaped(), "[dbo].[Orders]");
    /// assert_eq!(TableName::parse("Customers").unwrap().escaped(), "[Customers]");
    /// assert!(TableName::parse("users; DROP TABLE x").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ServerError> {
        validate_table_name(raw)?;

        let (schema, name) = match raw.split_once('.') {
            Some((schema, name)) => (Some(schema.to_string()), name.to_string()),
            None => (None, raw.to_string()),
        };

        Ok(Self { schema, name })
    }

    /// The schema, if one was given.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// The schema, defaulting to `dbo`.
    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    /// The unqualified table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bracket-escaped form for interpolation into SQL text.
    pub fn escaped(&self) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                escape_single_identifier(schema),
                escape_single_identifier(&self.name)
            ),
            None => escape_single_identifier(&self.name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Check a table name against the allow-list pattern.
pub fn validate_table_name(raw: &str) -> Result<(), ServerError> {
    if raw.is_empty() {
        return Err(ServerError::invalid_identifier("Table name cannot be empty"));
    }

    if raw.len() > 2 * MAX_IDENTIFIER_LENGTH + 1 {
        return Err(ServerError::invalid_identifier(format!(
            "Table name exceeds maximum length of {} characters per part",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    if !TABLE_NAME_PATTERN.is_match(raw) {
        return Err(ServerError::invalid_identifier(format!(
            "Invalid table name: {:?}",
            raw
        )));
    }

    if raw.split('.').any(|part| part.len() > MAX_IDENTIFIER_LENGTH) {
        return Err(ServerError::invalid_identifier(format!(
            "Table name exceeds maximum length of {} characters per part",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    Ok(())
}

/// Escape a single identifier using bracket notation, doubling any `]`.
pub fn escape_single_identifier(identifier: &str) -> String {
    format!("[{}]", identifier.replace(']', "]]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_and_qualified_names() {
        for name in ["Customers", "dbo.Orders", "_staging", "sales.Order_Lines2", "T"] {
            assert!(TableName::parse(name).is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn test_rejects_injection_and_malformed_names() {
        for name in [
            "users; DROP TABLE x",
            "dbo.Orders; DELETE FROM x",
            "a.b.c",
            "",
            "1table",
            "dbo.",
            ".Orders",
            "Users--",
            "[dbo].[Orders]",
            "my table",
            "dbo.Orders'",
            "Ördnung",
        ] {
            let err = TableName::parse(name).unwrap_err();
            assert!(
                matches!(err, ServerError::InvalidIdentifier(_)),
                "{name:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_rejects_trailing_newline() {
        assert!(TableName::parse("Orders\n").is_err());
    }

    #[test]
    fn test_escaped_forms() {
        assert_eq!(TableName::parse("Users").unwrap().escaped(), "[Users]");
        assert_eq!(
            TableName::parse("dbo.Users").unwrap().escaped(),
            "[dbo].[Users]"
        );
    }

    #[test]
    fn test_parts() {
        let table = TableName::parse("sales.Orders").unwrap();
        assert_eq!(table.schema(), Some("sales"));
        assert_eq!(table.name(), "Orders");
        assert_eq!(table.to_string(), "sales.Orders");

        let table = TableName::parse("Orders").unwrap();
        assert_eq!(table.schema(), None);
        assert_eq!(table.schema_or_default(), "dbo");
    }

    #[test]
    fn test_length_limit() {
        let long = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(TableName::parse(&long).is_err());
        let ok = "a".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(TableName::parse(&ok).is_ok());
    }

    #[test]
    fn test_escape_single_identifier_doubles_brackets() {
        assert_eq!(escape_single_identifier("Table[1]"), "[Table[1]]]");
    }
}

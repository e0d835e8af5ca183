//! Identifier validation that keeps caller-supplied table names out of SQL
//! structure.

mod identifiers;

pub use identifiers::{
    escape_single_identifier, validate_table_name, TableName, MAX_IDENTIFIER_LENGTH,
};

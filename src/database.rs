//! Database connectivity and query execution.

mod connection;
mod query;
pub mod types;

pub use connection::{create_config, open_connection, RawConnection};
pub use query::{
    truncate_for_log, QueryGate, QueryOutcome, QueryResult, StatementShape, TABLE_PLACEHOLDER,
};
pub use types::{SqlParam, SqlValue, TypeMapper};

//! SQL Server type mapping between Rust, JSON and tiberius values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tiberius::{ColumnData, Query, Row};
use tracing::debug;
use uuid::Uuid;

/// A value read from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
}

impl SqlValue {
    /// Convert to a display string.
    pub fn to_display_string(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::U8(v) => v.to_string(),
            SqlValue::I16(v) => v.to_string(),
            SqlValue::I32(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F32(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::String(v) => v.clone(),
            SqlValue::Bytes(v) => format!("0x{}", hex::encode(v)),
            SqlValue::Decimal(v) => v.to_string(),
            SqlValue::Uuid(v) => v.to_string(),
            SqlValue::Date(v) => v.to_string(),
            SqlValue::Time(v) => v.to_string(),
            SqlValue::DateTime(v) => v.to_string(),
            SqlValue::DateTimeUtc(v) => v.to_rfc3339(),
        }
    }
}

/// Type mapper for converting SQL Server column values to [`SqlValue`].
pub struct TypeMapper;

impl TypeMapper {
    /// Extract a value from a tiberius row column.
    pub fn extract_column(row: &Row, idx: usize) -> SqlValue {
        if row.columns().get(idx).is_none() {
            return SqlValue::Null;
        }

        // Strings (most common)
        if let Some(v) = row.try_get::<&str, _>(idx).ok().flatten() {
            return SqlValue::String(v.to_string());
        }

        // Integers
        if let Some(v) = row.try_get::<i32, _>(idx).ok().flatten() {
            return SqlValue::I32(v);
        }
        if let Some(v) = row.try_get::<i64, _>(idx).ok().flatten() {
            return SqlValue::I64(v);
        }
        if let Some(v) = row.try_get::<i16, _>(idx).ok().flatten() {
            return SqlValue::I16(v);
        }
        // TINYINT is unsigned in SQL Server
        if let Some(v) = row.try_get::<u8, _>(idx).ok().flatten() {
            return SqlValue::U8(v);
        }

        // Floating point
        if let Some(v) = row.try_get::<f64, _>(idx).ok().flatten() {
            return SqlValue::F64(v);
        }
        if let Some(v) = row.try_get::<f32, _>(idx).ok().flatten() {
            return SqlValue::F32(v);
        }

        if let Some(v) = row.try_get::<Decimal, _>(idx).ok().flatten() {
            return SqlValue::Decimal(v);
        }

        if let Some(v) = row.try_get::<bool, _>(idx).ok().flatten() {
            return SqlValue::Bool(v);
        }

        if let Some(v) = row.try_get::<Uuid, _>(idx).ok().flatten() {
            return SqlValue::Uuid(v);
        }

        // Date/Time types
        if let Some(v) = row.try_get::<DateTime<Utc>, _>(idx).ok().flatten() {
            return SqlValue::DateTimeUtc(v);
        }
        if let Some(v) = row.try_get::<NaiveDateTime, _>(idx).ok().flatten() {
            return SqlValue::DateTime(v);
        }
        if let Some(v) = row.try_get::<NaiveDate, _>(idx).ok().flatten() {
            return SqlValue::Date(v);
        }
        if let Some(v) = row.try_get::<NaiveTime, _>(idx).ok().flatten() {
            return SqlValue::Time(v);
        }

        if let Some(v) = row.try_get::<&[u8], _>(idx).ok().flatten() {
            return SqlValue::Bytes(v.to_vec());
        }

        match row.cells().nth(idx) {
            Some((column, data)) => {
                let value = Self::from_unmapped(data);
                if !matches!(value, SqlValue::Null) {
                    debug!(
                        "Column {} ({:?}) read without a typed mapping",
                        column.name(),
                        column.column_type()
                    );
                }
                value
            }
            None => SqlValue::Null,
        }
    }

    /// Convert a value none of the typed reads accepted.
    ///
    /// XML becomes its text; other non-null values keep their driver
    /// representation so they are never mistaken for NULL.
    pub fn from_unmapped(data: &ColumnData<'_>) -> SqlValue {
        match data {
            ColumnData::Xml(Some(xml)) => SqlValue::String(xml.to_string()),
            data if is_null_data(data) => SqlValue::Null,
            other => SqlValue::String(format!("{:?}", other)),
        }
    }
}

/// Whether a driver value is SQL NULL.
fn is_null_data(data: &ColumnData<'_>) -> bool {
    matches!(
        data,
        ColumnData::U8(None)
            | ColumnData::I16(None)
            | ColumnData::I32(None)
            | ColumnData::I64(None)
            | ColumnData::F32(None)
            | ColumnData::F64(None)
            | ColumnData::Bit(None)
            | ColumnData::String(None)
            | ColumnData::Guid(None)
            | ColumnData::Binary(None)
            | ColumnData::Numeric(None)
            | ColumnData::Xml(None)
            | ColumnData::DateTime(None)
            | ColumnData::SmallDateTime(None)
            | ColumnData::Time(None)
            | ColumnData::Date(None)
            | ColumnData::DateTime2(None)
            | ColumnData::DateTimeOffset(None)
    )
}

/// A positional query parameter converted from a JSON tool argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlParam {
    /// Map a JSON value to the SQL type it binds as.
    ///
    /// Integers outside the `i64` range and nested arrays/objects are sent as
    /// their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => SqlParam::Null,
            Value::Bool(b) => SqlParam::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlParam::Int(i)
                } else if n.is_f64() {
                    n.as_f64().map_or_else(|| SqlParam::Text(n.to_string()), SqlParam::Float)
                } else {
                    SqlParam::Text(n.to_string())
                }
            }
            Value::String(s) => SqlParam::Text(s.clone()),
            other => SqlParam::Text(other.to_string()),
        }
    }

    /// Bind this value as the next `@Pn` parameter of a query.
    pub fn bind_to(self, query: &mut Query<'_>) {
        match self {
            SqlParam::Null => query.bind(Option::<String>::None),
            SqlParam::Bool(v) => query.bind(v),
            SqlParam::Int(v) => query.bind(v),
            SqlParam::Float(v) => query.bind(v),
            SqlParam::Text(v) => query.bind(v),
        }
    }
}

/// Hex encoding helper.
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::borrow::Cow;
    use tiberius::xml::XmlData;

    #[test]
    fn test_sql_value_display() {
        assert_eq!(SqlValue::Null.to_display_string(), "NULL");
        assert_eq!(SqlValue::I32(42).to_display_string(), "42");
        assert_eq!(
            SqlValue::String("hello".to_string()).to_display_string(),
            "hello"
        );
        assert_eq!(SqlValue::Bool(true).to_display_string(), "true");
        assert_eq!(
            SqlValue::Bytes(vec![0xDE, 0xAD]).to_display_string(),
            "0xDEAD"
        );
    }

    #[test]
    fn test_unmapped_xml_is_text() {
        let xml = XmlData::new("<order id=\"1\"/>");
        let data = ColumnData::Xml(Some(Cow::Owned(xml)));
        assert_eq!(
            TypeMapper::from_unmapped(&data),
            SqlValue::String("<order id=\"1\"/>".to_string())
        );
        assert_eq!(
            TypeMapper::from_unmapped(&data).to_display_string(),
            "<order id=\"1\"/>"
        );
    }

    #[test]
    fn test_unmapped_null_stays_null() {
        assert_eq!(TypeMapper::from_unmapped(&ColumnData::Xml(None)), SqlValue::Null);
        assert_eq!(TypeMapper::from_unmapped(&ColumnData::I32(None)), SqlValue::Null);
        assert_eq!(
            TypeMapper::from_unmapped(&ColumnData::DateTimeOffset(None)),
            SqlValue::Null
        );
    }

    #[test]
    fn test_unmapped_value_is_not_reported_as_null() {
        let value = TypeMapper::from_unmapped(&ColumnData::I32(Some(7)));
        assert_ne!(value, SqlValue::Null);
        assert_ne!(value.to_display_string(), "NULL");
        assert!(value.to_display_string().contains('7'));
    }

    #[test]
    fn test_param_from_json() {
        assert_eq!(SqlParam::from_json(&json!(null)), SqlParam::Null);
        assert_eq!(SqlParam::from_json(&json!(true)), SqlParam::Bool(true));
        assert_eq!(SqlParam::from_json(&json!(-7)), SqlParam::Int(-7));
        assert_eq!(SqlParam::from_json(&json!(2.5)), SqlParam::Float(2.5));
        assert_eq!(
            SqlParam::from_json(&json!("O'Brien")),
            SqlParam::Text("O'Brien".to_string())
        );
    }

    #[test]
    fn test_param_from_json_fallbacks() {
        assert_eq!(
            SqlParam::from_json(&json!(u64::MAX)),
            SqlParam::Text(u64::MAX.to_string())
        );
        assert_eq!(
            SqlParam::from_json(&json!([1, 2])),
            SqlParam::Text("[1,2]".to_string())
        );
        assert_eq!(
            SqlParam::from_json(&json!({"a": 1})),
            SqlParam::Text(r#"{"a":1}"#.to_string())
        );
    }

    #[test]
    fn test_bind_to_query() {
        let mut query = Query::new("SELECT @P1, @P2, @P3");
        SqlParam::Int(1).bind_to(&mut query);
        SqlParam::Text("x".to_string()).bind_to(&mut query);
        SqlParam::Null.bind_to(&mut query);
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex::encode(&[0xDE, 0xAD, 0xBE, 0xEF]), "DEADBEEF");
        assert_eq!(hex::encode(&[]), "");
    }
}

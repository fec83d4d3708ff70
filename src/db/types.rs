//! Row materialization.
//!
//! Driver rows borrow from the connection that produced them. Everything here
//! copies column values into owned `Row`s so results outlive the transaction.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies the runtime type of each value
//! 2. Backend-specific decoders handle the actual value extraction
//!
//! A column that cannot be decoded fails the whole call, so the executor
//! rolls its transaction back instead of returning a partial row.

use crate::models::{Row, Value};
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::error;

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    TimestampTz,
    Timestamp,
    Date,
    Time,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.to_ascii_lowercase().as_str() {
        "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "int" => {
            TypeCategory::Integer
        }
        "float4" | "float8" | "real" | "double precision" | "double" | "float" => {
            TypeCategory::Float
        }
        "numeric" | "decimal" => TypeCategory::Decimal,
        "bool" | "boolean" => TypeCategory::Boolean,
        "text" | "varchar" | "bpchar" | "char" | "name" | "citext" => TypeCategory::Text,
        "bytea" | "blob" => TypeCategory::Binary,
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        "timestamptz" => TypeCategory::TimestampTz,
        "timestamp" | "datetime" => TypeCategory::Timestamp,
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// Materialization
// =============================================================================

/// Driver rows that can be copied into owned values.
pub trait MaterializeRow {
    fn column_names(&self) -> Vec<String>;
    fn decode_values(&self) -> Result<Vec<Value>, sqlx::Error>;
}

/// Copy a single driver row.
///
/// Fails on the first column that cannot be represented as a `Value`.
pub fn materialize<R: MaterializeRow>(row: &R) -> Result<Row, sqlx::Error> {
    Ok(Row::new(row.column_names(), row.decode_values()?))
}

/// Copy a result set, reading the column names once.
pub fn materialize_all<R: MaterializeRow>(rows: &[R]) -> Result<Vec<Row>, sqlx::Error> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns = first.column_names();
    rows.iter()
        .map(|row| Ok(Row::new(columns.clone(), row.decode_values()?)))
        .collect()
}

impl MaterializeRow for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn decode_values(&self) -> Result<Vec<Value>, sqlx::Error> {
        (0..self.len())
            .map(|idx| postgres::decode_column(self, idx))
            .collect()
    }
}

impl MaterializeRow for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn decode_values(&self) -> Result<Vec<Value>, sqlx::Error> {
        (0..self.len())
            .map(|idx| sqlite::decode_column(self, idx))
            .collect()
    }
}

/// Runtime type name of a column value, or `None` when the value is NULL.
fn runtime_type<R>(row: &R, idx: usize) -> Result<Option<String>, sqlx::Error>
where
    R: sqlx::Row,
    usize: sqlx::ColumnIndex<R>,
{
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(None);
    }
    Ok(Some(raw.type_info().name().to_string()))
}

fn log_failure(
    decoded: Result<Value, sqlx::Error>,
    idx: usize,
    type_name: &str,
) -> Result<Value, sqlx::Error> {
    decoded.inspect_err(|e| {
        error!(column = idx, type_name = %type_name, error = %e, "Failed to decode column");
    })
}

// =============================================================================
// Backend-Specific Decoders
// =============================================================================

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use sqlx::Row as _;
    use sqlx::types::BigDecimal;

    pub fn decode_column(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        let Some(type_name) = runtime_type(row, idx)? else {
            return Ok(Value::Null);
        };

        let decoded = match categorize_type(&type_name) {
            TypeCategory::Integer => decode_integer(row, idx, &type_name),
            TypeCategory::Float => decode_float(row, idx, &type_name),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).map(Value::Bool),
            TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).map(Value::Bytes),
            TypeCategory::Json => row
                .try_get::<serde_json::Value, _>(idx)
                .map(|v| Value::Text(v.to_string())),
            TypeCategory::Uuid => row
                .try_get::<uuid::Uuid, _>(idx)
                .map(|v| Value::Text(v.to_string())),
            TypeCategory::TimestampTz => row
                .try_get::<DateTime<Utc>, _>(idx)
                .map(|v| Value::Text(v.to_rfc3339())),
            TypeCategory::Timestamp => row
                .try_get::<NaiveDateTime, _>(idx)
                .map(|v| Value::Text(v.to_string())),
            TypeCategory::Date => row
                .try_get::<NaiveDate, _>(idx)
                .map(|v| Value::Text(v.to_string())),
            TypeCategory::Time => row
                .try_get::<NaiveTime, _>(idx)
                .map(|v| Value::Text(v.to_string())),
            // Rendered as text to keep every digit of the stored scale.
            TypeCategory::Decimal => row
                .try_get::<BigDecimal, _>(idx)
                .map(|v| Value::Text(v.to_string())),
            // Intervals, arrays, ranges and other types with no `Value`
            // counterpart fail here; cast them to text in SQL to read them.
            TypeCategory::Text | TypeCategory::Unknown => {
                row.try_get::<String, _>(idx).map(Value::Text)
            }
        };
        log_failure(decoded, idx, &type_name)
    }

    fn decode_integer(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
        match type_name {
            "INT2" => row.try_get::<i16, _>(idx).map(|v| Value::Int(v.into())),
            "INT4" => row.try_get::<i32, _>(idx).map(|v| Value::Int(v.into())),
            _ => row.try_get::<i64, _>(idx).map(Value::Int),
        }
    }

    fn decode_float(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
        match type_name {
            "FLOAT4" => row.try_get::<f32, _>(idx).map(|v| Value::Float(v.into())),
            _ => row.try_get::<f64, _>(idx).map(Value::Float),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::Row as _;

    pub fn decode_column(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
        let Some(type_name) = runtime_type(row, idx)? else {
            return Ok(Value::Null);
        };

        let decoded = match categorize_type(&type_name) {
            TypeCategory::Integer => row.try_get::<i64, _>(idx).map(Value::Int),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).map(Value::Bool),
            TypeCategory::Float | TypeCategory::Decimal => {
                row.try_get::<f64, _>(idx).map(Value::Float)
            }
            TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).map(Value::Bytes),
            _ => row.try_get::<String, _>(idx).map(Value::Text),
        };
        log_failure(decoded, idx, &type_name)
    }
}

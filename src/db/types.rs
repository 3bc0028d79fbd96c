//! Postgres type mappings.
//!
//! This module converts rows returned by the driver into `Value` cells.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Category decoders handle the actual value extraction
//!
//! Types outside every category (intervals, arrays, network types, ...) are
//! cast to `text` in generated statements, see [`decodes_natively`]. Enums
//! decode from their label. Anything else fails loudly rather than turning
//! into `NULL`.

use crate::error::{DbError, DbResult};
use crate::models::{Frame, Record, Value};
use chrono::{NaiveDateTime, NaiveTime};
use sqlx::postgres::{PgRow, PgTypeKind};
use sqlx::{Column, Decode, Postgres, Row, Type, TypeInfo};

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
    Timestamp,
    NaiveTimestamp,
    Date,
    Time,
    Binary,
    Json,
    Uuid,
    Unknown,
}

/// Classify a Postgres type name into a logical category.
///
/// Accepts both driver names (`INT4`, `VARCHAR`) and catalog names as
/// printed by `format_type` (`integer`, `character varying`).
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.to_lowercase().as_str() {
        "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "serial"
        | "bigserial" | "smallserial" => TypeCategory::Integer,
        "float4" | "float8" | "real" | "double precision" => TypeCategory::Float,
        "numeric" | "decimal" => TypeCategory::Decimal,
        "bool" | "boolean" => TypeCategory::Boolean,
        "text" | "varchar" | "character varying" | "bpchar" | "char" | "character"
        | "name" | "citext" | "unknown" => TypeCategory::Text,
        "timestamptz" | "timestamp with time zone" => TypeCategory::Timestamp,
        "timestamp" | "timestamp without time zone" => TypeCategory::NaiveTimestamp,
        "date" => TypeCategory::Date,
        "time" | "time without time zone" => TypeCategory::Time,
        "bytea" => TypeCategory::Binary,
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        _ => TypeCategory::Unknown,
    }
}

/// Whether values of this type decode without a `::text` cast.
pub fn decodes_natively(type_name: &str) -> bool {
    categorize_type(type_name) != TypeCategory::Unknown
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Column names of a row, in result order.
pub fn column_names(row: &PgRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Decode every cell of a row.
pub fn decode_row(row: &PgRow) -> DbResult<Vec<Value>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let type_info = col.type_info();
            let category = categorize_type(type_info.name());
            if category == TypeCategory::Unknown {
                return decode_fallback(row, idx, col.name(), type_info);
            }
            decode_column(row, idx, type_info.name(), category)
        })
        .collect()
}

/// Decode a row into a column to value mapping.
pub fn decode_record(row: &PgRow) -> DbResult<Record> {
    Ok(column_names(row).into_iter().zip(decode_row(row)?).collect())
}

/// Collect rows into a frame. With no rows there is no column information,
/// so the frame has no columns either.
pub fn rows_to_frame(rows: &[PgRow]) -> DbResult<Frame> {
    let Some(first) = rows.first() else {
        return Ok(Frame::default());
    };

    let mut frame = Frame::new(column_names(first));
    for row in rows {
        frame.push_row(decode_row(row)?)?;
    }
    Ok(frame)
}

/// Decode a nullable cell and wrap it with `wrap`.
fn get<'r, T>(row: &'r PgRow, idx: usize, wrap: impl FnOnce(T) -> Value) -> DbResult<Value>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    Ok(row
        .try_get::<Option<T>, _>(idx)?
        .map(wrap)
        .unwrap_or(Value::Null))
}

fn decode_column(
    row: &PgRow,
    idx: usize,
    type_name: &str,
    category: TypeCategory,
) -> DbResult<Value> {
    match category {
        TypeCategory::Integer => decode_integer(row, idx, type_name),
        TypeCategory::Float => decode_float(row, idx, type_name),
        // NaN and values beyond 28 digits of precision fail here
        TypeCategory::Decimal => get(row, idx, Value::Decimal),
        TypeCategory::Boolean => get(row, idx, Value::Bool),
        TypeCategory::Text => get(row, idx, Value::Text),
        TypeCategory::Timestamp => get(row, idx, Value::Timestamp),
        TypeCategory::NaiveTimestamp => {
            get(row, idx, |v: NaiveDateTime| Value::Timestamp(v.and_utc()))
        }
        TypeCategory::Date => get(row, idx, Value::Date),
        TypeCategory::Time => get(row, idx, |v: NaiveTime| Value::Text(v.to_string())),
        TypeCategory::Binary => get(row, idx, Value::Bytes),
        TypeCategory::Json => get(row, idx, Value::Json),
        TypeCategory::Uuid => get(row, idx, |v: uuid::Uuid| Value::Text(v.to_string())),
        TypeCategory::Unknown => Err(DbError::internal(format!(
            "No decoder for column type {type_name}"
        ))),
    }
}

fn decode_integer(row: &PgRow, idx: usize, type_name: &str) -> DbResult<Value> {
    let decoded = match type_name.to_uppercase().as_str() {
        "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(i64::from),
        "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(i64::from),
        _ => row.try_get::<Option<i64>, _>(idx)?,
    };
    Ok(decoded.map(Value::Int).unwrap_or(Value::Null))
}

fn decode_float(row: &PgRow, idx: usize, type_name: &str) -> DbResult<Value> {
    let decoded = match type_name.to_uppercase().as_str() {
        "FLOAT4" | "REAL" => row.try_get::<Option<f32>, _>(idx)?.map(f64::from),
        _ => row.try_get::<Option<f64>, _>(idx)?,
    };
    Ok(decoded.map(Value::Float).unwrap_or(Value::Null))
}

/// Enums arrive as their label. Every other type needs a `::text` cast in
/// the query.
fn decode_fallback(
    row: &PgRow,
    idx: usize,
    column: &str,
    type_info: &sqlx::postgres::PgTypeInfo,
) -> DbResult<Value> {
    if matches!(type_info.kind(), PgTypeKind::Enum(_)) {
        return Ok(row
            .try_get_unchecked::<Option<String>, _>(idx)?
            .map(Value::Text)
            .unwrap_or(Value::Null));
    }
    Err(DbError::schema(
        format!(
            "Column '{column}' has type {}, which cannot be decoded; select it as {column}::text",
            type_info.name()
        ),
        column,
    ))
}

//! Parameter binding utilities for database queries.
//!
//! This module binds `Value`s to driver query objects. Generated statements
//! wrap each placeholder in a cast to the reflected column type, so the
//! bound Rust type only has to be castable to it.

use crate::models::Value;
use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::types::Json;

/// Bind a value to a PostgreSQL query.
pub(crate) fn bind_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Decimal(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Timestamp(v) => query.bind(*v),
        Value::Date(v) => query.bind(*v),
        Value::Json(v) => query.bind(Json(v)),
        Value::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind all values in order.
pub(crate) fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = bind_param(query, param);
    }
    query
}

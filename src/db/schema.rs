//! Schema reflection module.
//!
//! This module reads the live catalog of one schema and builds the
//! `TableDescriptor` registry a `Database` handle works from.
//!
//! # Architecture
//!
//! SQL queries are kept in the `queries` submodule. Reflection runs once, on
//! a single connection, when the handle is constructed.

use crate::error::DbResult;
use crate::models::{ColumnDefinition, IndexInfo, TableDescriptor};
use sqlx::{PgConnection, Row};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Reflected tables keyed by table name.
pub type TableRegistry = BTreeMap<String, TableDescriptor>;

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Reflect every base table of `schema` that has a primary key.
    ///
    /// Tables without a primary key cannot be addressed as rows and are left
    /// out of the registry.
    pub async fn reflect(conn: &mut PgConnection, schema: &str) -> DbResult<TableRegistry> {
        let table_names = Self::list_tables(conn, schema).await?;
        if table_names.is_empty() {
            warn!(schema = schema, "Schema has no tables to reflect");
        }

        let mut registry = TableRegistry::new();
        for name in table_names {
            let table = Self::describe_table(conn, schema, &name).await?;
            if table.primary_key.is_empty() {
                debug!(
                    schema = schema,
                    table = %name,
                    "Skipping table without primary key"
                );
                continue;
            }
            registry.insert(name, table);
        }

        debug!(
            schema = schema,
            count = registry.len(),
            "Reflected PostgreSQL tables"
        );
        Ok(registry)
    }

    /// List base table names in a schema.
    pub async fn list_tables(conn: &mut PgConnection, schema: &str) -> DbResult<Vec<String>> {
        let rows = sqlx::query(queries::LIST_TABLES)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("table_name"))
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// Describe one table's columns, primary key and indexes.
    pub async fn describe_table(
        conn: &mut PgConnection,
        schema: &str,
        table_name: &str,
    ) -> DbResult<TableDescriptor> {
        let columns = fetch_columns(conn, schema, table_name).await?;
        let indexes = fetch_indexes(conn, schema, table_name).await?;

        let table = columns
            .into_iter()
            .fold(TableDescriptor::new(table_name, schema), |t, c| {
                t.with_column(c)
            })
            .with_indexes(indexes);
        Ok(table)
    }
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub const LIST_TABLES: &str = r#"
        SELECT t.table_name::text AS table_name
        FROM information_schema.tables t
        WHERE t.table_schema = $1
        AND t.table_type = 'BASE TABLE'
        ORDER BY t.table_name
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name::text AS column_name,
            format_type(a.atttypid, a.atttypmod) AS column_type,
            format_type(a.atttypid, -1) AS base_type,
            c.is_nullable::text AS is_nullable,
            c.column_default::text AS column_default,
            CASE WHEN pk.column_name IS NOT NULL THEN true ELSE false END AS is_primary_key
        FROM information_schema.columns c
        JOIN pg_class t ON t.relname = c.table_name
        JOIN pg_namespace n ON n.oid = t.relnamespace AND n.nspname = c.table_schema
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name
        LEFT JOIN (
            SELECT kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.table_name = $1
            AND tc.table_schema = $2
            AND tc.constraint_type = 'PRIMARY KEY'
        ) pk ON c.column_name = pk.column_name
        WHERE c.table_name = $1 AND c.table_schema = $2
        ORDER BY c.ordinal_position
        "#;

    pub const DESCRIBE_INDEXES: &str = r#"
        SELECT
            i.relname::text AS index_name,
            array_agg(a.attname::text ORDER BY array_position(ix.indkey::int2[], a.attnum)) AS column_names,
            ix.indisunique AS is_unique,
            ix.indisprimary AS is_primary
        FROM pg_index ix
        JOIN pg_class i ON i.oid = ix.indexrelid
        JOIN pg_class t ON t.oid = ix.indrelid
        JOIN pg_namespace n ON n.oid = t.relnamespace
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
        WHERE t.relname = $1 AND n.nspname = $2
        GROUP BY i.relname, ix.indisunique, ix.indisprimary
        ORDER BY i.relname
        "#;
}

async fn fetch_columns(
    conn: &mut PgConnection,
    schema: &str,
    table_name: &str,
) -> DbResult<Vec<ColumnDefinition>> {
    let rows = sqlx::query(queries::DESCRIBE_COLUMNS)
        .bind(table_name)
        .bind(schema)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let name: String = row.get("column_name");
            let column_type: String = row.get("column_type");
            let base_type: String = row.get("base_type");
            let nullable: String = row.get("is_nullable");
            let default_value: Option<String> = row.try_get("column_default").ok().flatten();
            let is_pk: bool = row.get("is_primary_key");

            let col = ColumnDefinition::new(&name, &column_type, nullable == "YES")
                .with_primary_key(is_pk)
                .with_base_type(base_type);
            match default_value {
                Some(def) => col.with_default(def),
                None => col,
            }
        })
        .collect())
}

async fn fetch_indexes(
    conn: &mut PgConnection,
    schema: &str,
    table_name: &str,
) -> DbResult<Vec<IndexInfo>> {
    let rows = sqlx::query(queries::DESCRIBE_INDEXES)
        .bind(table_name)
        .bind(schema)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let name: String = row.get("index_name");
            let columns: Vec<String> = row.get("column_names");
            let is_unique: bool = row.get("is_unique");
            let is_primary: bool = row.get("is_primary");

            if columns.is_empty() {
                None
            } else {
                Some(
                    IndexInfo::new(name, columns)
                        .with_unique(is_unique)
                        .with_primary(is_primary),
                )
            }
        })
        .collect())
}

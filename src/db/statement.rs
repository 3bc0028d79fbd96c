//! SQL statement rendering.
//!
//! Statements are generated from reflected table descriptors. Identifiers
//! are always quoted, and every bound placeholder is cast to the base type
//! of the column it targets.

use crate::db::types::decodes_natively;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDefinition, Record, TableDescriptor, Value};

/// Default number of values per `IN (...)` query.
pub const DEFAULT_IN_CLAUSE_CHUNK_SIZE: usize = 200;

/// Default number of rows per bulk insert chunk.
pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 500;

/// Most bind parameters one Postgres statement can carry.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// A statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// A value that can be written literally inside an `IN (...)` list.
///
/// Text is wrapped in single quotes and NOT escaped: callers must not pass
/// values containing quote characters. Numbers are written bare.
pub trait InClauseLiteral {
    fn render(&self) -> String;
}

impl InClauseLiteral for str {
    fn render(&self) -> String {
        format!("'{}'", self)
    }
}

impl InClauseLiteral for String {
    fn render(&self) -> String {
        self.as_str().render()
    }
}

impl<T: InClauseLiteral + ?Sized> InClauseLiteral for &T {
    fn render(&self) -> String {
        (**self).render()
    }
}

macro_rules! impl_numeric_literal {
    ($($t:ty),+ $(,)?) => {
        $(
            impl InClauseLiteral for $t {
                fn render(&self) -> String {
                    self.to_string()
                }
            }
        )+
    };
}

impl_numeric_literal!(i16, i32, i64, u16, u32, u64, f32, f64);

/// Render one membership query.
pub fn in_clause_query<V: InClauseLiteral>(
    schema: &str,
    table: &str,
    column: &str,
    values: &[V],
) -> String {
    render_in_clause("*", schema, table, column, values)
}

/// Membership query over a reflected table. Columns without a native
/// decoder are selected as text.
pub fn in_clause_select<V: InClauseLiteral>(
    table: &TableDescriptor,
    column: &str,
    values: &[V],
) -> String {
    let columns: Vec<&ColumnDefinition> = table.columns.iter().collect();
    render_in_clause(
        &output_list(&columns),
        &table.schema_name,
        &table.table_name,
        column,
        values,
    )
}

/// Render one membership query per chunk of `chunk_size` values, in order.
pub fn chunked_in_clause_queries<V: InClauseLiteral>(
    table: &TableDescriptor,
    column: &str,
    values: &[V],
    chunk_size: usize,
) -> DbResult<Vec<String>> {
    check_chunk_size(chunk_size)?;
    Ok(values
        .chunks(chunk_size)
        .map(|chunk| in_clause_select(table, column, chunk))
        .collect())
}

fn render_in_clause<V: InClauseLiteral>(
    select_list: &str,
    schema: &str,
    table: &str,
    column: &str,
    values: &[V],
) -> String {
    let list = values
        .iter()
        .map(InClauseLiteral::render)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {} WHERE {} IN ({});",
        select_list,
        qualified_name(schema, table),
        quote_ident(column),
        list
    )
}

pub(crate) fn check_chunk_size(chunk_size: usize) -> DbResult<()> {
    if chunk_size == 0 {
        return Err(DbError::invalid_input("chunk_size must be greater than 0"));
    }
    Ok(())
}

/// Look up every named column, failing on the first unknown one.
pub fn resolve_columns<'t, S: AsRef<str>>(
    table: &'t TableDescriptor,
    names: &[S],
) -> DbResult<Vec<&'t ColumnDefinition>> {
    names
        .iter()
        .map(|name| {
            table
                .column(name.as_ref())
                .ok_or_else(|| DbError::unknown_column(&table.table_name, name.as_ref()))
        })
        .collect()
}

/// Positional placeholder generator.
struct Placeholders {
    next: usize,
}

impl Placeholders {
    fn new() -> Self {
        Self { next: 1 }
    }

    /// `CAST($n AS <base type>)`. The type modifier is left off so an
    /// over-length value is rejected by the column instead of truncated.
    fn cast(&mut self, column: &ColumnDefinition) -> String {
        let p = format!("CAST(${} AS {})", self.next, column.base_type);
        self.next += 1;
        p
    }
}

fn column_list(columns: &[&ColumnDefinition]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Output columns for generated SELECT and RETURNING lists.
fn output_list(columns: &[&ColumnDefinition]) -> String {
    columns
        .iter()
        .map(|c| {
            let ident = quote_ident(&c.name);
            if decodes_natively(&c.base_type) {
                ident
            } else {
                format!("{ident}::text AS {ident}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `SELECT <columns> FROM <table> [WHERE <filters>]`
///
/// Filters form an equality conjunction; a `Null` filter matches with
/// `IS NULL`. An empty column list selects every column in table order.
pub fn select(
    table: &TableDescriptor,
    filters: &Record,
    columns: &[String],
) -> DbResult<Statement> {
    let output = if columns.is_empty() {
        table.columns.iter().collect::<Vec<_>>()
    } else {
        resolve_columns(table, columns)?
    };

    let mut sql = format!(
        "SELECT {} FROM {}",
        output_list(&output),
        qualified_name(&table.schema_name, &table.table_name)
    );

    let mut params = Vec::new();
    let mut placeholders = Placeholders::new();
    let mut conditions = Vec::with_capacity(filters.len());
    for (name, value) in filters {
        let column = table
            .column(name)
            .ok_or_else(|| DbError::unknown_column(&table.table_name, name))?;
        if value.is_null() {
            conditions.push(format!("{} IS NULL", quote_ident(name)));
        } else {
            conditions.push(format!(
                "{} = {}",
                quote_ident(name),
                placeholders.cast(column)
            ));
            params.push(value.clone());
        }
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    Ok(Statement { sql, params })
}

/// `INSERT INTO <table> (...) VALUES (...) [RETURNING ...]`
pub fn insert(table: &TableDescriptor, row: &Record, returning: &[String]) -> DbResult<Statement> {
    let target = qualified_name(&table.schema_name, &table.table_name);
    let names: Vec<&String> = row.keys().collect();
    let columns = resolve_columns(table, &names)?;

    let mut sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", target)
    } else {
        let mut placeholders = Placeholders::new();
        let values = columns
            .iter()
            .map(|c| placeholders.cast(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target,
            column_list(&columns),
            values
        )
    };

    if !returning.is_empty() {
        let returned = resolve_columns(table, returning)?;
        sql.push_str(" RETURNING ");
        sql.push_str(&output_list(&returned));
    }

    Ok(Statement {
        sql,
        params: row.values().cloned().collect(),
    })
}

/// Multi-row `INSERT ... ON CONFLICT DO NOTHING`.
///
/// Every row must have one value per column.
pub fn insert_ignore(
    table: &TableDescriptor,
    columns: &[String],
    rows: &[Vec<Value>],
) -> DbResult<Statement> {
    if columns.is_empty() {
        return Err(DbError::invalid_input(
            "Bulk insert needs at least one column",
        ));
    }
    if rows.is_empty() {
        return Err(DbError::invalid_input("Bulk insert needs at least one row"));
    }
    if rows.len() * columns.len() > MAX_BIND_PARAMS {
        return Err(DbError::invalid_input(format!(
            "{} rows of {} columns exceed the {} parameter limit of one statement",
            rows.len(),
            columns.len(),
            MAX_BIND_PARAMS
        )));
    }
    let resolved = resolve_columns(table, columns)?;

    let mut placeholders = Placeholders::new();
    let mut params = Vec::with_capacity(rows.len() * columns.len());
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != resolved.len() {
            return Err(DbError::invalid_input(format!(
                "Row has {} values but {} columns were given",
                row.len(),
                resolved.len()
            )));
        }
        let tuple = resolved
            .iter()
            .map(|c| placeholders.cast(c))
            .collect::<Vec<_>>()
            .join(", ");
        tuples.push(format!("({})", tuple));
        params.extend(row.iter().cloned());
    }

    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT DO NOTHING",
            qualified_name(&table.schema_name, &table.table_name),
            column_list(&resolved),
            tuples.join(", ")
        ),
        params,
    })
}

/// Split rows into as many `insert_ignore` statements as the bind
/// parameter limit requires, preserving row order.
pub fn insert_ignore_batches(
    table: &TableDescriptor,
    columns: &[String],
    rows: &[Vec<Value>],
) -> DbResult<Vec<Statement>> {
    if columns.is_empty() {
        return Err(DbError::invalid_input(
            "Bulk insert needs at least one column",
        ));
    }
    if columns.len() > MAX_BIND_PARAMS {
        return Err(DbError::invalid_input(format!(
            "Bulk insert of {} columns exceeds the {} parameter limit",
            columns.len(),
            MAX_BIND_PARAMS
        )));
    }
    let rows_per_statement = MAX_BIND_PARAMS / columns.len();
    rows.chunks(rows_per_statement)
        .map(|batch| insert_ignore(table, columns, batch))
        .collect()
}

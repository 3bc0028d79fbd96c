//! The `Database` handle.
//!
//! A handle owns the connect options of one instance, the schema name, and
//! the table registry reflected when it was built. It keeps no pool: every
//! operation opens its own connection inside a scoped session and closes it
//! when the session ends.

use crate::db::schema::{SchemaInspector, TableRegistry};
use crate::db::session::{Session, SessionGuard};
use crate::db::statement::{self, InClauseLiteral, Statement, check_chunk_size};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionParams, Frame, QueryOutput, Record, TableDescriptor, Value};
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Instrument, Span, debug, error, info, warn};

/// Behaviour switches for a handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Log the reflected tables at construction.
    pub verbose: bool,
    /// Log every executed statement at `info` instead of `debug`.
    pub echo: bool,
}

impl DatabaseOptions {
    pub fn new(verbose: bool, echo: bool) -> Self {
        Self { verbose, echo }
    }
}

pub struct Database {
    params: ConnectionParams,
    connect_options: PgConnectOptions,
    tables: TableRegistry,
    options: DatabaseOptions,
    span: Span,
    open_sessions: Arc<AtomicUsize>,
}

impl Database {
    /// Connect, reflect the schema, and return a ready handle.
    ///
    /// The connection used for reflection is closed before returning. Any
    /// failure here is final; no partial handle is produced.
    pub async fn connect(
        params: ConnectionParams,
        options: DatabaseOptions,
        span: Span,
    ) -> DbResult<Self> {
        let connect_options = params.connect_options()?;

        let tables = async {
            info!(
                database = %params.database,
                schema = %params.schema,
                host = %params.host,
                "Connecting to database"
            );
            let mut conn = PgConnection::connect_with(&connect_options).await?;
            let tables = SchemaInspector::reflect(&mut conn, &params.schema).await;
            close_connection(conn).await;
            tables
        }
        .instrument(span.clone())
        .await?;

        let db = Self {
            params,
            connect_options,
            tables,
            options,
            span,
            open_sessions: Arc::new(AtomicUsize::new(0)),
        };

        if db.options.verbose {
            db.span.in_scope(|| {
                info!(
                    "Database {} has the following tables:",
                    db.params.database
                );
                for name in db.tables.keys() {
                    info!("{}", name);
                }
            });
        }

        Ok(db)
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn schema(&self) -> &str {
        &self.params.schema
    }

    pub fn options(&self) -> DatabaseOptions {
        self.options
    }

    /// Names of all reflected tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// All reflected table descriptors, sorted by name.
    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.values()
    }

    /// Number of sessions currently open on this handle.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Look up a reflected table.
    pub fn table(&self, table_name: &str) -> DbResult<&TableDescriptor> {
        self.tables
            .get(table_name)
            .ok_or_else(|| DbError::unknown_table(table_name, &self.params.schema))
    }

    /// Run `block` inside one transaction on a fresh connection.
    ///
    /// Commits when the block returns `Ok`. On `Err` the transaction is
    /// rolled back and the block's error is returned. The connection is
    /// closed in both cases.
    pub async fn session_scope<T, F>(&self, block: F) -> DbResult<T>
    where
        F: AsyncFnOnce(&mut Session<'_>) -> DbResult<T>,
    {
        async {
            let _guard = SessionGuard::new(&self.open_sessions);
            let mut conn = PgConnection::connect_with(&self.connect_options).await?;
            let outcome = run_in_transaction(&mut conn, self.options.echo, block).await;
            close_connection(conn).await;
            outcome
        }
        .instrument(self.span.clone())
        .await
    }

    /// Run raw SQL with positional (`$1`, `$2`, ...) parameters.
    pub async fn execute_sql(&self, sql: &str, params: &[Value]) -> DbResult<QueryOutput> {
        let frame = self
            .session_scope(async |session| session.fetch_frame(sql, params).await)
            .await?;
        Ok(QueryOutput::from_frame(frame))
    }

    /// Render the membership query for one list of values.
    pub fn build_in_clause_query<V: InClauseLiteral>(
        &self,
        table_name: &str,
        column: &str,
        values: &[V],
    ) -> DbResult<String> {
        let table = self.table(table_name)?;
        statement::resolve_columns(table, &[column])?;
        Ok(statement::in_clause_query(
            &table.schema_name,
            &table.table_name,
            column,
            values,
        ))
    }

    /// Select rows whose `column` is in `values`, `chunk_size` values per
    /// query. Results are concatenated in chunk order.
    pub async fn run_in_clause_query<V: InClauseLiteral>(
        &self,
        table_name: &str,
        column: &str,
        values: &[V],
        chunk_size: usize,
    ) -> DbResult<Frame> {
        let table = self.table(table_name)?;
        statement::resolve_columns(table, &[column])?;
        let queries = statement::chunked_in_clause_queries(table, column, values, chunk_size)?;

        debug!(
            table = table_name,
            values = values.len(),
            chunks = queries.len(),
            "Running chunked IN query"
        );

        let mut result = Frame::default();
        for sql in &queries {
            let frame = self
                .session_scope(async |session| session.fetch_frame(sql, &[]).await)
                .await?;
            result.extend(frame)?;
        }
        Ok(result)
    }

    /// Select rows matching every filter, returning the given columns (all
    /// columns when empty).
    pub async fn select_query(
        &self,
        table_name: &str,
        filters: &Record,
        columns: &[String],
    ) -> DbResult<QueryOutput> {
        let table = self.table(table_name)?;
        let stmt = statement::select(table, filters, columns)?;
        let frame = self
            .session_scope(async |session| session.fetch_frame(&stmt.sql, &stmt.params).await)
            .await?;
        Ok(QueryOutput::from_frame(frame))
    }

    /// Every row and column of a table.
    pub async fn full_table(&self, table_name: &str) -> DbResult<QueryOutput> {
        self.select_query(table_name, &Record::new(), &[]).await
    }

    /// Insert `row` unless an identical row exists.
    ///
    /// - no match: inserts; returns the `feedback` columns of the new row,
    ///   or `None` when no feedback columns were asked for
    /// - one match: inserts nothing and returns that row's `feedback`
    ///   columns (all columns when `feedback` is empty)
    /// - several matches: `DuplicateMatch`, nothing inserted
    pub async fn insert_row(
        &self,
        table_name: &str,
        row: &Record,
        feedback: &[String],
    ) -> DbResult<Option<Record>> {
        let table = self.table(table_name)?;
        let lookup = statement::select(table, row, &[])?;
        let insert = statement::insert(table, row, feedback)?;

        self.session_scope(async |session| {
            insert_or_fetch(session, table_name, &lookup, &insert, feedback).await
        })
        .await
    }

    /// Bulk insert a frame, silently skipping rows that violate a unique
    /// constraint.
    ///
    /// Null-like cells are normalized to `Null` first. Each chunk of
    /// `chunk_size` rows runs in its own session, split into several
    /// statements when it would exceed the bind parameter limit.
    pub async fn pg_insert_ignore_chunks(
        &self,
        table_name: &str,
        frame: &Frame,
        chunk_size: usize,
        verbose: bool,
    ) -> DbResult<()> {
        check_chunk_size(chunk_size)?;
        let table = self.table(table_name)?;
        if frame.len() == 0 {
            return Ok(());
        }
        statement::resolve_columns(table, frame.columns())?;

        let mut batch = frame.clone();
        batch.normalize_nulls();

        let mut inserted = 0;
        for chunk in batch.rows().chunks(chunk_size) {
            if verbose {
                self.span.in_scope(|| {
                    info!(
                        "Inserting records: {} through {}",
                        inserted + 1,
                        inserted + chunk.len()
                    )
                });
            }
            let statements = statement::insert_ignore_batches(table, batch.columns(), chunk)?;
            self.session_scope(async |session| execute_all(session, &statements).await)
                .await?;
            inserted += chunk.len();
        }
        Ok(())
    }
}

async fn execute_all(session: &mut Session<'_>, statements: &[Statement]) -> DbResult<u64> {
    let mut affected = 0;
    for statement in statements {
        affected += session.execute_statement(statement).await?;
    }
    Ok(affected)
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("params", &self.params)
            .field("tables", &self.tables.len())
            .field("options", &self.options)
            .field("open_sessions", &self.open_sessions())
            .finish()
    }
}

async fn run_in_transaction<T, F>(conn: &mut PgConnection, echo: bool, block: F) -> DbResult<T>
where
    F: AsyncFnOnce(&mut Session<'_>) -> DbResult<T>,
{
    let tx = conn.begin().await?;
    let mut session = Session::new(tx, echo);

    match block(&mut session).await {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

async fn insert_or_fetch(
    session: &mut Session<'_>,
    table_name: &str,
    lookup: &Statement,
    insert: &Statement,
    feedback: &[String],
) -> DbResult<Option<Record>> {
    let existing = session.fetch_records(lookup).await?;

    match existing.as_slice() {
        [] if feedback.is_empty() => {
            session.execute_statement(insert).await?;
            Ok(None)
        }
        [] => {
            // RETURNING fills server-generated values such as serial ids
            let mut returned = session.fetch_records(insert).await?;
            returned
                .pop()
                .map(Some)
                .ok_or_else(|| DbError::internal("INSERT ... RETURNING produced no row"))
        }
        [found] => Ok(Some(project(found, feedback))),
        matches => {
            error!(
                table = table_name,
                matches = matches.len(),
                "there is more than 1 record match for the supplied filter."
            );
            Err(DbError::duplicate_match(table_name, matches.len()))
        }
    }
}

/// Keep only `columns` of a record; all of it when `columns` is empty.
fn project(record: &Record, columns: &[String]) -> Record {
    if columns.is_empty() {
        return record.clone();
    }
    columns
        .iter()
        .filter_map(|c| record.get(c).map(|v| (c.clone(), v.clone())))
        .collect()
}

async fn close_connection(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close connection cleanly");
    }
}

//! Transaction-scoped sessions.
//!
//! A `Session` wraps one open transaction on a connection that belongs to a
//! single operation. `Database::session_scope` owns the lifecycle: it opens
//! the connection, begins, hands the session to the caller's block, then
//! commits or rolls back and closes the connection.

use crate::db::params::bind_params;
use crate::db::statement::Statement;
use crate::db::types::{decode_record, rows_to_frame};
use crate::error::{DbError, DbResult};
use crate::models::{Frame, Record, Value};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// One open transaction.
pub struct Session<'c> {
    tx: Transaction<'c, Postgres>,
    echo: bool,
    statements: usize,
}

impl<'c> Session<'c> {
    pub(crate) fn new(tx: Transaction<'c, Postgres>, echo: bool) -> Self {
        Self {
            tx,
            echo,
            statements: 0,
        }
    }

    /// Number of statements executed in this session so far.
    pub fn statement_count(&self) -> usize {
        self.statements
    }

    /// Run a statement and return all rows.
    pub async fn fetch_rows(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<PgRow>> {
        self.log(sql, params.len());
        let query = bind_params(sqlx::query(sql), params);
        let rows = query.fetch_all(&mut *self.tx).await?;
        Ok(rows)
    }

    /// Run a statement and collect its rows into a frame.
    pub async fn fetch_frame(&mut self, sql: &str, params: &[Value]) -> DbResult<Frame> {
        let rows = self.fetch_rows(sql, params).await?;
        rows_to_frame(&rows)
    }

    /// Run a generated statement and return one record per row.
    pub async fn fetch_records(&mut self, statement: &Statement) -> DbResult<Vec<Record>> {
        let rows = self.fetch_rows(&statement.sql, &statement.params).await?;
        rows.iter().map(decode_record).collect()
    }

    /// Run a statement for its effect and return the affected row count.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        self.log(sql, params.len());
        let query = bind_params(sqlx::query(sql), params);
        let result = query.execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    /// Run a generated statement for its effect.
    pub async fn execute_statement(&mut self, statement: &Statement) -> DbResult<u64> {
        self.execute(&statement.sql, &statement.params).await
    }

    pub(crate) async fn commit(self) -> DbResult<()> {
        self.tx.commit().await.map_err(DbError::from)
    }

    pub(crate) async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await.map_err(DbError::from)
    }

    fn log(&mut self, sql: &str, params: usize) {
        self.statements += 1;
        if self.echo {
            info!(sql = %sql, params = params, "Executing statement");
        } else {
            debug!(sql = %sql, params = params, "Executing statement");
        }
    }
}

/// Counts sessions that are open. Decrements on drop, so every exit path
/// of a scope releases its slot.
#[derive(Debug)]
pub(crate) struct SessionGuard {
    open: Arc<AtomicUsize>,
}

impl SessionGuard {
    pub(crate) fn new(open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { open: open.clone() }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_guard_releases_on_drop() {
        let open = Arc::new(AtomicUsize::new(0));
        {
            let _a = SessionGuard::new(&open);
            let _b = SessionGuard::new(&open);
            assert_eq!(open.load(Ordering::SeqCst), 2);
        }
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_session_guard_releases_on_panic_unwind() {
        let open = Arc::new(AtomicUsize::new(0));
        let result = std::panic::catch_unwind(|| {
            let _guard = SessionGuard::new(&open);
            panic!("block failed");
        });
        assert!(result.is_err());
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }
}

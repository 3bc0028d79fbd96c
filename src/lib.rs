//! pg-tablekit library
//!
//! A thin data-access layer over PostgreSQL: named-instance connection
//! resolution, schema reflection, transaction-scoped sessions, and a small
//! set of table-level read and write operations returning tabular results.

pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod models;

pub use config::Config;
pub use db::{ConnectorFactory, Database, DatabaseOptions, Session};
pub use error::{DbError, DbResult};
pub use models::{ConnectionParams, Frame, QueryOutput, Record, Value};

//! Database access layer.
//!
//! This module provides:
//! - The connector factory for named instances
//! - The `Database` handle and its scoped sessions
//! - Schema reflection
//! - Statement building and parameter binding
//! - Row decoding

pub mod database;
pub mod factory;
pub(crate) mod params;
pub mod schema;
pub mod session;
pub mod statement;
pub mod types;

pub use database::{Database, DatabaseOptions};
pub use factory::{ConnectorFactory, SUPPORTED_INSTANCES};
pub use schema::{SchemaInspector, TableRegistry};
pub use session::Session;
pub use statement::{
    DEFAULT_IN_CLAUSE_CHUNK_SIZE, DEFAULT_INSERT_CHUNK_SIZE, InClauseLiteral, MAX_BIND_PARAMS,
    Statement,
};

//! Data models for pg-tablekit.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod frame;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use connection::{ConnectionParams, Driver, REQUIRED_KEYS};
pub use frame::{Frame, QueryOutput};
pub use schema::{ColumnDefinition, IndexInfo, TableDescriptor};
pub use value::{NULL_SENTINELS, Record, Value};

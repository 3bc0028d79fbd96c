//! Configuration handling for the pg-tablekit binary.
//!
//! Every flag can also be set through a `TABLEKIT_*` environment variable.

use crate::db::{DEFAULT_IN_CLAUSE_CHUNK_SIZE, DEFAULT_INSERT_CHUNK_SIZE};
use crate::format::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_INSTANCE: &str = "LOCAL_DB";
pub const DEFAULT_SCHEMA: &str = "public";

/// Where the binary gets its connection parameters from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    /// A named instance resolved through `<NAME>_*` keys.
    Instance(String),
    /// An explicit URL plus schema.
    Url { url: String, schema: String },
}

/// Configuration for pg-tablekit.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pg-tablekit",
    about = "Reflect a PostgreSQL schema and read or write its tables",
    version,
    author
)]
pub struct Config {
    /// Named instance to connect to (ANALYTICS_DB, LOCAL_DB)
    #[arg(
        short,
        long,
        default_value = DEFAULT_INSTANCE,
        env = "TABLEKIT_INSTANCE"
    )]
    pub instance: String,

    /// Connection URL; overrides --instance
    #[arg(long, value_name = "URL", env = "TABLEKIT_URL")]
    pub url: Option<String>,

    /// Schema to reflect when connecting with --url
    #[arg(long, default_value = DEFAULT_SCHEMA, env = "TABLEKIT_SCHEMA")]
    pub schema: String,

    /// Log the reflected tables and bulk insert progress
    #[arg(short, long)]
    pub verbose: bool,

    /// Log every executed statement at info level
    #[arg(long)]
    pub echo: bool,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "TABLEKIT_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "TABLEKIT_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List reflected tables
    Tables,

    /// Show a table's columns and indexes
    Describe { table: String },

    /// Run raw SQL with positional parameters ($1, $2, ...)
    Sql {
        sql: String,
        /// Parameter literal; repeat in placeholder order
        #[arg(short, long = "param", value_name = "VALUE")]
        params: Vec<String>,
    },

    /// Select rows by equality filters
    Select {
        table: String,
        /// Filter as column=value; repeatable
        #[arg(
            short,
            long = "filter",
            value_name = "COL=VALUE",
            value_parser = parse_assignment
        )]
        filters: Vec<(String, String)>,
        /// Column to return; repeatable, all columns when omitted
        #[arg(short, long = "column", value_name = "COL")]
        columns: Vec<String>,
    },

    /// Select rows whose column is in a list of values
    In {
        table: String,
        column: String,
        #[arg(required = true)]
        values: Vec<String>,
        /// Render values as numbers instead of quoted text
        #[arg(long)]
        numeric: bool,
        #[arg(long, default_value_t = DEFAULT_IN_CLAUSE_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Insert a row unless an identical one exists
    Insert {
        table: String,
        /// Value as column=value; repeatable
        #[arg(
            short,
            long = "set",
            value_name = "COL=VALUE",
            value_parser = parse_assignment,
            required = true
        )]
        values: Vec<(String, String)>,
        /// Column to report back; repeatable
        #[arg(long, value_name = "COL")]
        feedback: Vec<String>,
    },

    /// Bulk insert a JSON array of objects, skipping conflicting rows
    Import {
        table: String,
        file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_INSERT_CHUNK_SIZE)]
        chunk_size: usize,
    },
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolve where to connect. A URL takes precedence over an instance.
    pub fn connection_source(&self) -> ConnectionSource {
        match &self.url {
            Some(url) => ConnectionSource::Url {
                url: url.clone(),
                schema: self.schema.clone(),
            },
            None => ConnectionSource::Instance(self.instance.to_uppercase()),
        }
    }
}

/// Parse a `column=value` argument. The value may itself contain `=`.
pub fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (column, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COL=VALUE, got '{s}'"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("missing column name in '{s}'"));
    }
    Ok((column.to_string(), value.to_string()))
}

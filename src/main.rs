//! pg-tablekit - Main entry point.
//!
//! Connects to one PostgreSQL instance, reflects its schema, and runs a
//! single table-level command against it.

use clap::Parser;
use pg_tablekit::config::{Command, Config, ConnectionSource};
use pg_tablekit::format::{
    OutputFormat, describe_frame, format_frame, format_output, indexes_frame,
};
use pg_tablekit::{
    ConnectionParams, ConnectorFactory, Database, DatabaseOptions, DbError, DbResult, Frame,
    Record, Value,
};
use serde_json::{Map, Value as JsonValue};
use tracing::{error, info, info_span};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so results on stdout stay pipeable.
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn connect(config: &Config) -> DbResult<Database> {
    match config.connection_source() {
        ConnectionSource::Instance(name) => {
            ConnectorFactory::from_env()
                .get_connector(&name, config.verbose, config.echo)
                .await
        }
        ConnectionSource::Url { url, schema } => {
            let params = ConnectionParams::from_url(&url, schema)?;
            let span = info_span!("database", instance = "url");
            Database::connect(
                params,
                DatabaseOptions::new(config.verbose, config.echo),
                span,
            )
            .await
        }
    }
}

fn to_record<'a, I>(assignments: I) -> Record
where
    I: IntoIterator<Item = &'a (String, String)>,
{
    assignments
        .into_iter()
        .map(|(column, value)| (column.clone(), Value::parse_literal(value)))
        .collect()
}

async fn read_json_frame(path: &std::path::Path) -> DbResult<Frame> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DbError::invalid_input(format!("Cannot read {}: {e}", path.display())))?;
    let objects: Vec<Map<String, JsonValue>> = serde_json::from_str(&text).map_err(|e| {
        DbError::invalid_input(format!(
            "{} must hold a JSON array of objects: {e}",
            path.display()
        ))
    })?;
    let records: Vec<Record> = objects
        .into_iter()
        .map(|object| {
            object
                .into_iter()
                .map(|(column, value)| (column, Value::from(value)))
                .collect()
        })
        .collect();
    Ok(Frame::from_records(&records))
}

async fn run_in(
    db: &Database,
    table: &str,
    column: &str,
    values: &[String],
    numeric: bool,
    chunk_size: usize,
) -> DbResult<Frame> {
    if !numeric {
        return db.run_in_clause_query(table, column, values, chunk_size).await;
    }

    let invalid = |v: &String| DbError::invalid_input(format!("'{v}' is not a number"));
    match values.iter().map(|v| v.parse::<i64>()).collect::<Result<Vec<_>, _>>() {
        Ok(ints) => db.run_in_clause_query(table, column, &ints, chunk_size).await,
        Err(_) => {
            let floats = values
                .iter()
                .map(|v| {
                    v.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .ok_or_else(|| invalid(v))
                })
                .collect::<DbResult<Vec<f64>>>()?;
            db.run_in_clause_query(table, column, &floats, chunk_size)
                .await
        }
    }
}

async fn run(db: &Database, config: &Config) -> DbResult<String> {
    let format = config.format;
    match &config.command {
        Command::Tables => {
            let frame = Frame::from_fixed(
                ["table", "primary_key", "columns"],
                db.tables().map(|table| {
                    [
                        Value::Text(table.table_name.clone()),
                        Value::Text(table.primary_key.join(", ")),
                        Value::Int(table.columns.len() as i64),
                    ]
                }),
            );
            Ok(format_frame(&frame, format))
        }
        Command::Describe { table } => {
            let table = db.table(table)?;
            let columns = format_frame(&describe_frame(table), format);
            let indexes = format_frame(&indexes_frame(table), format);
            Ok(format!("{columns}\n\n{indexes}"))
        }
        Command::Sql { sql, params } => {
            let params: Vec<Value> = params.iter().map(|p| Value::parse_literal(p)).collect();
            let output = db.execute_sql(sql, &params).await?;
            Ok(format_output(&output, format))
        }
        Command::Select {
            table,
            filters,
            columns,
        } => {
            let output = db
                .select_query(table, &to_record(filters), columns)
                .await?;
            Ok(format_output(&output, format))
        }
        Command::In {
            table,
            column,
            values,
            numeric,
            chunk_size,
        } => {
            let frame = run_in(db, table, column, values, *numeric, *chunk_size).await?;
            Ok(format_frame(&frame, format))
        }
        Command::Insert {
            table,
            values,
            feedback,
        } => match db.insert_row(table, &to_record(values), feedback).await? {
            Some(record) => Ok(format_frame(&Frame::from_records(&[record]), format)),
            None if format == OutputFormat::Json => Ok("null".to_string()),
            None => Ok("Row inserted".to_string()),
        },
        Command::Import {
            table,
            file,
            chunk_size,
        } => {
            let frame = read_json_frame(file).await?;
            db.pg_insert_ignore_chunks(table, &frame, *chunk_size, config.verbose)
                .await?;
            Ok(format!("Processed {} records", frame.len()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // TABLEKIT_* values may come from .env
    dotenvy::dotenv().ok();

    let config = Config::parse();
    init_tracing(&config);

    info!("Starting pg-tablekit v{}", env!("CARGO_PKG_VERSION"));

    let result = match connect(&config).await {
        Ok(db) => run(&db, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {suggestion}");
            }
            Err(e.into())
        }
    }
}

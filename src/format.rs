//! Output formatting for query results.
//!
//! Renders frames and `QueryOutput` values as an ASCII table, a Markdown
//! table, or JSON.

use crate::models::{Frame, QueryOutput, TableDescriptor, Value};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII table format (like the psql CLI)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// JSON: records for tables, a bare value for scalars
    Json,
}

pub fn format_value(value: &Value) -> String {
    value.to_string()
}

fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::Decimal(_))
}

/// Render a query output in the requested format.
pub fn format_output(output: &QueryOutput, format: OutputFormat) -> String {
    match (output, format) {
        (QueryOutput::Empty, OutputFormat::Json) => "[]".to_string(),
        (QueryOutput::Empty, OutputFormat::Table) => "Empty set".to_string(),
        (QueryOutput::Empty, OutputFormat::Markdown) => "*Empty set*".to_string(),
        (QueryOutput::Scalar(value), OutputFormat::Json) => to_json(value),
        (QueryOutput::Scalar(value), _) => format_value(value),
        (QueryOutput::Table(frame), _) => format_frame(frame, format),
    }
}

/// Render a frame in the requested format.
pub fn format_frame(frame: &Frame, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_as_table(frame),
        OutputFormat::Markdown => format_as_markdown(frame),
        OutputFormat::Json => to_json(&frame.to_records()),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("\"<unserializable: {e}>\""))
}

pub fn format_as_table(frame: &Frame) -> String {
    if frame.columns().is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = frame.columns().iter().map(|c| c.width()).collect();
    for row in frame.rows() {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(format_value(value).width());
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    output.push_str(&separator);
    let header: String = frame
        .columns()
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", pad_center(col, *w)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in frame.rows() {
        let row_str: String = row
            .iter()
            .zip(&widths)
            .map(|(value, w)| {
                let formatted = format_value(value);
                if is_numeric(value) {
                    format!("| {} ", pad_left(&formatted, *w))
                } else {
                    format!("| {} ", pad_right(&formatted, *w))
                }
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&separator);

    let row_count = frame.len();
    let row_text = if row_count == 1 { "row" } else { "rows" };
    output.push_str(&format!("{} {} in set\n", row_count, row_text));

    output
}

pub fn format_as_markdown(frame: &Frame) -> String {
    if frame.columns().is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output = String::new();

    let header: String = frame
        .columns()
        .iter()
        .map(|c| format!("| {} ", c))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);

    let sep: String = frame.columns().iter().map(|_| "|---").collect::<String>() + "|\n";
    output.push_str(&sep);

    for row in frame.rows() {
        let row_str: String = row
            .iter()
            .map(|value| format!("| {} ", format_value(value).replace('|', "\\|")))
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&format!("\n*{} rows*", frame.len()));

    output
}

/// One row per column of a reflected table.
pub fn describe_frame(table: &TableDescriptor) -> Frame {
    Frame::from_fixed(
        ["column", "type", "nullable", "default", "primary_key"],
        table.columns.iter().map(|column| {
            [
                Value::Text(column.name.clone()),
                Value::Text(column.data_type.clone()),
                Value::Bool(column.nullable),
                column.default_value.clone().into(),
                Value::Bool(column.is_primary_key),
            ]
        }),
    )
}

/// One row per index of a reflected table.
pub fn indexes_frame(table: &TableDescriptor) -> Frame {
    Frame::from_fixed(
        ["index", "columns", "unique", "primary"],
        table.indexes.iter().map(|index| {
            [
                Value::Text(index.name.clone()),
                Value::Text(index.columns.join(", ")),
                Value::Bool(index.is_unique),
                Value::Bool(index.is_primary),
            ]
        }),
    )
}

// `format!` width specifiers count chars, not display columns.
fn pad_right(s: &str, width: usize) -> String {
    format!("{}{}", s, " ".repeat(width.saturating_sub(s.width())))
}

fn pad_left(s: &str, width: usize) -> String {
    format!("{}{}", " ".repeat(width.saturating_sub(s.width())), s)
}

fn pad_center(s: &str, width: usize) -> String {
    let total = width.saturating_sub(s.width());
    let left = total / 2;
    format!("{}{}{}", " ".repeat(left), s, " ".repeat(total - left))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDefinition, IndexInfo};

    fn sample() -> Frame {
        let mut frame = Frame::new(["id", "name"]);
        frame
            .push_row(vec![Value::Int(1), Value::Text("alice".to_string())])
            .unwrap();
        frame
            .push_row(vec![Value::Int(22), Value::Null])
            .unwrap();
        frame
    }

    #[test]
    fn test_format_as_table() {
        let output = format_as_table(&sample());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "+----+-------+");
        assert_eq!(lines[1], "| id | name  |");
        assert_eq!(lines[3], "|  1 | alice |");
        assert_eq!(lines[4], "| 22 | NULL  |");
        assert_eq!(lines[6], "2 rows in set");
    }

    #[test]
    fn test_format_as_table_wide_chars() {
        let mut frame = Frame::new(["name"]);
        frame
            .push_row(vec![Value::Text("日本".to_string())])
            .unwrap();
        frame
            .push_row(vec![Value::Text("abc".to_string())])
            .unwrap();
        let output = format_as_table(&frame);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "+------+");
        assert_eq!(lines[3], "| 日本 |");
        assert_eq!(lines[4], "| abc  |");
    }

    #[test]
    fn test_format_as_markdown() {
        let output = format_as_markdown(&sample());
        assert!(output.starts_with("| id | name |\n|---|---|\n"));
        assert!(output.contains("| 1 | alice |"));
        assert!(output.ends_with("*2 rows*"));
    }

    #[test]
    fn test_format_output_shapes() {
        assert_eq!(
            format_output(&QueryOutput::Empty, OutputFormat::Table),
            "Empty set"
        );
        assert_eq!(format_output(&QueryOutput::Empty, OutputFormat::Json), "[]");
        assert_eq!(
            format_output(&QueryOutput::Scalar(Value::Int(42)), OutputFormat::Table),
            "42"
        );
        assert_eq!(
            format_output(&QueryOutput::Scalar(Value::Int(42)), OutputFormat::Json),
            "42"
        );
    }

    #[test]
    fn test_format_json_records() {
        let output = format_frame(&sample(), OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["id"], 1);
        assert_eq!(parsed[0]["name"], "alice");
        assert!(parsed[1]["name"].is_null());
    }

    #[test]
    fn test_describe_frame() {
        let table = TableDescriptor::new("users", "public")
            .with_column(ColumnDefinition::new("id", "integer", false).with_primary_key(true))
            .with_column(ColumnDefinition::new("email", "text", true));
        let frame = describe_frame(&table);
        assert_eq!(frame.shape(), (2, 5));
        assert_eq!(frame.get(0, "primary_key"), Some(&Value::Bool(true)));
        assert_eq!(frame.get(1, "default"), Some(&Value::Null));
    }

    #[test]
    fn test_indexes_frame() {
        let table = TableDescriptor::new("users", "public").with_indexes(vec![
            IndexInfo::new("users_pkey", vec!["id".to_string()])
                .with_unique(true)
                .with_primary(true),
            IndexInfo::new("users_name_city", vec!["name".to_string(), "city".to_string()]),
        ]);
        let frame = indexes_frame(&table);
        assert_eq!(frame.shape(), (2, 4));
        assert_eq!(frame.get(0, "primary"), Some(&Value::Bool(true)));
        assert_eq!(frame.get(1, "columns"), Some(&Value::from("name, city")));
        assert_eq!(frame.get(1, "unique"), Some(&Value::Bool(false)));

        let bare = indexes_frame(&TableDescriptor::new("log", "public"));
        assert_eq!(bare.shape(), (0, 4));
    }
}

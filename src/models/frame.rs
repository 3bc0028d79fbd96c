//! Tabular results.
//!
//! `Frame` is a rectangular table with named columns, and `QueryOutput` is
//! the shape every query-returning operation produces.

use crate::error::{DbError, DbResult};
use crate::models::value::{Record, Value};
use serde::Serialize;

/// Rows of values under an ordered list of column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Create an empty frame with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a frame whose row width is fixed at compile time.
    pub fn from_fixed<const N: usize, R>(columns: [&str; N], rows: R) -> Self
    where
        R: IntoIterator<Item = [Value; N]>,
    {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter().map(Vec::from).collect(),
        }
    }

    /// Append a row. The row must have one value per column.
    pub fn push_row(&mut self, row: Vec<Value>) -> DbResult<()> {
        if row.len() != self.columns.len() {
            return Err(DbError::invalid_input(format!(
                "Row has {} values but frame has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Build a frame from records.
    ///
    /// Columns appear in first-seen order; a record lacking a column gets
    /// `Null` there.
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at a row for a named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Keep only the given columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> DbResult<Frame> {
        let indexes = columns
            .iter()
            .map(|c| {
                self.column_index(c.as_ref()).ok_or_else(|| {
                    DbError::invalid_input(format!("Column '{}' not in result", c.as_ref()))
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Frame {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| indexes.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// Append all rows of `other` below this frame.
    ///
    /// Frames without rows contribute nothing but their column names; once
    /// both sides have rows the column lists must match.
    pub fn extend(&mut self, other: Frame) -> DbResult<()> {
        if other.rows.is_empty() {
            if self.columns.is_empty() {
                self.columns = other.columns;
            }
            return Ok(());
        }
        if self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.columns != other.columns {
            return Err(DbError::invalid_input(format!(
                "Cannot concatenate frames with columns {:?} and {:?}",
                self.columns, other.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Replace every null-like value (NaN floats, `"NaT"`) with `Null`.
    pub fn normalize_nulls(&mut self) {
        for row in &mut self.rows {
            for value in row.iter_mut() {
                if value.is_null_like() {
                    *value = Value::Null;
                }
            }
        }
    }

    /// One record per row.
    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }
}

/// Shape of a query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    /// No rows (or no columns)
    Empty,
    /// Exactly one row with exactly one column
    Scalar(Value),
    Table(Frame),
}

impl QueryOutput {
    /// Classify a frame: 1x1 becomes a scalar, no data becomes `Empty`.
    pub fn from_frame(frame: Frame) -> Self {
        if frame.shape() == (1, 1) {
            let value = frame.into_rows().pop().and_then(|mut r| r.pop());
            return value.map(Self::Scalar).unwrap_or(Self::Empty);
        }
        if frame.is_empty() {
            return Self::Empty;
        }
        Self::Table(frame)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Frame> {
        match self {
            Self::Table(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Frame> {
        match self {
            Self::Table(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_from_records_fills_missing() {
        let records = vec![
            record(&[("id", Value::Int(1)), ("name", "a".into())]),
            record(&[("id", Value::Int(2))]),
        ];
        let frame = Frame::from_records(&records);
        assert_eq!(frame.shape(), (2, 2));
        assert_eq!(frame.get(1, "name"), Some(&Value::Null));
        assert_eq!(frame.to_records()[0], records[0]);
    }

    #[test]
    fn test_push_row_rejects_ragged() {
        let mut frame = Frame::new(["a", "b"]);
        assert!(frame.push_row(vec![Value::Int(1)]).is_err());
        assert!(frame.push_row(vec![Value::Int(1), Value::Null]).is_ok());
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn test_select_projects_and_orders() {
        let mut frame = Frame::new(["a", "b", "c"]);
        frame
            .push_row(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
            .unwrap();
        let projected = frame.select(&["c", "a"]).unwrap();
        assert_eq!(projected.columns(), ["c", "a"]);
        assert_eq!(projected.rows()[0], vec![Value::Int(3), Value::Int(1)]);
        assert!(frame.select(&["zzz"]).is_err());
    }

    #[test]
    fn test_extend_preserves_order() {
        let mut first = Frame::default();
        let mut a = Frame::new(["id"]);
        a.push_row(vec![Value::Int(1)]).unwrap();
        let mut b = Frame::new(["id"]);
        b.push_row(vec![Value::Int(2)]).unwrap();
        b.push_row(vec![Value::Int(3)]).unwrap();

        first.extend(a).unwrap();
        first.extend(Frame::default()).unwrap();
        first.extend(b).unwrap();
        let ids: Vec<_> = first.column("id").unwrap().into_iter().cloned().collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);

        assert!(first.extend(Frame::new(["other"])).is_ok());
        let mut mismatched = Frame::new(["other"]);
        mismatched.push_row(vec![Value::Null]).unwrap();
        assert!(first.extend(mismatched).is_err());
    }

    #[test]
    fn test_normalize_nulls() {
        let mut frame = Frame::new(["ts", "score", "name"]);
        frame
            .push_row(vec!["NaT".into(), Value::Float(f64::NAN), "bob".into()])
            .unwrap();
        frame
            .push_row(vec!["None".into(), Value::Float(0.5), "NaN".into()])
            .unwrap();
        frame.normalize_nulls();
        assert_eq!(
            frame.rows()[0],
            vec![Value::Null, Value::Null, Value::Text("bob".to_string())]
        );
        assert_eq!(
            frame.rows()[1],
            vec!["None".into(), Value::Float(0.5), "NaN".into()]
        );
    }

    #[test]
    fn test_from_fixed() {
        let frame = Frame::from_fixed(
            ["name", "size"],
            [["a".into(), Value::Int(1)], ["b".into(), Value::Int(2)]],
        );
        assert_eq!(frame.columns(), ["name", "size"]);
        assert_eq!(frame.shape(), (2, 2));
        assert_eq!(frame.get(1, "name"), Some(&Value::from("b")));

        let empty = Frame::from_fixed(["name"], std::iter::empty::<[Value; 1]>());
        assert_eq!(empty.shape(), (0, 1));
    }

    #[test]
    fn test_query_output_shapes() {
        assert_eq!(QueryOutput::from_frame(Frame::new(["a"])), QueryOutput::Empty);

        let mut scalar = Frame::new(["count"]);
        scalar.push_row(vec![Value::Int(5)]).unwrap();
        assert_eq!(
            QueryOutput::from_frame(scalar).as_scalar(),
            Some(&Value::Int(5))
        );

        let mut table = Frame::new(["a", "b"]);
        table.push_row(vec![Value::Int(1), Value::Int(2)]).unwrap();
        let output = QueryOutput::from_frame(table.clone());
        assert_eq!(output.as_table(), Some(&table));

        let mut column = Frame::new(["a"]);
        column.push_row(vec![Value::Int(1)]).unwrap();
        column.push_row(vec![Value::Int(2)]).unwrap();
        assert!(matches!(QueryOutput::from_frame(column), QueryOutput::Table(_)));
    }
}

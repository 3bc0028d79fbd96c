//! Schema-related data models.
//!
//! This module defines the table descriptors produced by reflection.

use serde::Serialize;

/// Reflected description of one table. Read-only after reflection.
#[derive(Debug, Clone, Serialize)]
pub struct TableDescriptor {
    pub table_name: String,
    pub schema_name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexInfo>,
}

impl TableDescriptor {
    /// Create a new table descriptor.
    pub fn new(table_name: impl Into<String>, schema_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            schema_name: schema_name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Add a column definition. Primary key columns are recorded as well.
    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        if column.is_primary_key {
            self.primary_key.push(column.name.clone());
        }
        self.columns.push(column);
        self
    }

    /// Set the indexes.
    pub fn with_indexes(mut self, indexes: Vec<IndexInfo>) -> Self {
        self.indexes = indexes;
        self
    }

    /// Get the fully qualified table name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Column sets that a conflict can be raised on.
    pub fn unique_keys(&self) -> Vec<&[String]> {
        self.indexes
            .iter()
            .filter(|i| i.is_unique || i.is_primary)
            .map(|i| i.columns.as_slice())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Full type as rendered by `format_type` (e.g., `character varying(512)`)
    pub data_type: String,
    /// Type without its modifier (e.g., `character varying`); bound values
    /// are cast to this so the column's own length checks still apply
    pub base_type: String,
    pub nullable: bool,
    /// Default expression (e.g., `nextval('seq'::regclass)`, `now()`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub is_primary_key: bool,
}

impl ColumnDefinition {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            base_type: strip_type_modifier(&data_type),
            data_type,
            nullable,
            default_value: None,
            is_primary_key: false,
        }
    }

    /// Set whether this is a primary key column.
    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.is_primary_key = is_pk;
        self
    }

    /// Set the modifier-free type reported by the catalog.
    pub fn with_base_type(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = base_type.into();
        self
    }

    /// Set the default expression.
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Whether the server fills this column when it is omitted.
    pub fn is_server_generated(&self) -> bool {
        self.default_value.is_some()
    }
}

/// Drop `(n)` / `(p,s)` modifiers from a rendered type name.
///
/// `character` and `bit` without a length mean length 1, so they map to
/// the unbounded `bpchar` and `"bit"` spellings instead.
pub fn strip_type_modifier(data_type: &str) -> String {
    let mut stripped = String::with_capacity(data_type.len());
    let mut depth = 0usize;
    for ch in data_type.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(ch),
            _ => {}
        }
    }
    let stripped = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = stripped.replace(" []", "[]");

    let (base, array) = match stripped.strip_suffix("[]") {
        Some(base) => (base, "[]"),
        None => (stripped.as_str(), ""),
    };
    let base = match base {
        "character" | "char" => "bpchar",
        "bit" => "\"bit\"",
        other => other,
    };
    format!("{base}{array}")
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_primary: bool,
}

impl IndexInfo {
    /// Create a new index info.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            is_unique: false,
            is_primary: false,
        }
    }

    pub fn with_unique(mut self, is_unique: bool) -> Self {
        self.is_unique = is_unique;
        self
    }

    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_data_files() -> TableDescriptor {
        TableDescriptor::new("raw_data_files", "analytics")
            .with_column(
                ColumnDefinition::new("id", "bigint", false)
                    .with_primary_key(true)
                    .with_default("nextval('raw_data_files_id_seq'::regclass)"),
            )
            .with_column(ColumnDefinition::new(
                "raw_file_hash",
                "character varying(512)",
                false,
            ))
            .with_indexes(vec![
                IndexInfo::new("pk_raw_data_files", vec!["id".to_string()])
                    .with_unique(true)
                    .with_primary(true),
                IndexInfo::new("ix_raw_file_hash", vec!["raw_file_hash".to_string()]),
            ])
    }

    #[test]
    fn test_descriptor_columns() {
        let table = raw_data_files();
        assert_eq!(table.qualified_name(), "analytics.raw_data_files");
        assert_eq!(table.primary_key, vec!["id".to_string()]);
        assert_eq!(table.column_names(), vec!["id", "raw_file_hash"]);
        assert!(table.has_column("raw_file_hash"));
        assert!(!table.has_column("missing"));
        assert!(table.column("id").unwrap().is_server_generated());
    }

    #[test]
    fn test_strip_type_modifier() {
        assert_eq!(strip_type_modifier("character varying(512)"), "character varying");
        assert_eq!(strip_type_modifier("numeric(10,2)"), "numeric");
        assert_eq!(
            strip_type_modifier("timestamp(3) with time zone"),
            "timestamp with time zone"
        );
        assert_eq!(strip_type_modifier("character(5)"), "bpchar");
        assert_eq!(strip_type_modifier("character varying(5)[]"), "character varying[]");
        assert_eq!(strip_type_modifier("bit(8)"), "\"bit\"");
        assert_eq!(strip_type_modifier("integer"), "integer");
    }

    #[test]
    fn test_base_type_defaults_to_stripped() {
        let table = raw_data_files();
        let column = table.column("raw_file_hash").unwrap();
        assert_eq!(column.data_type, "character varying(512)");
        assert_eq!(column.base_type, "character varying");

        let overridden = ColumnDefinition::new("mood", "app.mood", true).with_base_type("app.mood");
        assert_eq!(overridden.base_type, "app.mood");
    }

    #[test]
    fn test_unique_keys() {
        let table = raw_data_files();
        let keys = table.unique_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0], ["id".to_string()]);
    }
}

//! Tabular result types
//!
//! The binder's only input contract: an ordered list of columns with declared
//! database type names, and rows mapping column name to a raw string value.
//! `None` is SQL NULL (or a column the row does not carry), `Some("")` is empty.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as reported by the backend
    pub name: String,
    /// Declared database type name (e.g. `BIGINT UNSIGNED`, `DECIMAL(10,2)`)
    pub type_name: String,
}

impl Column {
    /// Create column metadata
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Type family of this column
    pub fn column_type(&self) -> ColumnType {
        ColumnType::from_type_name(&self.type_name)
    }
}

/// Type family derived from a declared type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// integer, int, tinyint, smallint, mediumint, bigint
    Integer,
    /// double, float, decimal, real, numeric
    Float,
    /// bool, boolean
    Boolean,
    /// datetime, timestamp
    DateTime,
    /// Everything else
    Text,
}

impl ColumnType {
    /// Classify a declared type name
    ///
    /// Case-insensitive; precision suffixes and modifiers such as `UNSIGNED`
    /// are ignored.
    pub fn from_type_name(type_name: &str) -> Self {
        let lowered = type_name.trim().to_ascii_lowercase();
        let base = lowered
            .split('(')
            .next()
            .and_then(|head| head.split_whitespace().next())
            .unwrap_or("");

        match base {
            "integer" | "int" | "tinyint" | "smallint" | "mediumint" | "bigint" => Self::Integer,
            "double" | "float" | "decimal" | "real" | "numeric" => Self::Float,
            "bool" | "boolean" => Self::Boolean,
            "datetime" | "timestamp" => Self::DateTime,
            _ => Self::Text,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::DateTime => write!(f, "datetime"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// One row of raw column values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: HashMap<String, Option<String>>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value
    pub fn set(&mut self, column: impl Into<String>, value: Option<String>) {
        self.values.insert(column.into(), value);
    }

    /// Raw value of a column; `None` when the column is absent or NULL
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).and_then(|v| v.as_deref())
    }

    /// Whether the row carries the column at all (NULL included)
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Number of columns in the row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for Row
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        }
    }
}

/// Columns plus rows, as returned by a query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularResult {
    /// Ordered column metadata
    pub columns: Vec<Column>,
    /// Rows in result order
    pub rows: Vec<Row>,
}

impl TabularResult {
    /// Create a result with the given columns and no rows
    pub fn new(columns: impl IntoIterator<Item = Column>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row given as `(column, value)` pairs
    pub fn with_row<K, V>(mut self, values: impl IntoIterator<Item = (K, Option<V>)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.rows.push(values.into_iter().collect());
        self
    }

    /// Append a row
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column metadata by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Decoded value for map targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL or absent column
    Null,
    /// Integer column
    Int(i64),
    /// Floating-point column
    Float(f64),
    /// Text, boolean and datetime columns
    Text(String),
}

impl Value {
    /// Check if value is NULL
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer value, if any
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Float value; integers widen
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Text value, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

//! Core data model types shared by readers, the type mapper, and the loader.
//!
//! Source rows are positional: a row is a `Vec<Value>` aligned with the reader's header list.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell read from a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Nested or object-valued cell (lists, structs, maps from external tables).
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual form used when a cell is bound as text.
    ///
    /// `Json` cells are flattened to their JSON text. This is lossy and one-way: loaded tables
    /// hold the text, not the structure.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int64(v) => Some(v.to_string()),
            Value::Float64(v) => Some(v.to_string()),
            Value::Bool(v) => Some(v.to_string()),
            Value::Utf8(s) => Some(s.clone()),
            Value::Json(v) => Some(v.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(s) => f.write_str(&s),
            None => f.write_str("NULL"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Utf8(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Utf8(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

/// Store-native column type resolved from a caller-supplied logical type token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    /// Generic text. The fallback for anything unrecognised.
    #[default]
    Text,
    Integer,
    Double,
    /// Arbitrary-precision numeric.
    Numeric,
    Timestamp,
    Date,
    Time,
    Boolean,
    Uuid,
    Json,
}

impl BackendType {
    /// SQL spelling used in `CREATE TABLE`.
    pub fn sql(&self) -> &'static str {
        match self {
            BackendType::Text => "VARCHAR",
            BackendType::Integer => "BIGINT",
            BackendType::Double => "DOUBLE",
            BackendType::Numeric => "DECIMAL(38,10)",
            BackendType::Timestamp => "TIMESTAMP",
            BackendType::Date => "DATE",
            BackendType::Time => "TIME",
            BackendType::Boolean => "BOOLEAN",
            BackendType::Uuid => "UUID",
            BackendType::Json => "JSON",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, BackendType::Text)
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

/// A caller's choice for one source column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Must be one of the session's headers.
    pub name: String,
    pub selected: bool,
    /// Free-text logical type such as `NVARCHAR(MAX)` or `DECIMAL(18,2)`.
    pub logical_type: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selected: true,
            logical_type: None,
        }
    }

    pub fn with_type(mut self, logical_type: impl Into<String>) -> Self {
        self.logical_type = Some(logical_type.into());
        self
    }
}

/// A [`ColumnSpec`] after type resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedColumn {
    pub name: String,
    pub backend_type: BackendType,
}

impl ResolvedColumn {
    pub fn new(name: impl Into<String>, backend_type: BackendType) -> Self {
        Self {
            name: name.into(),
            backend_type,
        }
    }
}

/// Header list plus a bounded sample of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub headers: Vec<String>,
    /// Rows aligned with `headers`.
    pub rows: Vec<Vec<Value>>,
}

impl Preview {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows as JSON objects keyed by header, the shape a UI table expects.
    pub fn json_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| {
                        let json = serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
                        (h.clone(), json)
                    })
                    .collect()
            })
            .collect()
    }
}

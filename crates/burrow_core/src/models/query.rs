//! Statement execution models.

use serde::Serialize;

use crate::error::BurrowError;

/// A single cell or bound parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// BOOL
    Bool(bool),
    /// Any integer type (INT2/INT4/INT8/OID)
    Int(i64),
    /// FLOAT4/FLOAT8
    Float(f64),
    /// Text, or the server's text rendering of any other type
    Text(String),
    /// BYTEA
    Bytes(Vec<u8>),
}

impl Value {
    /// Check for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Bytes(v) => {
                f.write_str("\\x")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// One result row with positional accessors.
///
/// Accessors fail with a catalog error when the row does not have the shape a
/// catalog query documents, so decoding problems surface like any other catalog failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(pub Vec<Value>);

impl Row {
    /// Raw value at `idx`.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    /// Values in column order.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Non-null text at `idx`. Numbers and booleans are rendered.
    pub fn text(&self, idx: usize) -> Result<String, BurrowError> {
        self.opt_text(idx)?
            .ok_or_else(|| BurrowError::catalog(format!("unexpected NULL in column {idx}")))
    }

    /// Nullable text at `idx`.
    pub fn opt_text(&self, idx: usize) -> Result<Option<String>, BurrowError> {
        match self.0.get(idx) {
            None => Err(BurrowError::catalog(format!("missing column {idx}"))),
            Some(Value::Null) => Ok(None),
            Some(Value::Text(v)) => Ok(Some(v.clone())),
            Some(Value::Bytes(_)) => {
                Err(BurrowError::catalog(format!("column {idx} is binary, expected text")))
            }
            Some(other) => Ok(Some(other.to_string())),
        }
    }

    /// Boolean at `idx`. Accepts the text protocol's `t`/`f`.
    pub fn bool(&self, idx: usize) -> Result<bool, BurrowError> {
        match self.0.get(idx) {
            Some(Value::Bool(v)) => Ok(*v),
            Some(Value::Text(v)) => match v.as_str() {
                "t" | "true" => Ok(true),
                "f" | "false" => Ok(false),
                _ => Err(BurrowError::catalog(format!("column {idx} is not a boolean: {v}"))),
            },
            Some(other) => {
                Err(BurrowError::catalog(format!("column {idx} is not a boolean: {other}")))
            }
            None => Err(BurrowError::catalog(format!("missing column {idx}"))),
        }
    }
}

/// Column names plus rows, as returned by a [`crate::services::SqlClient`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Column names from the result descriptor.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Create a result set.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// How the dispatcher treats a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// Returns rows; fetched, never committed
    Read,
    /// Mutates state; committed on success, rolled back on failure
    Write,
    /// Blank input; nothing is sent to the server
    Empty,
}

/// Uniform result of dispatching one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResultEnvelope {
    /// Rows from a read statement.
    Query {
        /// Column names.
        columns: Vec<String>,
        /// Fetched rows.
        rows: Vec<Row>,
        /// `"<n> row(s)"`
        message: String,
    },
    /// Outcome of a write statement, or of blank input.
    Command {
        /// Affected rows; `None` when nothing was executed.
        affected: Option<u64>,
        /// Status text.
        message: String,
    },
}

impl ResultEnvelope {
    /// Status text.
    pub fn message(&self) -> &str {
        match self {
            Self::Query { message, .. } | Self::Command { message, .. } => message,
        }
    }

    /// Number of rows fetched (0 for commands).
    pub fn row_count(&self) -> usize {
        match self {
            Self::Query { rows, .. } => rows.len(),
            Self::Command { .. } => 0,
        }
    }
}

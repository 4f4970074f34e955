//! Catalog object models.
//!
//! Typed records produced by the metadata repository from raw catalog rows.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::query::ResultEnvelope;

/// Kind of catalog object the browser and DDL reconstructor understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Ordinary table
    Table,
    /// View
    View,
    /// Index (owned by a table)
    Index,
    /// Function / routine
    Function,
    /// Sequence
    Sequence,
    /// User-defined type
    Type,
}

impl ObjectKind {
    /// All kinds, in the order their folders appear under a schema.
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Table,
        ObjectKind::View,
        ObjectKind::Index,
        ObjectKind::Function,
        ObjectKind::Sequence,
        ObjectKind::Type,
    ];

    /// Lower-case name, as used in `DbObject::obj_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::View => "view",
            Self::Index => "index",
            Self::Function => "function",
            Self::Sequence => "sequence",
            Self::Type => "type",
        }
    }

    /// Parse a kind name. Returns `None` for kinds outside the supported set.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "table" => Some(Self::Table),
            "view" => Some(Self::View),
            "index" => Some(Self::Index),
            "function" => Some(Self::Function),
            "sequence" => Some(Self::Sequence),
            "type" => Some(Self::Type),
            _ => None,
        }
    }

    /// Label of the browser folder grouping objects of this kind.
    pub fn folder_label(&self) -> &'static str {
        match self {
            Self::Table => "Tables",
            Self::View => "Views",
            Self::Index => "Indexes",
            Self::Function => "Functions",
            Self::Sequence => "Sequences",
            Self::Type => "Types",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DbObject {
    /// Object kind.
    pub obj_type: ObjectKind,
    /// Schema containing the object.
    pub schema: String,
    /// Object name.
    pub name: String,
}

impl DbObject {
    /// Create a new object reference.
    pub fn new(obj_type: ObjectKind, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self { obj_type, schema: schema.into(), name: name.into() }
    }

    /// `schema.name`, unquoted, for display.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// An index together with the table it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIndex {
    /// The index itself (`obj_type == Index`).
    pub object: DbObject,
    /// Owning table name, in the same schema.
    pub table: String,
}

/// A table column, in catalog attribute-number order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Formatted data type (e.g., "INT8", "VARCHAR(255)").
    pub data_type: String,
    /// Whether the column is declared NOT NULL.
    pub not_null: bool,
}

/// Column name to default expression.
///
/// Columns without a default are absent; [`ColumnDefaults::get`] reports them as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefaults(HashMap<String, String>);

impl ColumnDefaults {
    /// Record a default expression.
    pub fn insert(&mut self, column: impl Into<String>, expr: impl Into<String>) {
        self.0.insert(column.into(), expr.into());
    }

    /// Default expression for a column, or `""` if it has none.
    pub fn get(&self, column: &str) -> &str {
        self.0.get(column).map(String::as_str).unwrap_or("")
    }

    /// Number of columns with a default.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no column has a default.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Columns of one UNIQUE constraint, in constraint key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraintGroup {
    /// Constraint name.
    pub constraint_name: String,
    /// Member columns.
    pub columns: Vec<String>,
}

/// Classification of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Backs the primary key.
    PrimaryKey,
    /// Unique, but not the primary key.
    Unique,
    /// Any other index, tagged with its upper-cased access method.
    Secondary(String),
}

impl IndexKind {
    /// Derive the kind from the catalog flags and definition text.
    pub fn from_flags(is_primary: bool, is_unique: bool, definition: &str) -> Self {
        if is_primary {
            Self::PrimaryKey
        } else if is_unique {
            Self::Unique
        } else {
            Self::Secondary(access_method(definition))
        }
    }

    /// Display text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PrimaryKey => "PRIMARY KEY",
            Self::Unique => "UNIQUE",
            Self::Secondary(method) => method,
        }
    }
}

/// Access method named by `USING <method>`, upper-cased; `BTREE` when absent.
fn access_method(definition: &str) -> String {
    let upper = definition.to_uppercase();
    upper
        .find(" USING ")
        .map(|pos| {
            upper[pos + " USING ".len()..]
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|method| !method.is_empty())
        .unwrap_or_else(|| "BTREE".to_string())
}

/// One index on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name.
    pub index_name: String,
    /// PRIMARY KEY, UNIQUE or the access method.
    pub kind: IndexKind,
    /// Column list without sort-direction qualifiers (e.g. "a, b").
    pub columns_text: String,
    /// "UNIQUE" for unique non-primary indexes, otherwise "".
    pub uniqueness_marker: String,
}

/// One local-to-referenced column pair of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    /// Constraint name.
    pub fk_name: String,
    /// Referencing column.
    pub local_column: String,
    /// Schema of the referenced table.
    pub ref_schema: String,
    /// Referenced table.
    pub ref_table: String,
    /// Referenced column.
    pub ref_column: String,
}

impl ForeignKeyDescriptor {
    /// `schema.table(column)`, for display.
    pub fn reference_text(&self) -> String {
        format!("{}.{}({})", self.ref_schema, self.ref_table, self.ref_column)
    }
}

/// A column joined with its default and primary-key membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDetail {
    /// Column name.
    pub name: String,
    /// Formatted data type.
    pub data_type: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Default expression, `""` when none.
    pub default_expr: String,
    /// Whether this column is part of the primary key.
    pub primary_key: bool,
}

/// Everything loaded when a table is selected in the browser.
#[derive(Debug, Clone)]
pub struct TableDetails {
    /// Database the details were read from.
    pub database: String,
    /// The table.
    pub object: DbObject,
    /// Columns in attribute order.
    pub columns: Vec<ColumnDetail>,
    /// Indexes, primary first.
    pub indexes: Vec<IndexDescriptor>,
    /// Foreign keys ordered by constraint name.
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    /// Reconstructed `CREATE TABLE` text.
    pub ddl: String,
    /// First rows of the table.
    pub preview: ResultEnvelope,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_kind_flags_are_exclusive() {
        assert_eq!(IndexKind::from_flags(true, true, ""), IndexKind::PrimaryKey);
        assert_eq!(IndexKind::from_flags(false, true, ""), IndexKind::Unique);
        assert_eq!(
            IndexKind::from_flags(false, false, "CREATE INDEX i ON t USING btree (a ASC)"),
            IndexKind::Secondary("BTREE".to_string())
        );
    }

    #[test]
    fn test_secondary_kind_uses_access_method() {
        let kind = IndexKind::from_flags(false, false, "CREATE INDEX i ON t USING gin (doc)");
        assert_eq!(kind.as_str(), "GIN");
        let kind = IndexKind::from_flags(false, false, "CREATE INDEX i ON t (a)");
        assert_eq!(kind.as_str(), "BTREE");
    }

    #[test]
    fn test_column_defaults_missing_is_empty_string() {
        let mut defaults = ColumnDefaults::default();
        defaults.insert("id", "unique_rowid()");
        assert_eq!(defaults.get("id"), "unique_rowid()");
        assert_eq!(defaults.get("name"), "");
        assert_eq!(defaults.len(), 1);
    }

    #[test]
    fn test_object_kind_parse_rejects_unknown() {
        assert_eq!(ObjectKind::parse(" Sequence "), Some(ObjectKind::Sequence));
        assert_eq!(ObjectKind::parse("trigger"), None);
        assert_eq!(ObjectKind::Index.folder_label(), "Indexes");
    }
}

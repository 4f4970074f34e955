//! Statement builders for creating and dropping objects.
//!
//! Names are checked against the identifier allow-list before they are quoted into the
//! statement. The resulting text is meant to be run through the dispatcher on a session
//! connected to the target database.

use serde::{Deserialize, Serialize};

use crate::error::BurrowError;
use crate::models::ObjectKind;
use crate::services::ident::{qualified, quote_ident, validate_identifier};

const DEFAULT_SCHEMA: &str = "public";

/// One column of a table to create.
///
/// `data_type` and `default` are SQL fragments supplied by the caller and are placed
/// in the statement as written. Only the name is validated and quoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    /// Default expression; empty or `NULL` means none.
    pub default: String,
    pub primary_key: bool,
    /// Ignored for primary key columns.
    pub unique: bool,
}

impl ColumnSpec {
    /// Nullable column with no default or constraints.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: String::new(),
            primary_key: false,
            unique: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = expr.into();
        self
    }

    fn render(&self) -> Result<String, BurrowError> {
        let name = validate_identifier(self.name.trim())?;
        let data_type = self.data_type.trim();
        if data_type.is_empty() {
            return Err(BurrowError::invalid_input(format!("column {name} has no data type")));
        }
        if data_type.contains(';') {
            return Err(BurrowError::invalid_input(format!(
                "data type of column {name} must be a single type, got {data_type:?}"
            )));
        }

        let mut line = format!("    {} {}", quote_ident(name), data_type);
        if !self.nullable {
            line.push_str(" NOT NULL");
        }
        let default = self.default.trim();
        if !default.is_empty() && !default.eq_ignore_ascii_case("NULL") {
            line.push_str(" DEFAULT ");
            line.push_str(default);
        }
        if self.unique && !self.primary_key {
            line.push_str(" UNIQUE");
        }
        Ok(line)
    }
}

/// A table to create.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSpec {
    /// Empty means `public`.
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self { schema: schema.into(), name: name.into(), columns: Vec::new() }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Render `CREATE TABLE`.
    ///
    /// Primary key columns are collected into a `"<table>_pkey"` constraint after the
    /// column lines.
    pub fn build_sql(&self) -> Result<String, BurrowError> {
        let name = self.name.trim();
        let target = qualified(schema_or_default(&self.schema), name)?;
        if self.columns.is_empty() {
            return Err(BurrowError::invalid_input(format!("table {name} has no columns")));
        }

        let mut lines = self.columns.iter().map(ColumnSpec::render).collect::<Result<Vec<_>, _>>()?;

        let pk: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| quote_ident(c.name.trim()))
            .collect();
        if !pk.is_empty() {
            lines.push(format!(
                "    CONSTRAINT {} PRIMARY KEY ({})",
                quote_ident(&format!("{name}_pkey")),
                pk.join(", ")
            ));
        }

        Ok(format!("CREATE TABLE {target} (\n{}\n);", lines.join(",\n")))
    }
}

/// A view to create.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewSpec {
    /// Empty means `public`.
    pub schema: String,
    pub name: String,
    pub query: String,
}

impl ViewSpec {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self { schema: schema.into(), name: name.into(), query: query.into() }
    }

    /// Render `CREATE VIEW ... AS`. The body must be a `SELECT`.
    pub fn build_sql(&self) -> Result<String, BurrowError> {
        let target = qualified(schema_or_default(&self.schema), self.name.trim())?;
        let query = self.query.trim().trim_end_matches(';').trim_end();
        if !query.to_lowercase().starts_with("select") {
            return Err(BurrowError::invalid_input("view query must start with SELECT"));
        }
        Ok(format!("CREATE VIEW {target} AS\n{query};"))
    }
}

/// `DROP TABLE|VIEW|SEQUENCE "schema"."name";`
pub fn drop_statement(kind: ObjectKind, schema: &str, name: &str) -> Result<String, BurrowError> {
    match kind {
        ObjectKind::Table | ObjectKind::View | ObjectKind::Sequence => Ok(format!(
            "DROP {} {};",
            kind.as_str().to_uppercase(),
            qualified(schema_or_default(schema), name)?
        )),
        other => Err(BurrowError::invalid_input(format!("cannot drop objects of type {other}"))),
    }
}

fn schema_or_default(schema: &str) -> &str {
    let schema = schema.trim();
    if schema.is_empty() {
        DEFAULT_SCHEMA
    } else {
        schema
    }
}

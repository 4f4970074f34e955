//! Metadata repository.
//!
//! Runs the catalog queries and shapes their rows into typed records for the browser,
//! the DDL reconstructor and the table detail pane. Every call uses the connection it is
//! handed and leaves its lifecycle to the caller. Statement failures are re-tagged as
//! catalog errors and propagated.

use crate::error::BurrowError;
use crate::models::{
    ColumnDefaults, ColumnDescriptor, ColumnDetail, DbObject, ForeignKeyDescriptor,
    IndexDescriptor, IndexKind, ObjectKind, ResultEnvelope, ResultSet, SchemaIndex, TableDetails,
    UniqueConstraintGroup, Value,
};
use crate::services::catalog;
use crate::services::connection::SqlClient;
use crate::services::ddl::DdlReconstructor;
use crate::services::execute;
use crate::services::ident::quote_ident;

/// Rows fetched for a table preview.
pub const PREVIEW_LIMIT: usize = 100;

/// Catalog reads for one connection.
pub struct MetadataRepository;

impl MetadataRepository {
    async fn fetch(
        client: &dyn SqlClient,
        facet: &'static str,
        sql: &str,
        params: &[Value],
    ) -> Result<ResultSet, BurrowError> {
        tracing::debug!(facet, database = client.database(), "Catalog query");
        client.query(sql, params).await.map_err(|e| {
            let err = e.into_catalog();
            tracing::debug!(facet, error = %err, "Catalog query failed");
            err
        })
    }

    fn table_params(schema: &str, table: &str) -> [Value; 2] {
        [Value::from(schema), Value::from(table)]
    }

    // ========== Per-table facets ==========

    /// Columns in attribute-number order.
    pub async fn get_columns(
        client: &dyn SqlClient,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>, BurrowError> {
        let rs = Self::fetch(
            client,
            "columns",
            catalog::TABLE_COLUMNS,
            &Self::table_params(schema, table),
        )
        .await?;

        rs.rows
            .iter()
            .map(|row| {
                Ok(ColumnDescriptor {
                    name: row.text(0)?,
                    data_type: row.text(1)?,
                    not_null: row.bool(2)?,
                })
            })
            .collect()
    }

    /// Primary key column names in constraint key order.
    pub async fn get_primary_key_columns(
        client: &dyn SqlClient,
        schema: &str,
        table: &str,
    ) -> Result<Vec<String>, BurrowError> {
        let rs = Self::fetch(
            client,
            "primary_key",
            catalog::PRIMARY_KEY_COLUMNS,
            &Self::table_params(schema, table),
        )
        .await?;

        rs.rows.iter().map(|row| row.text(0)).collect()
    }

    /// Default expressions. Columns whose default is NULL are left out.
    pub async fn get_column_defaults(
        client: &dyn SqlClient,
        schema: &str,
        table: &str,
    ) -> Result<ColumnDefaults, BurrowError> {
        let rs = Self::fetch(
            client,
            "defaults",
            catalog::COLUMN_DEFAULTS,
            &Self::table_params(schema, table),
        )
        .await?;

        let mut defaults = ColumnDefaults::default();
        for row in &rs.rows {
            if let Some(expr) = row.opt_text(1)? {
                defaults.insert(row.text(0)?, expr);
            }
        }
        Ok(defaults)
    }

    /// Unique constraints grouped by name, columns in row order.
    pub async fn get_unique_constraints(
        client: &dyn SqlClient,
        schema: &str,
        table: &str,
    ) -> Result<Vec<UniqueConstraintGroup>, BurrowError> {
        let rs = Self::fetch(
            client,
            "unique_constraints",
            catalog::UNIQUE_CONSTRAINTS,
            &Self::table_params(schema, table),
        )
        .await?;

        let mut groups: Vec<UniqueConstraintGroup> = Vec::new();
        for row in &rs.rows {
            let constraint_name = row.text(0)?;
            let column = row.text(1)?;
            match groups.iter_mut().find(|g| g.constraint_name == constraint_name) {
                Some(group) => group.columns.push(column),
                None => groups.push(UniqueConstraintGroup { constraint_name, columns: vec![column] }),
            }
        }
        Ok(groups)
    }

    /// Indexes, primary first, then unique, then by name.
    pub async fn get_table_indexes(
        client: &dyn SqlClient,
        schema: &str,
        table: &str,
    ) -> Result<Vec<IndexDescriptor>, BurrowError> {
        let rs = Self::fetch(
            client,
            "indexes",
            catalog::TABLE_INDEXES,
            &Self::table_params(schema, table),
        )
        .await?;

        rs.rows
            .iter()
            .map(|row| {
                let is_primary = row.bool(1)?;
                let is_unique = row.bool(2)?;
                let definition = row.opt_text(3)?.unwrap_or_default();
                Ok(IndexDescriptor {
                    index_name: row.text(0)?,
                    kind: IndexKind::from_flags(is_primary, is_unique, &definition),
                    columns_text: extract_index_columns(&definition),
                    uniqueness_marker: if is_unique && !is_primary {
                        "UNIQUE".to_string()
                    } else {
                        String::new()
                    },
                })
            })
            .collect()
    }

    /// Foreign keys, one descriptor per column pair, ordered by constraint name.
    pub async fn get_foreign_keys(
        client: &dyn SqlClient,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeyDescriptor>, BurrowError> {
        let rs = Self::fetch(
            client,
            "foreign_keys",
            catalog::FOREIGN_KEYS,
            &Self::table_params(schema, table),
        )
        .await?;

        rs.rows
            .iter()
            .map(|row| {
                Ok(ForeignKeyDescriptor {
                    fk_name: row.text(0)?,
                    local_column: row.text(1)?,
                    ref_schema: row.text(2)?,
                    ref_table: row.text(3)?,
                    ref_column: row.text(4)?,
                })
            })
            .collect()
    }

    // ========== Listings ==========

    /// Databases on the server.
    pub async fn list_databases(client: &dyn SqlClient) -> Result<Vec<String>, BurrowError> {
        let rs = Self::fetch(client, "databases", catalog::LIST_DATABASES, &[]).await?;
        rs.rows.iter().map(|row| row.text(0)).collect()
    }

    /// User schemas of the connected database.
    pub async fn list_schemas(client: &dyn SqlClient) -> Result<Vec<String>, BurrowError> {
        let rs = Self::fetch(client, "schemas", catalog::LIST_SCHEMAS, &[]).await?;
        rs.rows.iter().map(|row| row.text(0)).collect()
    }

    async fn list_objects(
        client: &dyn SqlClient,
        kind: ObjectKind,
        sql: &str,
        schema: &str,
    ) -> Result<Vec<DbObject>, BurrowError> {
        let rs = Self::fetch(client, kind.as_str(), sql, &[Value::from(schema)]).await?;
        rs.rows
            .iter()
            .map(|row| Ok(DbObject::new(kind, row.text(0)?, row.text(1)?)))
            .collect()
    }

    pub async fn list_tables(
        client: &dyn SqlClient,
        schema: &str,
    ) -> Result<Vec<DbObject>, BurrowError> {
        Self::list_objects(client, ObjectKind::Table, catalog::LIST_TABLES, schema).await
    }

    pub async fn list_views(
        client: &dyn SqlClient,
        schema: &str,
    ) -> Result<Vec<DbObject>, BurrowError> {
        Self::list_objects(client, ObjectKind::View, catalog::LIST_VIEWS, schema).await
    }

    pub async fn list_functions(
        client: &dyn SqlClient,
        schema: &str,
    ) -> Result<Vec<DbObject>, BurrowError> {
        Self::list_objects(client, ObjectKind::Function, catalog::LIST_FUNCTIONS, schema).await
    }

    pub async fn list_sequences(
        client: &dyn SqlClient,
        schema: &str,
    ) -> Result<Vec<DbObject>, BurrowError> {
        Self::list_objects(client, ObjectKind::Sequence, catalog::LIST_SEQUENCES, schema).await
    }

    pub async fn list_types(
        client: &dyn SqlClient,
        schema: &str,
    ) -> Result<Vec<DbObject>, BurrowError> {
        Self::list_objects(client, ObjectKind::Type, catalog::LIST_TYPES, schema).await
    }

    /// Indexes of a schema, each with its owning table.
    pub async fn list_indexes(
        client: &dyn SqlClient,
        schema: &str,
    ) -> Result<Vec<SchemaIndex>, BurrowError> {
        let rs = Self::fetch(client, "index", catalog::LIST_INDEXES, &[Value::from(schema)]).await?;
        rs.rows
            .iter()
            .map(|row| {
                Ok(SchemaIndex {
                    object: DbObject::new(ObjectKind::Index, row.text(0)?, row.text(2)?),
                    table: row.text(1)?,
                })
            })
            .collect()
    }

    // ========== Detail loading ==========

    /// Load everything the table detail pane shows.
    ///
    /// Metadata failures propagate. The DDL is composed from the rows already loaded,
    /// so it never issues its own catalog queries here. A failed preview is reported
    /// in place of the rows and keeps the rest of the details.
    pub async fn load_table_details(
        client: &dyn SqlClient,
        schema: &str,
        table: &str,
    ) -> Result<TableDetails, BurrowError> {
        tracing::debug!(database = client.database(), schema, table, "Loading table details");

        let columns = Self::get_columns(client, schema, table).await?;
        let pk = Self::get_primary_key_columns(client, schema, table).await?;
        let defaults = Self::get_column_defaults(client, schema, table).await?;
        let uniques = Self::get_unique_constraints(client, schema, table).await?;
        let indexes = Self::get_table_indexes(client, schema, table).await?;
        let foreign_keys = Self::get_foreign_keys(client, schema, table).await?;

        let ddl =
            DdlReconstructor::compose_table_ddl(schema, table, &columns, &pk, &uniques, &foreign_keys);

        let preview = Self::preview(client, schema, table).await;

        let columns = columns
            .into_iter()
            .map(|c| ColumnDetail {
                primary_key: pk.contains(&c.name),
                default_expr: defaults.get(&c.name).to_string(),
                nullable: !c.not_null,
                data_type: c.data_type,
                name: c.name,
            })
            .collect();

        Ok(TableDetails {
            database: client.database().to_string(),
            object: DbObject::new(ObjectKind::Table, schema, table),
            columns,
            indexes,
            foreign_keys,
            ddl,
            preview,
        })
    }

    /// First rows of a table, or a command envelope carrying the failure as a comment.
    async fn preview(client: &dyn SqlClient, schema: &str, table: &str) -> ResultEnvelope {
        let sql = format!(
            "SELECT * FROM {}.{} LIMIT {PREVIEW_LIMIT}",
            quote_ident(schema),
            quote_ident(table)
        );
        match execute::run(client, &sql, &[]).await {
            Ok(envelope) => envelope,
            Err(e) => {
                let e = e.into_catalog();
                tracing::warn!(schema, table, error = %e, "Table preview unavailable");
                ResultEnvelope::Command { affected: None, message: e.to_comment() }
            }
        }
    }
}

/// Column list of an index definition without sort-direction qualifiers.
///
/// Takes the first balanced `( ... )` group, so `STORING (...)` clauses and expression
/// arguments are handled. Returns `""` when the definition has no parenthesis.
pub fn extract_index_columns(definition: &str) -> String {
    let Some(open) = definition.find('(') else {
        return String::new();
    };

    let mut depth = 0usize;
    let mut close = None;
    for (offset, ch) in definition[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + offset);
                    break;
                }
            }
            _ => {}
        }
    }
    let inner = match close {
        Some(close) => &definition[open + 1..close],
        None => &definition[open + 1..],
    };

    split_top_level(inner)
        .into_iter()
        .map(strip_direction)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn strip_direction(part: &str) -> &str {
    let mut part = part.trim();
    loop {
        let upper = part.to_ascii_uppercase();
        let cut = [" ASC", " DESC"].iter().find_map(|suffix| {
            upper.ends_with(suffix).then(|| part.len() - suffix.len())
        });
        match cut {
            Some(cut) => part = part[..cut].trim_end(),
            None => return part,
        }
    }
}

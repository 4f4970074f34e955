//! DDL reconstruction.
//!
//! Two paths produce definition text:
//! - tables are composed from metadata repository output
//! - every kind can also be fetched with the server's `SHOW CREATE` family, with
//!   per-kind post-processing for indexes, functions and types
//!
//! Neither path returns an error. Failures become a single `-- [<label>] ...` comment
//! line so a definition pane always has something to render.

use crate::error::BurrowError;
use crate::models::{
    ColumnDescriptor, DbObject, ForeignKeyDescriptor, ObjectKind, ResultSet, UniqueConstraintGroup,
    Value,
};
use crate::services::catalog;
use crate::services::connection::SqlClient;
use crate::services::ident::{qualified, quote_ident};
use crate::services::metadata::MetadataRepository;

const INDENT: &str = "    ";

/// Builds definition text for catalog objects.
pub struct DdlReconstructor;

impl DdlReconstructor {
    /// Compose `CREATE TABLE` from the table's metadata.
    ///
    /// Any failure is returned as a labelled comment instead of an error.
    pub async fn reconstruct_table_ddl(client: &dyn SqlClient, schema: &str, table: &str) -> String {
        tracing::debug!(database = client.database(), schema, table, "Reconstructing table DDL");

        let result = async {
            let columns = MetadataRepository::get_columns(client, schema, table).await?;
            if columns.is_empty() {
                return Ok(no_columns_comment(schema, table));
            }
            let pk = MetadataRepository::get_primary_key_columns(client, schema, table).await?;
            let uniques = MetadataRepository::get_unique_constraints(client, schema, table).await?;
            let fks = MetadataRepository::get_foreign_keys(client, schema, table).await?;
            Ok::<_, BurrowError>(Self::compose_table_ddl(schema, table, &columns, &pk, &uniques, &fks))
        }
        .await;

        result.unwrap_or_else(|e| degrade(schema, table, e))
    }

    /// Lay out `CREATE TABLE` text from already loaded metadata.
    ///
    /// Lines are emitted as columns, then the primary key, then unique groups, then
    /// foreign keys. An empty column list yields a comment placeholder.
    pub fn compose_table_ddl(
        schema: &str,
        table: &str,
        columns: &[ColumnDescriptor],
        pk: &[String],
        uniques: &[UniqueConstraintGroup],
        fks: &[ForeignKeyDescriptor],
    ) -> String {
        if columns.is_empty() {
            return no_columns_comment(schema, table);
        }

        let mut lines: Vec<String> = columns
            .iter()
            .map(|c| {
                let mut line = format!("{INDENT}{} {}", quote_ident(&c.name), c.data_type);
                if c.not_null {
                    line.push_str(" NOT NULL");
                }
                line
            })
            .collect();

        if !pk.is_empty() {
            lines.push(format!("{INDENT}PRIMARY KEY ({})", quote_list(pk)));
        }

        for group in uniques {
            lines.push(format!(
                "{INDENT}CONSTRAINT {} UNIQUE ({})",
                quote_ident(&group.constraint_name),
                quote_list(&group.columns)
            ));
        }

        for fk in fks {
            lines.push(format!(
                "{INDENT}CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}.{} ({})",
                quote_ident(&fk.fk_name),
                quote_ident(&fk.local_column),
                quote_ident(&fk.ref_schema),
                quote_ident(&fk.ref_table),
                quote_ident(&fk.ref_column)
            ));
        }

        format!(
            "CREATE TABLE {}.{} (\n{}\n);",
            quote_ident(schema),
            quote_ident(table),
            lines.join(",\n")
        )
    }

    /// Server-native definition of any supported object.
    ///
    /// `owning_table` is required for indexes; their definition is cut out of the
    /// owning table's `SHOW CREATE TABLE` output.
    pub async fn get_object_ddl(
        client: &dyn SqlClient,
        object: &DbObject,
        owning_table: Option<&str>,
    ) -> String {
        tracing::debug!(
            database = client.database(),
            kind = %object.obj_type,
            object = %object.qualified_name(),
            "Fetching object DDL"
        );

        let result = match object.obj_type {
            ObjectKind::Table | ObjectKind::View | ObjectKind::Sequence => {
                show_create(client, object.obj_type, &object.schema, &object.name).await
            }
            ObjectKind::Index => index_ddl(client, object, owning_table).await,
            ObjectKind::Function => function_ddl(client, object).await,
            ObjectKind::Type => type_ddl(client, object).await,
        };

        result.unwrap_or_else(|e| degrade(&object.schema, &object.name, e))
    }

    /// Like [`Self::get_object_ddl`], for a kind given by name.
    pub async fn get_object_ddl_by_kind_name(
        client: &dyn SqlClient,
        kind: &str,
        schema: &str,
        name: &str,
        owning_table: Option<&str>,
    ) -> String {
        match ObjectKind::parse(kind) {
            Some(kind) => {
                Self::get_object_ddl(client, &DbObject::new(kind, schema, name), owning_table).await
            }
            None => BurrowError::ddl_unavailable(format!("unsupported object type: {kind}"))
                .to_comment(),
        }
    }
}

fn no_columns_comment(schema: &str, table: &str) -> String {
    format!("-- No columns found for {schema}.{table}")
}

fn quote_list(names: &[String]) -> String {
    names.iter().map(|n| quote_ident(n)).collect::<Vec<_>>().join(", ")
}

fn degrade(schema: &str, name: &str, err: BurrowError) -> String {
    tracing::warn!(schema, name, label = err.label(), error = %err, "DDL degraded to comment");
    err.to_comment()
}

/// Definition column of a `SHOW CREATE` result: `create_statement` when present,
/// otherwise the last column.
fn create_statement(rs: &ResultSet) -> Result<Option<String>, BurrowError> {
    let Some(row) = rs.rows.first() else {
        return Ok(None);
    };
    let idx = rs
        .columns
        .iter()
        .position(|c| c == "create_statement")
        .unwrap_or_else(|| row.values().len().saturating_sub(1));
    row.opt_text(idx)
}

async fn show_create(
    client: &dyn SqlClient,
    kind: ObjectKind,
    schema: &str,
    name: &str,
) -> Result<String, BurrowError> {
    let sql = format!("SHOW CREATE {} {}", kind.as_str().to_uppercase(), qualified(schema, name)?);
    let rs = client.query(&sql, &[]).await.map_err(BurrowError::into_catalog)?;
    create_statement(&rs)?.ok_or_else(|| {
        BurrowError::ddl_unavailable(format!("no definition returned for {kind} {schema}.{name}"))
    })
}

async fn index_ddl(
    client: &dyn SqlClient,
    object: &DbObject,
    owning_table: Option<&str>,
) -> Result<String, BurrowError> {
    let table = owning_table.ok_or_else(|| {
        BurrowError::ddl_unavailable(format!(
            "owning table unknown for index {}",
            object.qualified_name()
        ))
    })?;

    let table_ddl = show_create(client, ObjectKind::Table, &object.schema, table).await?;
    Ok(filter_index_lines(&table_ddl, &object.name))
}

/// Lines of a table definition that mention `index_name`, or the whole definition if
/// none do.
pub fn filter_index_lines(table_ddl: &str, index_name: &str) -> String {
    let matching: Vec<&str> =
        table_ddl.lines().filter(|line| line.contains(index_name)).map(str::trim).collect();
    if matching.is_empty() {
        table_ddl.to_string()
    } else {
        matching.join("\n")
    }
}

async fn function_ddl(client: &dyn SqlClient, object: &DbObject) -> Result<String, BurrowError> {
    match show_create(client, ObjectKind::Function, &object.schema, &object.name).await {
        Ok(ddl) => Ok(ddl),
        Err(e) if e.is_connectivity() || matches!(e, BurrowError::InvalidIdentifier { .. }) => {
            Err(e)
        }
        Err(e) => Err(BurrowError::ddl_unavailable(format!(
            "SHOW CREATE FUNCTION is not supported by this database version ({e})"
        ))),
    }
}

async fn type_ddl(client: &dyn SqlClient, object: &DbObject) -> Result<String, BurrowError> {
    let params = [Value::from(object.schema.as_str()), Value::from(object.name.as_str())];
    let rs = client
        .query(catalog::DESCRIBE_TYPE, &params)
        .await
        .map_err(BurrowError::into_catalog)?;

    let Some(row) = rs.rows.first() else {
        return Err(BurrowError::ddl_unavailable(format!(
            "type {} not found or unsupported",
            object.qualified_name()
        )));
    };

    let type_kind = row.text(3)?;
    let mut lines = vec![
        format!("-- Type: {}.{}", quote_ident(&object.schema), quote_ident(&object.name)),
        format!("-- OID: {}", row.text(0)?),
        format!("-- Kind: {} ({})", type_kind, type_kind_label(&type_kind)),
        format!("-- Category: {}", row.text(2)?),
        format!("-- Defined: {}", row.bool(4)?),
    ];

    if type_kind == "e" {
        let labels = client
            .query(catalog::TYPE_ENUM_LABELS, &params)
            .await
            .map_err(BurrowError::into_catalog)?;
        let values = labels
            .rows
            .iter()
            .map(|r| r.text(0).map(|l| format!("'{}'", l.replace('\'', "''"))))
            .collect::<Result<Vec<_>, _>>()?;
        lines.push(format!(
            "CREATE TYPE {}.{} AS ENUM ({});",
            quote_ident(&object.schema),
            quote_ident(&object.name),
            values.join(", ")
        ));
    }

    Ok(lines.join("\n"))
}

fn type_kind_label(typtype: &str) -> &'static str {
    match typtype {
        "b" => "base",
        "c" => "composite",
        "d" => "domain",
        "e" => "enum",
        "p" => "pseudo",
        "r" => "range",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{result_set, MockClient};

    fn column(name: &str, data_type: &str, not_null: bool) -> ColumnDescriptor {
        ColumnDescriptor { name: name.into(), data_type: data_type.into(), not_null }
    }

    #[test]
    fn test_compose_orders_sections() {
        let ddl = DdlReconstructor::compose_table_ddl(
            "public",
            "users",
            &[column("id", "UUID", true), column("email", "STRING", false)],
            &["id".to_string()],
            &[UniqueConstraintGroup {
                constraint_name: "users_email_key".into(),
                columns: vec!["email".into()],
            }],
            &[],
        );
        let lines: Vec<&str> = ddl.lines().collect();
        assert_eq!(lines[0], "CREATE TABLE \"public\".\"users\" (");
        assert_eq!(lines[1], "    \"id\" UUID NOT NULL,");
        assert_eq!(lines[2], "    \"email\" STRING,");
        assert_eq!(lines[3], "    PRIMARY KEY (\"id\"),");
        assert_eq!(lines[4], "    CONSTRAINT \"users_email_key\" UNIQUE (\"email\")");
        assert_eq!(lines[5], ");");
    }

    #[test]
    fn test_compose_without_columns_is_placeholder() {
        let ddl = DdlReconstructor::compose_table_ddl("public", "ghost", &[], &[], &[], &[]);
        assert_eq!(ddl, "-- No columns found for public.ghost");
    }

    #[tokio::test]
    async fn test_reconstruct_degrades_catalog_failure() {
        let client = MockClient::new("shop").with_failure(
            catalog::TABLE_COLUMNS,
            "permission denied",
            Some("42501"),
        );
        let ddl = DdlReconstructor::reconstruct_table_ddl(&client, "public", "users").await;
        assert!(ddl.starts_with("-- [CatalogQueryError] "));
        assert!(ddl.contains("permission denied"));
    }

    #[tokio::test]
    async fn test_view_uses_show_create_view() {
        let client = MockClient::new("shop").with_result(
            "SHOW CREATE VIEW \"public\".\"active_users\"",
            result_set(
                &["table_name", "create_statement"],
                &[&[Some("active_users"), Some("CREATE VIEW public.active_users AS SELECT 1")]],
            ),
        );
        let object = DbObject::new(ObjectKind::View, "public", "active_users");
        let ddl = DdlReconstructor::get_object_ddl(&client, &object, None).await;
        assert_eq!(ddl, "CREATE VIEW public.active_users AS SELECT 1");
    }

    #[tokio::test]
    async fn test_index_lines_are_extracted() {
        let table_ddl = "CREATE TABLE public.users (\n\tid UUID NOT NULL,\n\tINDEX users_name_idx (name ASC)\n)";
        let client = MockClient::new("shop").with_result(
            "SHOW CREATE TABLE \"public\".\"users\"",
            result_set(&["table_name", "create_statement"], &[&[Some("users"), Some(table_ddl)]]),
        );
        let object = DbObject::new(ObjectKind::Index, "public", "users_name_idx");
        let ddl = DdlReconstructor::get_object_ddl(&client, &object, Some("users")).await;
        assert_eq!(ddl, "INDEX users_name_idx (name ASC)");
    }

    #[tokio::test]
    async fn test_index_without_owner_is_unavailable() {
        let client = MockClient::new("shop");
        let object = DbObject::new(ObjectKind::Index, "public", "orphan_idx");
        let ddl = DdlReconstructor::get_object_ddl(&client, &object, None).await;
        assert!(ddl.starts_with("-- [DDLUnavailable] "));
        assert!(client.statements().is_empty());
    }

    #[tokio::test]
    async fn test_function_failure_is_unavailable_comment() {
        let client = MockClient::new("shop").with_failure(
            "SHOW CREATE FUNCTION \"public\".\"f\"",
            "syntax error at or near \"function\"",
            Some("42601"),
        );
        let object = DbObject::new(ObjectKind::Function, "public", "f");
        let ddl = DdlReconstructor::get_object_ddl(&client, &object, None).await;
        assert!(ddl.starts_with("-- [DDLUnavailable] "));
        assert!(ddl.contains("not supported by this database version"));
    }

    #[tokio::test]
    async fn test_enum_type_lists_labels() {
        let client = MockClient::new("shop")
            .with_result(
                catalog::DESCRIBE_TYPE,
                result_set(
                    &["oid", "type_name", "category", "type_kind", "is_defined"],
                    &[&[Some("100112"), Some("status"), Some("E"), Some("e"), Some("t")]],
                ),
            )
            .with_result(
                catalog::TYPE_ENUM_LABELS,
                result_set(&["label"], &[&[Some("open")], &[Some("it's done")]]),
            );
        let object = DbObject::new(ObjectKind::Type, "public", "status");
        let ddl = DdlReconstructor::get_object_ddl(&client, &object, None).await;
        assert!(ddl.contains("-- OID: 100112"));
        assert!(ddl.contains("-- Kind: e (enum)"));
        assert!(ddl.ends_with("AS ENUM ('open', 'it''s done');"));
    }

    #[tokio::test]
    async fn test_missing_type_is_comment() {
        let client = MockClient::new("shop");
        let object = DbObject::new(ObjectKind::Type, "public", "nope");
        let ddl = DdlReconstructor::get_object_ddl(&client, &object, None).await;
        assert_eq!(ddl, "-- [DDLUnavailable] DDL unavailable: type public.nope not found or unsupported");
    }

    #[tokio::test]
    async fn test_unknown_kind_names_the_type() {
        let client = MockClient::new("shop");
        let ddl = DdlReconstructor::get_object_ddl_by_kind_name(&client, "trigger", "public", "t", None)
            .await;
        assert!(ddl.starts_with("-- [DDLUnavailable] "));
        assert!(ddl.contains("unsupported object type: trigger"));
    }

    #[tokio::test]
    async fn test_invalid_identifier_never_reaches_server() {
        let client = MockClient::new("shop");
        let object = DbObject::new(ObjectKind::Table, "public", "x; DROP TABLE y");
        let ddl = DdlReconstructor::get_object_ddl(&client, &object, None).await;
        assert!(ddl.starts_with("-- [InvalidInput] "));
        assert!(client.statements().is_empty());
    }
}

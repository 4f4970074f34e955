//! Catalog query library.
//!
//! One fixed statement per metadata facet, written against the `pg_catalog` views
//! CockroachDB exposes. Schema and table names are always bound parameters (`$1` is the
//! schema, `$2` the table); nothing here is built by string concatenation. Each
//! constant documents the column order the metadata repository decodes positionally.

/// Columns of a table in attribute-number order, dropped columns excluded.
///
/// Params: `$1` schema, `$2` table.
/// Columns: `column_name TEXT, data_type TEXT, not_null BOOL`.
pub const TABLE_COLUMNS: &str = r#"
SELECT
    a.attname::TEXT AS column_name,
    pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
    a.attnotnull AS not_null
FROM pg_catalog.pg_attribute a
INNER JOIN pg_catalog.pg_class c ON a.attrelid = c.oid
INNER JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
WHERE n.nspname = $1
  AND c.relname = $2
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;

/// Primary key columns in constraint key order.
///
/// Params: `$1` schema, `$2` table.
/// Columns: `column_name TEXT`.
pub const PRIMARY_KEY_COLUMNS: &str = r#"
SELECT a.attname::TEXT AS column_name
FROM pg_catalog.pg_constraint con
INNER JOIN pg_catalog.pg_class rel ON rel.oid = con.conrelid
INNER JOIN pg_catalog.pg_namespace nsp ON nsp.oid = rel.relnamespace
INNER JOIN pg_catalog.pg_attribute a ON a.attrelid = rel.oid AND a.attnum = ANY(con.conkey)
WHERE con.contype = 'p'
  AND nsp.nspname = $1
  AND rel.relname = $2
ORDER BY array_position(con.conkey, a.attnum)
"#;

/// Default expressions of columns that have one.
///
/// Params: `$1` schema, `$2` table.
/// Columns: `column_name TEXT, default_expr TEXT`.
pub const COLUMN_DEFAULTS: &str = r#"
SELECT
    a.attname::TEXT AS column_name,
    pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS default_expr
FROM pg_catalog.pg_attribute a
INNER JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
INNER JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
INNER JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE n.nspname = $1
  AND c.relname = $2
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;

/// One row per (unique constraint, column), columns in constraint key order.
///
/// Params: `$1` schema, `$2` table.
/// Columns: `constraint_name TEXT, column_name TEXT`.
pub const UNIQUE_CONSTRAINTS: &str = r#"
SELECT
    con.conname::TEXT AS constraint_name,
    a.attname::TEXT AS column_name
FROM pg_catalog.pg_constraint con
INNER JOIN pg_catalog.pg_class rel ON rel.oid = con.conrelid
INNER JOIN pg_catalog.pg_namespace nsp ON nsp.oid = rel.relnamespace
INNER JOIN pg_catalog.pg_attribute a ON a.attrelid = rel.oid AND a.attnum = ANY(con.conkey)
WHERE con.contype = 'u'
  AND nsp.nspname = $1
  AND rel.relname = $2
ORDER BY con.conname, array_position(con.conkey, a.attnum)
"#;

/// Indexes of a table, primary first, then unique, then by name.
///
/// Params: `$1` schema, `$2` table.
/// Columns: `index_name TEXT, is_primary BOOL, is_unique BOOL, index_def TEXT`.
pub const TABLE_INDEXES: &str = r#"
SELECT
    idx.relname::TEXT AS index_name,
    ix.indisprimary AS is_primary,
    ix.indisunique AS is_unique,
    pg_catalog.pg_get_indexdef(ix.indexrelid) AS index_def
FROM pg_catalog.pg_index ix
INNER JOIN pg_catalog.pg_class tbl ON tbl.oid = ix.indrelid
INNER JOIN pg_catalog.pg_namespace nsp ON nsp.oid = tbl.relnamespace
INNER JOIN pg_catalog.pg_class idx ON idx.oid = ix.indexrelid
WHERE nsp.nspname = $1
  AND tbl.relname = $2
ORDER BY ix.indisprimary DESC, ix.indisunique DESC, idx.relname
"#;

/// Foreign keys, one row per local/referenced column pair, paired by key position.
///
/// Params: `$1` schema, `$2` table.
/// Columns: `fk_name TEXT, column_name TEXT, ref_schema TEXT, ref_table TEXT, ref_column TEXT`.
pub const FOREIGN_KEYS: &str = r#"
SELECT
    con.conname::TEXT AS fk_name,
    src_col.attname::TEXT AS column_name,
    ref_nsp.nspname::TEXT AS ref_schema,
    ref_rel.relname::TEXT AS ref_table,
    ref_col.attname::TEXT AS ref_column
FROM pg_catalog.pg_constraint con
INNER JOIN pg_catalog.pg_class src_rel ON src_rel.oid = con.conrelid
INNER JOIN pg_catalog.pg_namespace src_nsp ON src_nsp.oid = src_rel.relnamespace
INNER JOIN pg_catalog.pg_class ref_rel ON ref_rel.oid = con.confrelid
INNER JOIN pg_catalog.pg_namespace ref_nsp ON ref_nsp.oid = ref_rel.relnamespace
CROSS JOIN generate_subscripts(con.conkey, 1) AS k(i)
INNER JOIN pg_catalog.pg_attribute src_col
    ON src_col.attrelid = src_rel.oid AND src_col.attnum = con.conkey[k.i]
INNER JOIN pg_catalog.pg_attribute ref_col
    ON ref_col.attrelid = ref_rel.oid AND ref_col.attnum = con.confkey[k.i]
WHERE con.contype = 'f'
  AND src_nsp.nspname = $1
  AND src_rel.relname = $2
ORDER BY con.conname, k.i
"#;

/// Databases visible to the current user.
///
/// Columns: `database_name TEXT, ...` (only the first column is read).
pub const LIST_DATABASES: &str = "SHOW DATABASES";

/// User schemas, system namespaces excluded.
///
/// Columns: `schema_name TEXT`.
pub const LIST_SCHEMAS: &str = r#"
SELECT n.nspname::TEXT AS schema_name
FROM pg_catalog.pg_namespace n
WHERE n.nspname NOT LIKE 'pg\_%'
  AND n.nspname <> 'information_schema'
  AND n.nspname <> 'crdb_internal'
ORDER BY n.nspname
"#;

/// Ordinary tables of a schema.
///
/// Params: `$1` schema. Columns: `schema_name TEXT, table_name TEXT`.
pub const LIST_TABLES: &str = r#"
SELECT n.nspname::TEXT AS schema_name, c.relname::TEXT AS table_name
FROM pg_catalog.pg_class c
INNER JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind = 'r'
  AND n.nspname = $1
ORDER BY c.relname
"#;

/// Views of a schema.
///
/// Params: `$1` schema. Columns: `schema_name TEXT, view_name TEXT`.
pub const LIST_VIEWS: &str = r#"
SELECT n.nspname::TEXT AS schema_name, c.relname::TEXT AS view_name
FROM pg_catalog.pg_class c
INNER JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind IN ('v', 'm')
  AND n.nspname = $1
ORDER BY c.relname
"#;

/// Indexes of a schema with their owning tables.
///
/// Params: `$1` schema. Columns: `schema_name TEXT, table_name TEXT, index_name TEXT`.
pub const LIST_INDEXES: &str = r#"
SELECT
    ns.nspname::TEXT AS schema_name,
    t.relname::TEXT AS table_name,
    i.relname::TEXT AS index_name
FROM pg_catalog.pg_index ix
INNER JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
INNER JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
INNER JOIN pg_catalog.pg_namespace ns ON ns.oid = t.relnamespace
WHERE ns.nspname = $1
ORDER BY t.relname, i.relname
"#;

/// Functions of a schema; overloads collapse to one row.
///
/// Params: `$1` schema. Columns: `schema_name TEXT, routine_name TEXT`.
pub const LIST_FUNCTIONS: &str = r#"
SELECT DISTINCT n.nspname::TEXT AS schema_name, p.proname::TEXT AS routine_name
FROM pg_catalog.pg_proc p
INNER JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
WHERE n.nspname = $1
ORDER BY routine_name
"#;

/// Sequences of a schema.
///
/// Params: `$1` schema. Columns: `schema_name TEXT, sequence_name TEXT`.
pub const LIST_SEQUENCES: &str = r#"
SELECT n.nspname::TEXT AS schema_name, c.relname::TEXT AS sequence_name
FROM pg_catalog.pg_class c
INNER JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind = 'S'
  AND n.nspname = $1
ORDER BY c.relname
"#;

/// Standalone types of a schema (row types of relations and array types excluded).
///
/// Params: `$1` schema. Columns: `schema_name TEXT, type_name TEXT`.
pub const LIST_TYPES: &str = r#"
SELECT n.nspname::TEXT AS schema_name, t.typname::TEXT AS type_name
FROM pg_catalog.pg_type t
INNER JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
WHERE n.nspname = $1
  AND t.typrelid = 0
  AND t.typcategory <> 'A'
ORDER BY t.typname
"#;

/// Descriptive facts about one type, used in place of native type DDL.
///
/// Params: `$1` schema, `$2` type name.
/// Columns: `oid INT8, type_name TEXT, category TEXT, type_kind TEXT, is_defined BOOL`.
pub const DESCRIBE_TYPE: &str = r#"
SELECT
    t.oid::INT8 AS oid,
    t.typname::TEXT AS type_name,
    t.typcategory::TEXT AS category,
    t.typtype::TEXT AS type_kind,
    t.typisdefined AS is_defined
FROM pg_catalog.pg_type t
INNER JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
WHERE n.nspname = $1
  AND t.typname = $2
"#;

/// Enum labels of a type in sort order. Empty for non-enum types.
///
/// Params: `$1` schema, `$2` type name. Columns: `label TEXT`.
pub const TYPE_ENUM_LABELS: &str = r#"
SELECT e.enumlabel::TEXT AS label
FROM pg_catalog.pg_enum e
INNER JOIN pg_catalog.pg_type t ON t.oid = e.enumtypid
INNER JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
WHERE n.nspname = $1
  AND t.typname = $2
ORDER BY e.enumsortorder
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const PER_TABLE: [&str; 6] = [
        TABLE_COLUMNS,
        PRIMARY_KEY_COLUMNS,
        COLUMN_DEFAULTS,
        UNIQUE_CONSTRAINTS,
        TABLE_INDEXES,
        FOREIGN_KEYS,
    ];

    const PER_SCHEMA: [&str; 6] =
        [LIST_TABLES, LIST_VIEWS, LIST_INDEXES, LIST_FUNCTIONS, LIST_SEQUENCES, LIST_TYPES];

    #[test]
    fn test_per_table_queries_bind_schema_and_table() {
        for sql in PER_TABLE {
            assert!(sql.contains("= $1"), "missing schema parameter in {sql}");
            assert!(sql.contains("= $2"), "missing table parameter in {sql}");
            assert!(!sql.contains("$3"));
        }
    }

    #[test]
    fn test_per_schema_queries_bind_only_schema() {
        for sql in PER_SCHEMA {
            assert!(sql.contains("= $1"));
            assert!(!sql.contains("$2"));
        }
    }

    #[test]
    fn test_columns_exclude_dropped_and_system_attributes() {
        assert!(TABLE_COLUMNS.contains("a.attnum > 0"));
        assert!(TABLE_COLUMNS.contains("NOT a.attisdropped"));
        assert!(TABLE_COLUMNS.trim_end().ends_with("ORDER BY a.attnum"));
    }
}

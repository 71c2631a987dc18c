use crate::domain::row::Row;
use crate::domain::value_objects::{ColumnName, Schema, TableName};
use crate::infrastructure::db::dialect::QueryDialect;
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Query builders — reads
// ─────────────────────────────────────────────────────────────────────────────

/// Build a `SELECT * FROM <schema>.<table> ORDER BY <pk_col>` query.
/// Used for SQLite (no introspection needed) and as the fallback path.
pub fn build_select_query(schema: &Schema, table: &TableName, pk_col: &ColumnName, dialect: &dyn QueryDialect) -> String {
    let prefix = dialect.schema_prefix(&schema.0);
    let table_q = dialect.quote_ident(&table.0);
    let order_col = dialect.quote_ident(&pk_col.0);
    format!("SELECT * FROM {}{} ORDER BY {}", prefix, table_q, order_col)
}

/// Build a typed SELECT where every column whose `information_schema.data_type`
/// is not natively supported by `sqlx::AnyRow` is wrapped in the dialect cast
/// expression (e.g. `::TEXT` for PostgreSQL, `CONVERT(… USING utf8mb4)` for MySQL).
///
/// `col_types` is a vec of `(column_name, data_type)` pairs in ordinal order,
/// obtained from `information_schema.columns`.
pub fn build_typed_select_query(
    schema: &Schema,
    table: &TableName,
    pk_col: &ColumnName,
    col_types: &[(String, String)],
    dialect: &dyn QueryDialect,
) -> String {
    let prefix = dialect.schema_prefix(&schema.0);
    let table_q = dialect.quote_ident(&table.0);

    let col_exprs: Vec<String> = col_types
        .iter()
        .map(|(col_name, data_type)| {
            let q = dialect.quote_ident(col_name);
            if dialect.is_native_type(data_type) {
                q
            } else {
                dialect.cast_to_text(&q)
            }
        })
        .collect();

    let order_col = dialect.quote_ident(&pk_col.0);
    format!("SELECT {} FROM {}{} ORDER BY {}", col_exprs.join(", "), prefix, table_q, order_col)
}

// ─────────────────────────────────────────────────────────────────────────────
// Query builders — writes (bound parameters, never literal-embedded)
// ─────────────────────────────────────────────────────────────────────────────

/// Build a parameterized `INSERT INTO … VALUES (…)`. Column order matches
/// `columns`; bind values in the same order.
pub fn build_insert_query(schema: &Schema, table: &TableName, columns: &[String], dialect: &dyn QueryDialect) -> String {
    let prefix = dialect.schema_prefix(&schema.0);
    let table_q = dialect.quote_ident(&table.0);
    let col_list = columns.iter().map(|c| dialect.quote_ident(c)).collect::<Vec<_>>().join(", ");
    let placeholders = (1..=columns.len()).map(|i| dialect.placeholder(i)).collect::<Vec<_>>().join(", ");
    format!("INSERT INTO {}{} ({}) VALUES ({})", prefix, table_q, col_list, placeholders)
}

/// Build a parameterized `UPDATE … SET … WHERE pk = ?`. The PK placeholder
/// is bound last.
pub fn build_update_query(
    schema: &Schema,
    table: &TableName,
    pk_col: &ColumnName,
    columns: &[String],
    dialect: &dyn QueryDialect,
) -> String {
    let prefix = dialect.schema_prefix(&schema.0);
    let table_q = dialect.quote_ident(&table.0);
    let set_clause = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", dialect.quote_ident(c), dialect.placeholder(i + 1)))
        .collect::<Vec<_>>()
        .join(", ");
    let pk_placeholder = dialect.placeholder(columns.len() + 1);
    format!(
        "UPDATE {}{} SET {} WHERE {} = {}",
        prefix,
        table_q,
        set_clause,
        dialect.quote_ident(&pk_col.0),
        pk_placeholder
    )
}

/// Build a parameterized `DELETE FROM … WHERE pk = ?`.
pub fn build_delete_query(schema: &Schema, table: &TableName, pk_col: &ColumnName, dialect: &dyn QueryDialect) -> String {
    let prefix = dialect.schema_prefix(&schema.0);
    let table_q = dialect.quote_ident(&table.0);
    format!("DELETE FROM {}{} WHERE {} = {}", prefix, table_q, dialect.quote_ident(&pk_col.0), dialect.placeholder(1))
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Canonical string form of a row's primary key cell (used as a lookup key).
pub fn pk_key(row: &Row, pk_col: &ColumnName) -> String {
    row.get(&pk_col.0)
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "NULL".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::dialect::{MysqlDialect, PostgresDialect, SqliteDialect};

    fn pg() -> PostgresDialect {
        PostgresDialect
    }
    fn my() -> MysqlDialect {
        MysqlDialect
    }
    fn sq() -> SqliteDialect {
        SqliteDialect
    }

    #[test]
    fn test_build_select_query_postgres() {
        let schema = Schema("sandbox".into());
        let table = TableName("widgets".into());
        let pk = ColumnName("id".into());
        let q = build_select_query(&schema, &table, &pk, &pg());
        assert_eq!(q, r#"SELECT * FROM "sandbox"."widgets" ORDER BY "id""#);
    }

    #[test]
    fn test_build_select_query_mysql() {
        let schema = Schema("mydb".into());
        let table = TableName("widgets".into());
        let pk = ColumnName("id".into());
        let q = build_select_query(&schema, &table, &pk, &my());
        assert_eq!(q, "SELECT * FROM `mydb`.`widgets` ORDER BY `id`");
    }

    #[test]
    fn test_build_select_query_sqlite() {
        let schema = Schema("ignored".into());
        let table = TableName("widgets".into());
        let pk = ColumnName("id".into());
        let q = build_select_query(&schema, &table, &pk, &sq());
        assert_eq!(q, r#"SELECT * FROM "widgets" ORDER BY "id""#);
    }

    #[test]
    fn test_build_typed_select_query_postgres_casts_non_primitives() {
        let schema = Schema("sandbox".into());
        let table = TableName("widgets".into());
        let pk = ColumnName("id".into());
        let col_types = vec![
            ("id".to_string(), "integer".to_string()),
            ("name".to_string(), "character varying".to_string()),
            ("price".to_string(), "numeric".to_string()),
            ("active".to_string(), "boolean".to_string()),
        ];
        let q = build_typed_select_query(&schema, &table, &pk, &col_types, &pg());
        assert!(!q.contains(r#""id"::TEXT"#));
        assert!(!q.contains(r#""active"::TEXT"#));
        assert!(q.contains(r#""name"::TEXT"#));
        assert!(q.contains(r#""price"::TEXT"#));
        assert!(q.contains(r#"ORDER BY "id""#));
    }

    #[test]
    fn test_build_typed_select_query_mysql_uses_convert() {
        let schema = Schema("source_db".into());
        let table = TableName("widgets".into());
        let pk = ColumnName("id".into());
        let col_types = vec![
            ("id".to_string(), "int".to_string()),
            ("discount_rate".to_string(), "decimal".to_string()),
            ("is_active".to_string(), "tinyint".to_string()),
        ];
        let q = build_typed_select_query(&schema, &table, &pk, &col_types, &my());
        assert!(!q.contains("CONVERT(`id`"), "int should not be cast");
        assert!(q.contains("CONVERT(`is_active` USING utf8mb4)"));
        assert!(q.contains("CONVERT(`discount_rate` USING utf8mb4)"));
        assert!(!q.contains("::TEXT"));
        assert!(q.contains("ORDER BY `id`"));
    }

    #[test]
    fn test_build_insert_query_postgres_uses_numbered_placeholders() {
        let schema = Schema("public".into());
        let table = TableName("widgets".into());
        let q = build_insert_query(&schema, &table, &["id".into(), "name".into()], &pg());
        assert_eq!(q, r#"INSERT INTO "public"."widgets" ("id", "name") VALUES ($1, $2)"#);
    }

    #[test]
    fn test_build_insert_query_mysql_uses_bare_placeholders() {
        let schema = Schema("public".into());
        let table = TableName("widgets".into());
        let q = build_insert_query(&schema, &table, &["id".into(), "name".into()], &my());
        assert_eq!(q, "INSERT INTO `public`.`widgets` (`id`, `name`) VALUES (?, ?)");
    }

    #[test]
    fn test_build_update_query_binds_pk_last() {
        let schema = Schema("public".into());
        let table = TableName("widgets".into());
        let pk = ColumnName("id".into());
        let q = build_update_query(&schema, &table, &pk, &["name".into(), "price".into()], &pg());
        assert_eq!(q, r#"UPDATE "public"."widgets" SET "name" = $1, "price" = $2 WHERE "id" = $3"#);
    }

    #[test]
    fn test_build_delete_query() {
        let schema = Schema("public".into());
        let table = TableName("widgets".into());
        let pk = ColumnName("id".into());
        let q = build_delete_query(&schema, &table, &pk, &sq());
        assert_eq!(q, r#"DELETE FROM "widgets" WHERE "id" = ?"#);
    }

    #[test]
    fn test_pk_key_string_value_not_quoted() {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::String("abc".to_string()));
        assert_eq!(pk_key(&row, &ColumnName("id".into())), "abc");
    }

    #[test]
    fn test_pk_key_number_value_stringified() {
        let mut row = Row::new();
        row.insert("id".to_string(), serde_json::json!(42));
        assert_eq!(pk_key(&row, &ColumnName("id".into())), "42");
    }
}

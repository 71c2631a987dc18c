use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::any::{AnyArguments, AnyPoolOptions};
use sqlx::{Arguments, AnyPool};
use tracing::debug;

use crate::domain::ports::TableStore;
use crate::domain::row::Row;
use crate::domain::value_objects::{ColumnName, Schema, TableName};
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::dialect::{from_driver, Dialect};
use crate::infrastructure::db::row_mapper::row_to_map;
use crate::infrastructure::db::sql_utils::{
    build_delete_query, build_insert_query, build_select_query, build_typed_select_query, build_update_query,
};

/// The database-side `TableStore`, backed by `sqlx::AnyPool`. Reads use the
/// dialect's typed-SELECT/introspection path the way the teacher's row
/// repository did; writes are parameterized — values are bound, never
/// embedded as SQL literals, because unlike an export file this SQL
/// actually executes against a live database.
pub struct SqlxTableStore {
    pool: AnyPool,
    dialect: Arc<dyn Dialect>,
    schema: Schema,
    table: TableName,
    primary_key_column: ColumnName,
}

/// Connect to the database described in `cfg` and return a `SqlxTableStore`
/// for `primary_key_column`.
pub async fn connect(cfg: &DbConfig, primary_key_column: &str) -> Result<SqlxTableStore> {
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.url())
        .await
        .with_context(|| format!("Failed to connect to {} (driver: {})", cfg.dbname, cfg.driver))?;

    debug!("Connected to {}/{} via {} driver", cfg.host, cfg.dbname, cfg.driver);

    Ok(SqlxTableStore {
        pool,
        dialect: Arc::from(from_driver(&cfg.driver)),
        schema: Schema(cfg.schema.clone()),
        table: TableName(cfg.table.clone()),
        primary_key_column: ColumnName(primary_key_column.to_string()),
    })
}

/// Read a column from an AnyRow as String, handling MySQL's habit of returning
/// information_schema string columns as BLOB to sqlx AnyRow.
fn blob_or_string(row: &sqlx::any::AnyRow, idx: usize) -> Result<String> {
    use sqlx::{Column, Row as SqlxRow, TypeInfo};
    let type_name = row.column(idx).type_info().name();
    if type_name == "BLOB" {
        let bytes: Vec<u8> = row.try_get(idx)?;
        Ok(String::from_utf8(bytes).unwrap_or_default())
    } else {
        Ok(row.try_get(idx)?)
    }
}

async fn fetch_column_types(pool: &AnyPool, schema: &Schema, table: &TableName, dialect: &dyn Dialect) -> Result<Vec<(String, String)>> {
    let sql = dialect.introspect_sql();

    let rows = sqlx::query(sql)
        .bind(&schema.0)
        .bind(&table.0)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to fetch column types for {}.{}", schema.0, table.0))?;

    let mut cols = Vec::with_capacity(rows.len());
    for row in &rows {
        let col_name = blob_or_string(row, 0)?;
        let data_type = blob_or_string(row, 1)?;
        cols.push((col_name, data_type));
    }
    Ok(cols)
}

/// Bind a loosely-typed JSON cell into an `Any` argument list. Arrays and
/// objects are bound as their serialized JSON text — the same
/// representation the dialect's `sql_literal` uses for export text.
fn bind_value<'a>(args: &mut AnyArguments<'a>, value: &'a Value) -> Result<()> {
    match value {
        Value::Null => args.add(None::<String>)?,
        Value::Bool(b) => args.add(*b)?,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                args.add(i)?;
            } else if let Some(f) = n.as_f64() {
                args.add(f)?;
            } else {
                args.add(n.to_string())?;
            }
        }
        Value::String(s) => args.add(s.as_str())?,
        Value::Array(_) | Value::Object(_) => args.add(serde_json::to_string(value).unwrap_or_default())?,
    }
    Ok(())
}

#[async_trait]
impl TableStore for SqlxTableStore {
    async fn read_all(&self) -> Result<Vec<Row>> {
        let (query, col_types_map) = if self.dialect.needs_introspection() {
            let col_types = fetch_column_types(&self.pool, &self.schema, &self.table, self.dialect.as_ref()).await?;
            let q = build_typed_select_query(&self.schema, &self.table, &self.primary_key_column, &col_types, self.dialect.as_ref());
            let type_map: BTreeMap<String, String> = col_types.into_iter().collect();
            (q, type_map)
        } else {
            (
                build_select_query(&self.schema, &self.table, &self.primary_key_column, self.dialect.as_ref()),
                BTreeMap::new(),
            )
        };

        debug!("Executing: {}", query);

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query {}.{}", self.schema.0, self.table.0))?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            result.push(row_to_map(row, &col_types_map, self.dialect.as_ref())?);
        }
        Ok(result)
    }

    async fn insert(&self, row: &Row) -> Result<()> {
        let columns: Vec<String> = row.keys().cloned().collect();
        let query = build_insert_query(&self.schema, &self.table, &columns, self.dialect.as_ref());

        let mut args = AnyArguments::default();
        for col in &columns {
            bind_value(&mut args, &row[col])?;
        }

        sqlx::query_with(&query, args)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert into {}.{}", self.schema.0, self.table.0))?;
        Ok(())
    }

    async fn update(&self, pk: &str, delta: &Row) -> Result<()> {
        let columns: Vec<String> = delta.keys().cloned().collect();
        if columns.is_empty() {
            return Ok(());
        }
        let query = build_update_query(&self.schema, &self.table, &self.primary_key_column, &columns, self.dialect.as_ref());

        let mut args = AnyArguments::default();
        for col in &columns {
            bind_value(&mut args, &delta[col])?;
        }
        args.add(pk)?;

        let result = sqlx::query_with(&query, args)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to update {}.{} pk={}", self.schema.0, self.table.0, pk))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("update affected no rows for pk={pk} in {}.{}", self.schema.0, self.table.0);
        }
        Ok(())
    }

    async fn delete(&self, pk: &str) -> Result<()> {
        let query = build_delete_query(&self.schema, &self.table, &self.primary_key_column, self.dialect.as_ref());
        let result = sqlx::query(&query)
            .bind(pk)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete from {}.{} pk={}", self.schema.0, self.table.0, pk))?;

        if result.rows_affected() == 0 {
            tracing::warn!(pk, table = %self.table.0, "delete affected no rows");
        }
        Ok(())
    }

    async fn schema(&self) -> Result<Vec<(String, String)>> {
        fetch_column_types(&self.pool, &self.schema, &self.table, self.dialect.as_ref()).await
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::ports::TableStore;
use crate::domain::row::Row;
use crate::infrastructure::config::SheetConfig;
use crate::infrastructure::sheet::columns::column_letter;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// The spreadsheet-side `TableStore`, backed by the Google Sheets API v4.
/// The sheet's first row is always the header; column order there defines
/// column order everywhere else. Authentication is a single bearer token,
/// refreshed outside this crate — unlike the database side there is no
/// connection pool, each call is a standalone HTTP request.
pub struct SheetTableStore {
    client: reqwest::Client,
    spreadsheet_id: String,
    sheet_tab: String,
    bearer_token: String,
    primary_key_column: String,
}

pub fn connect(cfg: &SheetConfig, primary_key_column: &str) -> SheetTableStore {
    SheetTableStore {
        client: reqwest::Client::new(),
        spreadsheet_id: cfg.spreadsheet_id.clone(),
        sheet_tab: cfg.sheet_tab.clone(),
        bearer_token: cfg.bearer_token.clone(),
        primary_key_column: primary_key_column.to_string(),
    }
}

/// A fetched grid: header row plus data rows, both as raw JSON cell values.
struct Grid {
    header: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl SheetTableStore {
    async fn fetch_grid(&self) -> Result<Grid> {
        // Open-ended range: no row bound, and ZZ (702 columns) comfortably
        // past the old 26-column ceiling without requiring a header read first.
        let range = format!("{}!A:ZZ", self.sheet_tab);
        let url = format!("{}/{}/values/{}", SHEETS_API, self.spreadsheet_id, range);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&[("valueRenderOption", "UNFORMATTED_VALUE")])
            .send()
            .await
            .context("Sheets values.get request failed")?;

        let status = resp.status();
        let body = resp.text().await.context("reading Sheets values.get response body")?;
        if !status.is_success() {
            anyhow::bail!("Sheets values.get failed (HTTP {status}): {body}");
        }

        let json: Value = serde_json::from_str(&body).context("parsing Sheets values.get response")?;
        let values = json["values"].as_array().cloned().unwrap_or_default();

        let mut iter = values.into_iter();
        let header: Vec<String> = iter
            .next()
            .and_then(|row| row.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect();

        let rows: Vec<Vec<Value>> = iter.map(|row| row.as_array().cloned().unwrap_or_default()).collect();

        Ok(Grid { header, rows })
    }

    async fn write_range(&self, range: &str, values: Vec<Vec<Value>>) -> Result<()> {
        let url = format!("{}/{}/values/{}", SHEETS_API, self.spreadsheet_id, range);
        let body = serde_json::json!({ "range": range, "majorDimension": "ROWS", "values": values });

        let resp = self
            .client
            .put(&url)
            .bearer_auth(&self.bearer_token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await
            .context("Sheets values.update request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Sheets values.update failed (HTTP {status}): {body}");
        }
        Ok(())
    }

    async fn append_row(&self, values: Vec<Value>) -> Result<()> {
        let range = format!("{}!A1", self.sheet_tab);
        let url = format!("{}/{}/values/{}:append", SHEETS_API, self.spreadsheet_id, range);
        let body = serde_json::json!({ "majorDimension": "ROWS", "values": [values] });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&body)
            .send()
            .await
            .context("Sheets values.append request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Sheets values.append failed (HTTP {status}): {body}");
        }
        Ok(())
    }

    /// Locate a row's 1-based sheet row number by scanning the primary key
    /// column. Unlike the original client's `A:Z` scan, this walks however
    /// many columns the header actually has.
    async fn find_row_number(&self, grid: &Grid, pk_col_idx: usize, pk: &str) -> Option<usize> {
        for (i, row) in grid.rows.iter().enumerate() {
            let cell = row.get(pk_col_idx).map(cell_to_string).unwrap_or_default();
            if cell == pk {
                return Some(i + 2); // +1 for header, +1 for 1-based indexing
            }
        }
        None
    }
}

fn cell_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TableStore for SheetTableStore {
    async fn read_all(&self) -> Result<Vec<Row>> {
        let grid = self.fetch_grid().await?;
        let mut out = Vec::with_capacity(grid.rows.len());
        for row in &grid.rows {
            let mut map = Row::new();
            for (i, col_name) in grid.header.iter().enumerate() {
                let value = row.get(i).cloned().unwrap_or(Value::Null);
                map.insert(col_name.clone(), value);
            }
            out.push(map);
        }
        Ok(out)
    }

    async fn insert(&self, row: &Row) -> Result<()> {
        let grid = self.fetch_grid().await?;
        let header = if grid.header.is_empty() {
            let header: Vec<String> = row.keys().cloned().collect();
            self.write_range(&format!("{}!A1", self.sheet_tab), vec![header.iter().map(|h| Value::String(h.clone())).collect()])
                .await?;
            header
        } else {
            grid.header.clone()
        };

        let values: Vec<Value> = header.iter().map(|col| row.get(col).cloned().unwrap_or(Value::Null)).collect();
        self.append_row(values).await
    }

    async fn update(&self, pk: &str, delta: &Row) -> Result<()> {
        let grid = self.fetch_grid().await?;
        if grid.header.is_empty() {
            anyhow::bail!("sheet has no header row, cannot locate pk column");
        }
        let Some(pk_col_idx) = grid.header.iter().position(|c| c == &self.primary_key_column) else {
            anyhow::bail!("primary key column '{}' missing from sheet header", self.primary_key_column);
        };

        let Some(row_number) = self.find_row_number(&grid, pk_col_idx, pk).await else {
            warn!(pk, "update: no row found, treating as already absent");
            return Ok(());
        };

        for (col_name, value) in delta {
            let Some(col_idx) = grid.header.iter().position(|c| c == col_name) else {
                warn!(column = %col_name, "update: column absent from sheet header, skipping");
                continue;
            };
            let cell_range = format!("{}!{}{}", self.sheet_tab, column_letter(col_idx), row_number);
            self.write_range(&cell_range, vec![vec![value.clone()]]).await?;
        }
        Ok(())
    }

    async fn delete(&self, pk: &str) -> Result<()> {
        let grid = self.fetch_grid().await?;
        let Some(pk_col_idx) = grid.header.iter().position(|c| c == &self.primary_key_column) else {
            warn!(pk, "delete: primary key column missing from sheet header, treating as already deleted");
            return Ok(());
        };
        let Some(row_number) = self.find_row_number(&grid, pk_col_idx, pk).await else {
            warn!(pk, "delete: no row found, treating as already deleted");
            return Ok(());
        };

        let clear_range = format!("{}!A{}:{}{}", self.sheet_tab, row_number, column_letter(grid.header.len().saturating_sub(1)), row_number);
        let url = format!("{}/{}/values/{}:clear", SHEETS_API, self.spreadsheet_id, clear_range);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .context("Sheets values.clear request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Sheets values.clear failed (HTTP {status}): {body}");
        }
        debug!(pk, row_number, "cleared row");
        Ok(())
    }

    async fn schema(&self) -> Result<Vec<(String, String)>> {
        let grid = self.fetch_grid().await?;
        Ok(grid.header.into_iter().map(|name| (name, "text".to_string())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_to_string_handles_null_and_number() {
        assert_eq!(cell_to_string(&Value::Null), "");
        assert_eq!(cell_to_string(&serde_json::json!(42)), "42");
        assert_eq!(cell_to_string(&Value::String("abc".into())), "abc");
    }
}

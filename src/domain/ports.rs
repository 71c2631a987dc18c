use anyhow::Result;
use async_trait::async_trait;

use crate::domain::report::CycleReport;
use crate::domain::row::Row;

/// Port: a peer's table surface, implemented once per side (Postgres/
/// MySQL/MariaDB/SQLite for the database side, the Sheets API v4 HTTP
/// client for the spreadsheet side).
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Returns all rows with all columns; an empty result is legal.
    async fn read_all(&self) -> Result<Vec<Row>>;

    /// Adds a new row. Primary-key uniqueness is the caller's
    /// responsibility.
    async fn insert(&self, row: &Row) -> Result<()>;

    /// Updates only the provided columns on the row identified by `pk`.
    async fn update(&self, pk: &str, delta: &Row) -> Result<()>;

    /// Removes the row identified by `pk`.
    async fn delete(&self, pk: &str) -> Result<()>;

    /// Informational only; not on the hot path.
    async fn schema(&self) -> Result<Vec<(String, String)>>;
}

/// Port: output formatting for a cycle's audit report (JsonWriter,
/// SqlWriter).
pub trait OutputWriter: Send + Sync {
    fn format(&self, report: &CycleReport) -> Result<String>;
    fn extension(&self) -> &'static str;
}

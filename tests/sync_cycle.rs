//! Black-box integration tests: a real SQLite-backed `TableStore` on the
//! database side, an in-memory double on the spreadsheet side, driven
//! through a whole `SyncOrchestrator` cycle. No network involved.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use syncly::domain::row::canonical_string;
use syncly::{DbConfig, InitialSyncSource, Row, SyncConfig, SyncOrchestrator, TableStore};

struct FakeSheet {
    rows: StdMutex<Vec<Row>>,
}

impl FakeSheet {
    fn new(rows: Vec<Row>) -> Self {
        Self { rows: StdMutex::new(rows) }
    }

    fn pk(row: &Row) -> String {
        canonical_string(row.get("id"))
    }
}

#[async_trait]
impl TableStore for FakeSheet {
    async fn read_all(&self) -> Result<Vec<Row>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn insert(&self, row: &Row) -> Result<()> {
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn update(&self, pk: &str, delta: &Row) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| Self::pk(r) == pk)
            .ok_or_else(|| anyhow::anyhow!("no row with pk {pk}"))?;
        for (k, v) in delta {
            row.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    async fn delete(&self, pk: &str) -> Result<()> {
        self.rows.lock().unwrap().retain(|r| Self::pk(r) != pk);
        Ok(())
    }

    async fn schema(&self) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}

fn row(id: i64, name: &str, last_modified: &str) -> Row {
    let mut r = Row::new();
    r.insert("id".to_string(), json!(id));
    r.insert("name".to_string(), json!(name));
    r.insert("last_modified".to_string(), json!(last_modified));
    r
}

/// Stands up a real, file-backed SQLite `TableStore` with the table already
/// created. A temp file (not `:memory:`) avoids the multiple-connections
/// each seeing a private in-memory database surprise that an `AnyPool`
/// with more than one connection runs into against `sqlite::memory:`.
async fn sqlite_db_store(path: &str) -> syncly::infrastructure::db::store::SqlxTableStore {
    sqlx::any::install_default_drivers();
    let pool = sqlx::AnyPool::connect(&format!("sqlite://{path}")).await.unwrap();
    sqlx::query("CREATE TABLE IF NOT EXISTS contacts (id TEXT PRIMARY KEY, name TEXT, last_modified TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let cfg = DbConfig {
        driver: "sqlite".to_string(),
        host: String::new(),
        port: 0,
        dbname: path.to_string(),
        user: String::new(),
        password: String::new(),
        schema: "main".to_string(),
        table: "contacts".to_string(),
    };
    syncly::infrastructure::db::store::connect(&cfg, "id").await.unwrap()
}

fn sync_config() -> SyncConfig {
    SyncConfig {
        primary_key_column: "id".to_string(),
        timestamp_column: "last_modified".to_string(),
        sync_interval_seconds: 3600,
        initial_sync_source: InitialSyncSource::Db,
        log_level: Default::default(),
    }
}

#[tokio::test]
async fn initial_sync_copies_db_rows_to_empty_sheet() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap().to_string();
    let db = sqlite_db_store(&path).await;
    db.insert(&row(1, "A", "2026-01-01 00:00:00")).await.unwrap();
    db.insert(&row(2, "B", "2026-01-01 00:00:00")).await.unwrap();

    let sheet = Arc::new(FakeSheet::new(vec![]));
    let orchestrator = Arc::new(SyncOrchestrator::new(Arc::new(db), sheet.clone(), &sync_config()));

    // `start()` runs initial_sync once, then loops on a 3600s interval;
    // stop it right after the first cycle settles instead of waiting.
    let handle = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.start().await }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    orchestrator.stop();
    handle.await.unwrap().unwrap();

    let sheet_rows = sheet.read_all().await.unwrap();
    assert_eq!(sheet_rows.len(), 2);
    assert!(orchestrator.status().cycle_count >= 1);
}

#[tokio::test]
async fn sheet_edit_with_newer_timestamp_propagates_to_sqlite() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap().to_string();
    let db = sqlite_db_store(&path).await;
    db.insert(&row(2, "B", "2026-01-14 10:00:00")).await.unwrap();

    let sheet = Arc::new(FakeSheet::new(vec![]));
    let db = Arc::new(db);
    let orchestrator = SyncOrchestrator::new(db.clone(), sheet.clone(), &sync_config());

    // Seed matching baselines the way `start()`'s initial sync would.
    for r in db.read_all().await.unwrap() {
        sheet.insert(&r).await.unwrap();
    }
    let idle = orchestrator.run_cycle().await.unwrap();
    assert!(idle.is_empty(), "first cycle after matching baselines should see no drift");

    // External edit: sheet row id=2 renamed with a newer timestamp.
    sheet.update("2", &row(2, "B-prime", "2026-01-14 12:00:00")).await.unwrap();

    let report = orchestrator.run_cycle().await.unwrap();
    assert_eq!(report.applied_to_db.len(), 1);

    let db_rows = db.read_all().await.unwrap();
    assert_eq!(db_rows[0]["name"], json!("B-prime"));
}

#[tokio::test]
async fn stale_db_edit_is_discarded_in_favor_of_newer_sheet_edit() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap().to_string();
    let db = sqlite_db_store(&path).await;
    db.insert(&row(5, "Ann", "2026-02-01 08:00:00")).await.unwrap();

    let sheet = Arc::new(FakeSheet::new(vec![]));
    let db = Arc::new(db);
    let orchestrator = SyncOrchestrator::new(db.clone(), sheet.clone(), &sync_config());

    for r in db.read_all().await.unwrap() {
        sheet.insert(&r).await.unwrap();
    }
    orchestrator.run_cycle().await.unwrap();

    // Both sides edit the same row; the sheet's edit is newer.
    db.update("5", &row(5, "Ann-db-edit", "2026-02-01 09:00:00")).await.unwrap();
    sheet.update("5", &row(5, "Ann-sheet-edit", "2026-02-01 10:00:00")).await.unwrap();

    let report = orchestrator.run_cycle().await.unwrap();
    assert_eq!(report.conflicts_resolved, 1);

    let db_rows = db.read_all().await.unwrap();
    assert_eq!(db_rows[0]["name"], json!("Ann-sheet-edit"));
}

#[tokio::test]
async fn delete_on_one_side_propagates_to_the_other() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap().to_string();
    let db = sqlite_db_store(&path).await;
    db.insert(&row(7, "Cleanup", "2026-03-01 00:00:00")).await.unwrap();

    let sheet = Arc::new(FakeSheet::new(vec![]));
    let db = Arc::new(db);
    let orchestrator = SyncOrchestrator::new(db.clone(), sheet.clone(), &sync_config());

    for r in db.read_all().await.unwrap() {
        sheet.insert(&r).await.unwrap();
    }
    orchestrator.run_cycle().await.unwrap();

    db.delete("7").await.unwrap();
    let report = orchestrator.run_cycle().await.unwrap();

    assert_eq!(report.applied_to_sheet.len(), 1);
    assert!(sheet.read_all().await.unwrap().is_empty());
}

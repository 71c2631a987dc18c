use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::application::detector::detect;
use crate::domain::report::CycleReport;
use crate::application::resolver::{resolve, Resolution};
use crate::domain::change::{Change, Operation, Origin};
use crate::domain::errors::SyncError;
use crate::domain::ports::TableStore;
use crate::domain::row::{canonical_string, Row};
use crate::domain::snapshot::{InMemorySnapshotStore, Side, Snapshot, SnapshotStore};
use crate::domain::status::EngineStatus;
use crate::infrastructure::config::{InitialSyncSource, SyncConfig};

/// Drives the fetch → detect → resolve → apply → commit cycle described in
/// the component design, and owns the only mutable state the engine has:
/// the two snapshot baselines and the status the CLI polls.
///
/// Scheduling is single-threaded and cooperative: one cycle runs at a time,
/// `stop()` sets a [`CancellationToken`] checked at the loop head and at the
/// inter-cycle sleep, never mid-cycle — a cycle in progress runs to
/// completion or to failure.
pub struct SyncOrchestrator {
    db: Arc<dyn TableStore>,
    sheet: Arc<dyn TableStore>,
    primary_key_column: String,
    timestamp_column: String,
    sync_interval: Duration,
    initial_sync_source: InitialSyncSource,
    cancel: CancellationToken,
    status: Mutex<EngineStatus>,
    snapshots: Mutex<InMemorySnapshotStore>,
}

impl SyncOrchestrator {
    pub fn new(db: Arc<dyn TableStore>, sheet: Arc<dyn TableStore>, config: &SyncConfig) -> Self {
        Self {
            db,
            sheet,
            primary_key_column: config.primary_key_column.clone(),
            timestamp_column: config.timestamp_column.clone(),
            sync_interval: Duration::from_secs(config.sync_interval_seconds),
            initial_sync_source: config.initial_sync_source,
            cancel: CancellationToken::new(),
            status: Mutex::new(EngineStatus::default()),
            snapshots: Mutex::new(InMemorySnapshotStore::new()),
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.status.lock().unwrap().clone()
    }

    /// Request graceful termination. A cycle already in progress still
    /// runs to completion; the loop exits before starting the next one.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Perform initial sync, then loop cycles at `sync_interval` until
    /// `stop()` is called or a cycle fails fatally.
    pub async fn start(&self) -> Result<()> {
        self.initial_sync().await?;
        self.status.lock().unwrap().is_running = true;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if let Err(err) = self.run_cycle().await {
                error!(error = %format!("{err:#}"), "sync cycle aborted");
                let mut status = self.status.lock().unwrap();
                status.is_running = false;
                status.last_error = Some(format!("{err:#}"));
                return Err(err);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.sync_interval) => {}
            }
        }

        self.status.lock().unwrap().is_running = false;
        Ok(())
    }

    /// One-off unidirectional bulk copy from the configured source peer to
    /// the other, establishing matching baselines so the first regular
    /// cycle sees no spurious changes on either side.
    #[instrument(skip(self), level = "info")]
    async fn initial_sync(&self) -> Result<()> {
        let (source_side, source, target) = match self.initial_sync_source {
            InitialSyncSource::Db => (Side::Db, &self.db, &self.sheet),
            InitialSyncSource::Sheet => (Side::Sheet, &self.sheet, &self.db),
        };

        let rows = source
            .read_all()
            .await
            .map_err(|e| SyncError::PeerRead { side: source_side.as_str(), source: e })?;

        for row in &rows {
            target
                .insert(row)
                .await
                .map_err(|e| SyncError::PeerWrite { side: source_side.opposite().as_str(), source: e })?;
        }

        let snapshot = Snapshot::new(infer_columns(&rows), rows);
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.install(Side::Db, snapshot.clone());
        snapshots.install(Side::Sheet, snapshot);

        info!(source = source_side.as_str(), "initial sync complete");
        Ok(())
    }

    /// Fetch, detect, resolve, apply, and commit one cycle. Returns the
    /// report of what was applied to each side.
    #[instrument(skip(self), level = "info")]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let cycle = self.status.lock().unwrap().cycle_count + 1;

        let (db_snapshot, sheet_snapshot, resolution) = self.fetch_and_resolve().await?;

        self.apply_all(&self.db, &resolution.for_db, Side::Db).await?;
        self.apply_all(&self.sheet, &resolution.for_sheet, Side::Sheet).await?;

        {
            let mut snapshots = self.snapshots.lock().unwrap();
            snapshots.install(Side::Db, db_snapshot);
            snapshots.install(Side::Sheet, sheet_snapshot);
        }

        {
            let mut status = self.status.lock().unwrap();
            status.cycle_count = cycle;
            status.last_cycle_at = Some(Utc::now());
            status.conflicts_resolved += resolution.conflicts_resolved as u64;
        }

        info!(
            cycle,
            applied_to_db = resolution.for_db.len(),
            applied_to_sheet = resolution.for_sheet.len(),
            conflicts_resolved = resolution.conflicts_resolved,
            "cycle complete"
        );

        Ok(CycleReport::new(cycle, resolution.for_db, resolution.for_sheet, resolution.conflicts_resolved))
    }

    /// Run fetch → detect → resolve without applying or committing
    /// anything — the preview half of `--dry-run`.
    pub async fn dry_run_cycle(&self) -> Result<CycleReport> {
        let cycle = self.status.lock().unwrap().cycle_count + 1;
        let (_, _, resolution) = self.fetch_and_resolve().await?;
        Ok(CycleReport::new(cycle, resolution.for_db, resolution.for_sheet, resolution.conflicts_resolved))
    }

    async fn fetch_and_resolve(&self) -> Result<(Snapshot, Snapshot, Resolution)> {
        let (db_rows, sheet_rows) = tokio::try_join!(self.fetch_side(Side::Db), self.fetch_side(Side::Sheet))?;

        let db_snapshot = Snapshot::new(infer_columns(&db_rows), db_rows);
        let sheet_snapshot = Snapshot::new(infer_columns(&sheet_rows), sheet_rows);

        let (db_baseline, sheet_baseline) = {
            let snapshots = self.snapshots.lock().unwrap();
            (
                snapshots.baseline(Side::Db).cloned().unwrap_or_else(Snapshot::empty),
                snapshots.baseline(Side::Sheet).cloned().unwrap_or_else(Snapshot::empty),
            )
        };

        let mut db_changes = detect(&db_baseline, &db_snapshot, Origin::Db, &self.primary_key_column)?;
        let mut sheet_changes = detect(&sheet_baseline, &sheet_snapshot, Origin::Sheet, &self.primary_key_column)?;

        enrich_with_timestamp(&mut db_changes, &db_snapshot, &self.primary_key_column, &self.timestamp_column);
        enrich_with_timestamp(&mut sheet_changes, &sheet_snapshot, &self.primary_key_column, &self.timestamp_column);

        let resolution = resolve(sheet_changes, db_changes, &self.timestamp_column);
        Ok((db_snapshot, sheet_snapshot, resolution))
    }

    async fn fetch_side(&self, side: Side) -> Result<Vec<Row>> {
        let store = match side {
            Side::Db => &self.db,
            Side::Sheet => &self.sheet,
        };
        store.read_all().await.map_err(|e| SyncError::PeerRead { side: side.as_str(), source: e }.into())
    }

    async fn apply_all(&self, store: &Arc<dyn TableStore>, changes: &[Change], side: Side) -> Result<()> {
        for change in changes {
            let result = match change.operation {
                Operation::Insert => {
                    let row = self.stamp_if_sheet_missing_timestamp(change.payload.clone(), side);
                    store.insert(&row).await
                }
                Operation::Update => {
                    let delta = self.stamp_if_sheet_missing_timestamp(change.payload.clone(), side);
                    store.update(&change.primary_key, &delta).await
                }
                Operation::Delete => store.delete(&change.primary_key).await,
            };
            result.map_err(|e| SyncError::PeerWrite { side: side.as_str(), source: e })?;
        }
        Ok(())
    }

    /// When applying to the spreadsheet and the payload still lacks a
    /// timestamp after detection-time enrichment (the source row never had
    /// `last_modified` populated), synthesize the current wall clock in
    /// the canonical `YYYY-MM-DD HH:MM:SS` form.
    fn stamp_if_sheet_missing_timestamp(&self, mut row: Row, side: Side) -> Row {
        if side == Side::Sheet && !row.contains_key(&self.timestamp_column) {
            row.insert(self.timestamp_column.clone(), Value::String(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()));
        }
        row
    }
}

fn infer_columns(rows: &[Row]) -> Vec<String> {
    let mut columns = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key.clone()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Adds the current `timestamp_column` value from `snapshot` to any change
/// whose payload doesn't already carry one — the detector's UPDATE delta
/// may omit it when unchanged, but the resolver needs it to compare sides.
fn enrich_with_timestamp(changes: &mut [Change], snapshot: &Snapshot, primary_key_column: &str, timestamp_column: &str) {
    if changes.is_empty() {
        return;
    }

    let index: BTreeMap<String, &Row> = snapshot
        .rows
        .iter()
        .map(|row| (canonical_string(row.get(primary_key_column)), row))
        .collect();

    for change in changes.iter_mut() {
        if change.operation == Operation::Delete || change.payload.contains_key(timestamp_column) {
            continue;
        }
        if let Some(row) = index.get(&change.primary_key) {
            if let Some(ts) = row.get(timestamp_column) {
                change.payload.insert(timestamp_column.to_string(), ts.clone());
            }
        }
    }
}

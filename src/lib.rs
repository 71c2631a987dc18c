use std::sync::Arc;

use anyhow::Result;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of syncly's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                         |
/// |---------|-----------------|-------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting            |
/// | `Info`  | `info`          | Default — shows cycle boundaries    |
/// | `Debug` | `debug`         | `--verbose` — shows queries/HTTP too|
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for syncly.
///
/// This is a convenience wrapper around `tracing_subscriber`. It respects
/// `RUST_LOG` when set, falling back to `level` otherwise.
///
/// Call this **once** at application startup, before any syncly async
/// function. Library consumers who manage their own subscriber should skip
/// this and configure tracing themselves.
///
/// Only available when the `cli` feature is enabled (pulls in
/// `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "syncly=error",
        LogLevel::Info => "syncly=info",
        LogLevel::Debug => "syncly=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();
}

// ─── Public API Facade ───

pub use application::orchestrator::SyncOrchestrator;
pub use domain::change::{Change, Operation, Origin};
pub use domain::errors::SyncError;
pub use domain::ports::TableStore;
pub use domain::report::CycleReport;
pub use domain::row::Row;
pub use domain::snapshot::{Side, Snapshot};
pub use domain::status::EngineStatus;
pub use infrastructure::config::{AppConfig, DbConfig, InitialSyncSource, SheetConfig, SyncConfig};

use crate::application::monitoring::MonitoringTableStore;
use crate::infrastructure::db::store as db_store;
use crate::infrastructure::sheet::store as sheet_store;

// ─── Public entry points ───

/// Build both peer stores and the orchestrator from a loaded [`AppConfig`],
/// wrapping each store in the tracing decorator.
pub async fn build_orchestrator(cfg: &AppConfig) -> Result<SyncOrchestrator> {
    let db = Arc::new(db_store::connect(&cfg.db, &cfg.sync.primary_key_column).await?);
    let db: Arc<dyn TableStore> = Arc::new(MonitoringTableStore::new(db, "db"));

    let sheet = Arc::new(sheet_store::connect(&cfg.sheet, &cfg.sync.primary_key_column));
    let sheet: Arc<dyn TableStore> = Arc::new(MonitoringTableStore::new(sheet, "sheet"));

    Ok(SyncOrchestrator::new(db, sheet, &cfg.sync))
}

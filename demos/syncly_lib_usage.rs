//! # Syncly — library usage example
//!
//! Shows two common patterns for consuming Syncly as a Rust library:
//!
//! 1. **From a config file** — simplest, mirrors the CLI
//! 2. **Programmatic config** — build `AppConfig` in code, no TOML file needed
//!
//! Run with a config file:
//!   cargo run --example syncly_lib_usage --features cli -- syncly.toml
//!
//! Run with the built-in programmatic config (needs a local PostgreSQL and a
//! reachable Google Sheet):
//!   cargo run --example syncly_lib_usage --features cli

use anyhow::Result;
use syncly::{
    build_orchestrator, AppConfig, DbConfig, InitialSyncSource, SheetConfig, SyncConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some(path) => from_config_file(path).await,
        None => programmatic_config().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 1 — load config from a TOML file (same as the CLI does internally)
// ─────────────────────────────────────────────────────────────────────────────
async fn from_config_file(path: &str) -> Result<()> {
    println!("=== Pattern 1: from config file ({path}) ===\n");

    let cfg = AppConfig::load(Some(path))?;
    let orchestrator = build_orchestrator(&cfg).await?;

    let report = orchestrator.dry_run_cycle().await?;
    inspect_report(&report);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 2 — build AppConfig entirely in code, no TOML file required.
// Useful when config comes from env vars, a CLI flag, a database row, etc.
// ─────────────────────────────────────────────────────────────────────────────
async fn programmatic_config() -> Result<()> {
    println!("=== Pattern 2: programmatic config ===\n");

    let cfg = AppConfig {
        db: DbConfig {
            driver: "postgres".into(),
            host: std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".into()),
            port: 5432,
            dbname: "syncly".into(),
            user: "syncly".into(),
            password: "syncly".into(),
            schema: "public".into(),
            table: "contacts".into(),
        },
        sheet: SheetConfig {
            spreadsheet_id: std::env::var("SHEET_ID").unwrap_or_default(),
            sheet_tab: "Sheet1".into(),
            bearer_token: std::env::var("SHEET_TOKEN").unwrap_or_default(),
        },
        sync: SyncConfig {
            primary_key_column: "id".into(),
            timestamp_column: "last_modified".into(),
            sync_interval_seconds: 5,
            initial_sync_source: InitialSyncSource::Db,
            log_level: Default::default(),
        },
        output: Default::default(),
    };

    let orchestrator = build_orchestrator(&cfg).await?;
    let report = orchestrator.run_cycle().await?;
    inspect_report(&report);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Inspect a CycleReport directly for custom logic — it's plain serialisable
// Rust data, no magic, no callbacks.
// ─────────────────────────────────────────────────────────────────────────────
fn inspect_report(report: &syncly::CycleReport) {
    println!("report  : {}", report.report_id);
    println!("cycle   : {}", report.cycle);
    println!();

    for change in &report.applied_to_db {
        println!("  → db      {:?}  {}", change.operation, change.primary_key);
    }
    for change in &report.applied_to_sheet {
        println!("  → sheet   {:?}  {}", change.operation, change.primary_key);
    }

    if report.conflicts_resolved > 0 {
        println!(
            "\n⚠  {} conflict(s) resolved by last-write-wins this cycle.",
            report.conflicts_resolved
        );
    }

    let json = serde_json::to_string_pretty(report).expect("CycleReport is always serialisable");
    println!("\nFull report: {} bytes of JSON", json.len());
}

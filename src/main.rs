use std::path::Path;

use anyhow::Result;
use chrono::Local;
use clap::Parser;

use syncly::presentation::cli_summary::{print_status, print_summary};
use syncly::presentation::writers::{all_writers, write_to_file, writer_for};
use syncly::{build_orchestrator, init_tracing, AppConfig};

#[derive(Parser, Debug)]
#[command(
    name = "syncly",
    about = "Syncly — keeps a SQL table and a spreadsheet in sync, last write wins."
)]
struct Cli {
    /// Path to a TOML config file. Falls back to ./syncly.toml, the user
    /// config dir, and environment variables when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Run one cycle, print what would change, and exit without applying it.
    #[arg(long)]
    dry_run: bool,

    /// Run one cycle, apply it, write the report to this directory, and exit.
    #[arg(long)]
    export: Option<String>,

    /// Output format for `--export`: "all", "json", or "sql".
    #[arg(short, long, default_value = "all")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config.as_deref())?;
    init_tracing(cfg.sync.log_level);

    let orchestrator = build_orchestrator(&cfg).await?;

    if cli.dry_run {
        let report = orchestrator.dry_run_cycle().await?;
        print_summary(&report);
        return Ok(());
    }

    if let Some(export_dir) = cli.export {
        let report = orchestrator.run_cycle().await?;
        print_summary(&report);

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let subdir_name = format!("{}_{}", timestamp, report.report_id);
        let output_subdir = Path::new(&export_dir).join(&subdir_name);
        std::fs::create_dir_all(&output_subdir)?;

        match cli.format.as_str() {
            "all" => {
                for writer in all_writers() {
                    write_to_file(&*writer, &report, output_subdir.to_str().unwrap())?;
                }
            }
            fmt => {
                let writer =
                    writer_for(fmt).ok_or_else(|| anyhow::anyhow!("Unknown format: {}", fmt))?;
                write_to_file(&*writer, &report, output_subdir.to_str().unwrap())?;
            }
        }

        println!("Report written to {}", output_subdir.display());
        return Ok(());
    }

    orchestrator.start().await?;
    print_status(&orchestrator.status());

    Ok(())
}

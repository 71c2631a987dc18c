use colored::*;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::domain::report::CycleReport;
use crate::domain::change::Operation;
use crate::domain::status::EngineStatus;

#[derive(Tabled)]
struct SideRow {
    side: String,
    inserts: String,
    updates: String,
    deletes: String,
}

#[derive(Tabled)]
struct SummaryRow {
    metric: String,
    value: String,
}

fn count_by_op(changes: &[crate::domain::change::Change]) -> (usize, usize, usize) {
    let inserts = changes.iter().filter(|c| c.operation == Operation::Insert).count();
    let updates = changes.iter().filter(|c| c.operation == Operation::Update).count();
    let deletes = changes.iter().filter(|c| c.operation == Operation::Delete).count();
    (inserts, updates, deletes)
}

/// Print a coloured summary of one cycle's report — used for both
/// `--dry-run` previews and post-apply confirmation.
pub fn print_summary(report: &CycleReport) {
    println!();
    println!("{}", "SYNCLY CYCLE SUMMARY".bold().cyan());
    println!("Cycle {} · report {}", report.cycle, report.report_id.bright_yellow());
    println!();

    if report.is_empty() {
        println!("{}", "No changes detected.".italic());
        return;
    }

    let (db_i, db_u, db_d) = count_by_op(&report.applied_to_db);
    let (sheet_i, sheet_u, sheet_d) = count_by_op(&report.applied_to_sheet);

    let rows = vec![
        SideRow {
            side: "database".bold().to_string(),
            inserts: db_i.to_string().green().to_string(),
            updates: db_u.to_string().yellow().to_string(),
            deletes: db_d.to_string().red().to_string(),
        },
        SideRow {
            side: "spreadsheet".bold().to_string(),
            inserts: sheet_i.to_string().green().to_string(),
            updates: sheet_u.to_string().yellow().to_string(),
            deletes: sheet_d.to_string().red().to_string(),
        },
    ];

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let summary_rows = vec![
        SummaryRow {
            metric: "Applied to database".into(),
            value: report.applied_to_db.len().to_string().green().to_string(),
        },
        SummaryRow {
            metric: "Applied to spreadsheet".into(),
            value: report.applied_to_sheet.len().to_string().green().to_string(),
        },
        SummaryRow {
            metric: "Conflicts resolved".into(),
            value: report.conflicts_resolved.to_string().yellow().to_string(),
        },
    ];

    let summary_table = Table::new(summary_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=1)).with(Alignment::right()))
        .to_string();

    println!();
    println!("{summary_table}");
    println!();
}

/// Print the engine's current status (used by a future `status` subcommand
/// and for end-of-run reporting).
pub fn print_status(status: &EngineStatus) {
    println!();
    println!("{}", "SYNCLY ENGINE STATUS".bold().cyan());
    let running = if status.is_running { "running".green().to_string() } else { "stopped".red().to_string() };
    println!("State: {running}");
    println!("Cycles completed: {}", status.cycle_count.to_string().bold());
    println!("Conflicts resolved (lifetime): {}", status.conflicts_resolved.to_string().yellow());
    if let Some(at) = status.last_cycle_at {
        println!("Last cycle at: {}", at.to_rfc3339().dimmed());
    }
    if let Some(err) = &status.last_error {
        println!("Last error: {}", err.red());
    }
    println!();
}

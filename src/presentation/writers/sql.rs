use std::fmt::Write as FmtWrite;

use anyhow::Result;

use crate::domain::report::CycleReport;
use crate::domain::change::{Change, Operation};
use crate::domain::ports::OutputWriter;
use crate::infrastructure::db::dialect::{PostgresDialect, QueryDialect};

/// Renders a cycle's applied changes as literal SQL, for audit trails and
/// manual replay. Always uses ANSI/PostgreSQL quoting — this is a record of
/// what happened, not a driver-specific replay script.
pub struct SqlWriter;

impl OutputWriter for SqlWriter {
    fn format(&self, report: &CycleReport) -> Result<String> {
        let dialect = PostgresDialect;
        let mut sql = String::new();

        writeln!(sql, "-- Report: {}", report.report_id)?;
        writeln!(sql, "-- Cycle: {}", report.cycle)?;
        writeln!(sql, "-- Generated: {}", report.started_at)?;
        writeln!(
            sql,
            "-- Summary: {} applied to db, {} applied to sheet, {} conflicts resolved",
            report.applied_to_db.len(),
            report.applied_to_sheet.len(),
            report.conflicts_resolved
        )?;
        writeln!(sql)?;

        writeln!(sql, "-- ── Applied to database ──")?;
        for change in &report.applied_to_db {
            writeln!(sql, "{}", render_change(change, &dialect))?;
        }
        writeln!(sql)?;
        writeln!(sql, "-- ── Applied to spreadsheet ──")?;
        for change in &report.applied_to_sheet {
            writeln!(sql, "{}", render_change(change, &dialect))?;
        }

        Ok(sql)
    }

    fn extension(&self) -> &'static str {
        "sql"
    }
}

fn render_change(change: &Change, dialect: &dyn QueryDialect) -> String {
    match change.operation {
        Operation::Delete => format!(
            "DELETE FROM rows WHERE id = {};",
            dialect.sql_literal(&serde_json::Value::String(change.primary_key.clone()))
        ),
        Operation::Insert => {
            let (cols, vals) = columns_values(change, dialect);
            format!("INSERT INTO rows ({}) VALUES ({});", cols, vals)
        }
        Operation::Update => format!(
            "UPDATE rows SET {} WHERE id = {};",
            set_clause(change, dialect),
            dialect.sql_literal(&serde_json::Value::String(change.primary_key.clone()))
        ),
    }
}

fn set_clause(change: &Change, dialect: &dyn QueryDialect) -> String {
    change
        .payload
        .iter()
        .map(|(col, val)| format!("{} = {}", dialect.quote_ident(col), dialect.sql_literal(val)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn columns_values(change: &Change, dialect: &dyn QueryDialect) -> (String, String) {
    let cols: Vec<String> = change.payload.keys().map(|k| dialect.quote_ident(k)).collect();
    let vals: Vec<String> = change.payload.values().map(|v| dialect.sql_literal(v)).collect();
    (cols.join(", "), vals.join(", "))
}

use std::fs;

use anyhow::Result;

use crate::domain::report::CycleReport;
use crate::domain::ports::OutputWriter;

use self::{json::JsonWriter, sql::SqlWriter};

pub mod json;
pub mod sql;

/// Register available writers - OCP: add new ones without touching main.rs
pub fn all_writers() -> Vec<Box<dyn OutputWriter>> {
    vec![Box::new(JsonWriter), Box::new(SqlWriter)]
}

pub fn writer_for(format: &str) -> Option<Box<dyn OutputWriter>> {
    match format {
        "json" => Some(Box::new(JsonWriter)),
        "sql" => Some(Box::new(SqlWriter)),
        _ => None,
    }
}

/// Writes a cycle report to disk via the chosen writer.
pub fn write_to_file(writer: &dyn OutputWriter, report: &CycleReport, dir: &str) -> Result<()> {
    fs::create_dir_all(dir)?;

    let content = writer.format(report)?;
    let path = format!("{}/{}.{}", dir, report.report_id, writer.extension());
    fs::write(&path, &content)?;
    Ok(())
}

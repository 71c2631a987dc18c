use anyhow::Result;

use crate::domain::report::CycleReport;
use crate::domain::ports::OutputWriter;

pub struct JsonWriter;

impl OutputWriter for JsonWriter {
    fn format(&self, report: &CycleReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

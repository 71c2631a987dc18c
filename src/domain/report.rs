use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::change::Change;

/// Record of what one sync cycle did, for export via an [`OutputWriter`](crate::domain::ports::OutputWriter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub report_id: String,
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub applied_to_db: Vec<Change>,
    pub applied_to_sheet: Vec<Change>,
    pub conflicts_resolved: usize,
}

impl CycleReport {
    pub fn new(cycle: u64, applied_to_db: Vec<Change>, applied_to_sheet: Vec<Change>, conflicts_resolved: usize) -> Self {
        Self {
            report_id: format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%S"), Uuid::new_v4().simple()),
            cycle,
            started_at: Utc::now(),
            applied_to_db,
            applied_to_sheet,
            conflicts_resolved,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.applied_to_db.is_empty() && self.applied_to_sheet.is_empty()
    }
}

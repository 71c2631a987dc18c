use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the orchestrator's state. Owned and mutated
/// only by the orchestrator; callers of `status()` get a read-only copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub is_running: bool,
    pub cycle_count: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub conflicts_resolved: u64,
    pub last_error: Option<String>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            cycle_count: 0,
            last_cycle_at: None,
            conflicts_resolved: 0,
            last_error: None,
        }
    }
}

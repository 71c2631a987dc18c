use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::row::Row;

/// Which peer a [`Snapshot`] or [`Change`](super::change::Change) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Db,
    Sheet,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Db => "db",
            Side::Sheet => "sheet",
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Db => Side::Sheet,
            Side::Sheet => Side::Db,
        }
    }
}

/// A full table state captured at a specific instant. The primary-key
/// column is present whenever the snapshot is non-empty; duplicate
/// primary keys are tolerated (first occurrence wins for lookup).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            captured_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column) || self.rows.iter().any(|r| r.contains_key(column))
    }
}

/// Holds the last-observed baseline per side. Installs are atomic
/// replacements — a reader never sees a partial overlay — which a plain
/// field swap satisfies because the orchestrator is the store's sole
/// owner and caller (single-threaded cooperative scheduling).
pub trait SnapshotStore: Send {
    fn baseline(&self, side: Side) -> Option<&Snapshot>;
    fn install(&mut self, side: Side, snapshot: Snapshot);
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    db: Option<Snapshot>,
    sheet: Option<Snapshot>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn baseline(&self, side: Side) -> Option<&Snapshot> {
        match side {
            Side::Db => self.db.as_ref(),
            Side::Sheet => self.sheet.as_ref(),
        }
    }

    fn install(&mut self, side: Side, snapshot: Snapshot) {
        match side {
            Side::Db => self.db = Some(snapshot),
            Side::Sheet => self.sheet = Some(snapshot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn baseline_is_none_before_first_install() {
        let store = InMemorySnapshotStore::new();
        assert!(store.baseline(Side::Db).is_none());
    }

    #[test]
    fn install_replaces_previous_baseline() {
        let mut store = InMemorySnapshotStore::new();
        let mut row = BTreeMap::new();
        row.insert("id".to_string(), json!(1));
        store.install(Side::Db, Snapshot::new(vec!["id".into()], vec![row]));
        assert_eq!(store.baseline(Side::Db).unwrap().rows.len(), 1);

        store.install(Side::Db, Snapshot::empty());
        assert!(store.baseline(Side::Db).unwrap().is_empty());
        assert!(store.baseline(Side::Sheet).is_none());
    }
}

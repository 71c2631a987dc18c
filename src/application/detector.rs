use std::collections::BTreeSet;

use tracing::warn;

use crate::domain::change::{Change, Operation, Origin};
use crate::domain::errors::SyncError;
use crate::domain::row::canonical_string;
use crate::domain::snapshot::Snapshot;

/// Computes the `Change` list between two snapshots of the same side.
///
/// Cross-peer equality is always via `canonical_string` — a numeric `42`
/// and a textual `"42"` compare equal, which is the only thing that
/// keeps the detector from emitting a spurious UPDATE every cycle
/// against the spreadsheet side.
pub fn detect(old: &Snapshot, new: &Snapshot, origin: Origin, primary_key_column: &str) -> Result<Vec<Change>, SyncError> {
    if !old.is_empty() && !old.has_column(primary_key_column) {
        return Err(SyncError::Schema {
            side: origin.as_str(),
            column: primary_key_column.to_string(),
        });
    }
    if !new.is_empty() && !new.has_column(primary_key_column) {
        return Err(SyncError::Schema {
            side: origin.as_str(),
            column: primary_key_column.to_string(),
        });
    }

    warn_on_duplicates(old, primary_key_column, "old snapshot");
    warn_on_duplicates(new, primary_key_column, "new snapshot");

    let old_by_pk = index_first_by_pk(old, primary_key_column);
    let new_by_pk = index_first_by_pk(new, primary_key_column);

    let old_pks: BTreeSet<&String> = old_by_pk.keys().collect();
    let new_pks: BTreeSet<&String> = new_by_pk.keys().collect();

    let mut changes = Vec::new();

    for pk in old_pks.difference(&new_pks) {
        changes.push(Change::new(Operation::Delete, (*pk).clone(), origin, Default::default()));
    }

    for pk in new_pks.difference(&old_pks) {
        let row = new_by_pk[*pk].clone();
        changes.push(Change::new(Operation::Insert, (*pk).clone(), origin, row));
    }

    for pk in old_pks.intersection(&new_pks) {
        let old_row = old_by_pk[*pk];
        let new_row = new_by_pk[*pk];

        let mut delta = crate::domain::row::Row::new();
        for column in new_row.keys() {
            let old_val = canonical_string(old_row.get(column));
            let new_val = canonical_string(new_row.get(column));
            if old_val != new_val {
                delta.insert(column.clone(), new_row[column].clone());
            }
        }

        if !delta.is_empty() {
            changes.push(Change::new(Operation::Update, (*pk).clone(), origin, delta));
        }
    }

    Ok(changes)
}

fn index_first_by_pk<'a>(
    snapshot: &'a Snapshot,
    primary_key_column: &str,
) -> std::collections::BTreeMap<String, &'a crate::domain::row::Row> {
    let mut index = std::collections::BTreeMap::new();
    for row in &snapshot.rows {
        let pk = canonical_string(row.get(primary_key_column));
        index.entry(pk).or_insert(row);
    }
    index
}

fn warn_on_duplicates(snapshot: &Snapshot, primary_key_column: &str, context: &str) {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for row in &snapshot.rows {
        let pk = canonical_string(row.get(primary_key_column));
        if !seen.insert(pk.clone()) {
            duplicates.insert(pk);
        }
    }
    for pk in duplicates {
        warn!(pk = %pk, context, "duplicate primary key detected; using first occurrence");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> crate::domain::row::Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn empty_to_empty_is_empty() {
        let changes = detect(&Snapshot::empty(), &Snapshot::empty(), Origin::Db, "id").unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn insert_detected_for_new_pk() {
        let old = Snapshot::empty();
        let new = Snapshot::new(vec!["id".into()], vec![row(&[("id", json!(1))])]);
        let changes = detect(&old, &new, Origin::Db, "id").unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].operation, Operation::Insert);
        assert_eq!(changes[0].primary_key, "1");
    }

    #[test]
    fn delete_detected_for_missing_pk() {
        let old = Snapshot::new(vec!["id".into()], vec![row(&[("id", json!(1))])]);
        let new = Snapshot::empty();
        let changes = detect(&old, &new, Origin::Sheet, "id").unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].operation, Operation::Delete);
    }

    #[test]
    fn update_only_includes_changed_columns() {
        let old = Snapshot::new(
            vec!["id".into(), "name".into(), "email".into()],
            vec![row(&[("id", json!(1)), ("name", json!("a")), ("email", json!("a@x.com"))])],
        );
        let new = Snapshot::new(
            vec!["id".into(), "name".into(), "email".into()],
            vec![row(&[("id", json!(1)), ("name", json!("a")), ("email", json!("b@x.com"))])],
        );
        let changes = detect(&old, &new, Origin::Db, "id").unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].operation, Operation::Update);
        assert_eq!(changes[0].payload.len(), 1);
        assert_eq!(changes[0].payload["email"], json!("b@x.com"));
    }

    #[test]
    fn unchanged_row_emits_no_update() {
        let old = Snapshot::new(vec!["id".into()], vec![row(&[("id", json!(1))])]);
        let new = Snapshot::new(vec!["id".into()], vec![row(&[("id", json!(1))])]);
        assert!(detect(&old, &new, Origin::Db, "id").unwrap().is_empty());
    }

    #[test]
    fn numeric_vs_textual_pk_does_not_cause_spurious_update() {
        let old = Snapshot::new(vec!["id".into()], vec![row(&[("id", json!(42))])]);
        let new = Snapshot::new(vec!["id".into()], vec![row(&[("id", json!("42"))])]);
        assert!(detect(&old, &new, Origin::Sheet, "id").unwrap().is_empty());
    }

    #[test]
    fn missing_pk_column_is_schema_error() {
        let old = Snapshot::new(vec!["name".into()], vec![row(&[("name", json!("a"))])]);
        let new = Snapshot::empty();
        let err = detect(&old, &new, Origin::Db, "id").unwrap_err();
        assert!(matches!(err, SyncError::Schema { .. }));
    }

    #[test]
    fn duplicate_primary_key_keeps_first_occurrence_and_does_not_error() {
        let old = Snapshot::empty();
        let new = Snapshot::new(
            vec!["id".into(), "name".into()],
            vec![
                row(&[("id", json!(1)), ("name", json!("first"))]),
                row(&[("id", json!(1)), ("name", json!("second"))]),
            ],
        );
        let changes = detect(&old, &new, Origin::Db, "id").unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].payload["name"], json!("first"));
    }
}

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::domain::change::Change;
use crate::domain::row::canonical_string;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Result of one resolver pass: the changes to apply to the database and
/// to the spreadsheet, plus how many conflicting pairs were resolved.
pub struct Resolution {
    pub for_db: Vec<Change>,
    pub for_sheet: Vec<Change>,
    pub conflicts_resolved: usize,
}

/// Pairs per-key changes across sides and applies last-write-wins by the
/// configured timestamp column. A change that wins is queued for the
/// *opposite* side; the loser is discarded and logged.
pub fn resolve(sheet_changes: Vec<Change>, db_changes: Vec<Change>, timestamp_column: &str) -> Resolution {
    let sheet_by_pk: BTreeMap<String, Change> = sheet_changes.into_iter().map(|c| (c.primary_key.clone(), c)).collect();
    let db_by_pk: BTreeMap<String, Change> = db_changes.into_iter().map(|c| (c.primary_key.clone(), c)).collect();

    let mut for_db = Vec::new();
    let mut for_sheet = Vec::new();
    let mut conflicts_resolved = 0usize;

    let mut sheet_by_pk = sheet_by_pk;
    let mut db_by_pk = db_by_pk;

    let conflicting: Vec<String> = sheet_by_pk
        .keys()
        .filter(|pk| db_by_pk.contains_key(*pk))
        .cloned()
        .collect();

    for pk in &conflicting {
        let sheet_change = sheet_by_pk.remove(pk).expect("checked above");
        let db_change = db_by_pk.remove(pk).expect("checked above");

        let sheet_ts = sheet_change.payload.get(timestamp_column).map(|v| canonical_string(Some(v)));
        let db_ts = db_change.payload.get(timestamp_column).map(|v| canonical_string(Some(v)));

        let db_wins = match (db_ts.as_deref(), sheet_ts.as_deref()) {
            (Some(db_raw), Some(sheet_raw)) if !db_raw.is_empty() && !sheet_raw.is_empty() => {
                match (parse_timestamp(db_raw), parse_timestamp(sheet_raw)) {
                    (Some(db_dt), Some(sheet_dt)) => db_dt >= sheet_dt,
                    _ => {
                        warn!(pk = %pk, db_ts = db_raw, sheet_ts = sheet_raw, "unparseable timestamp in conflict; database wins");
                        true
                    }
                }
            }
            _ => {
                warn!(pk = %pk, "missing timestamp in conflict; database wins");
                true
            }
        };

        if db_wins {
            warn!(
                pk = %pk, winner = "db",
                discarded = ?sheet_change.payload,
                "conflict resolved: database change wins"
            );
            for_sheet.push(db_change);
        } else {
            warn!(
                pk = %pk, winner = "sheet",
                discarded = ?db_change.payload,
                "conflict resolved: spreadsheet change wins"
            );
            for_db.push(sheet_change);
        }
        conflicts_resolved += 1;
    }

    for_db.extend(sheet_by_pk.into_values());
    for_sheet.extend(db_by_pk.into_values());

    Resolution {
        for_db,
        for_sheet,
        conflicts_resolved,
    }
}

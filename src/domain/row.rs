use std::collections::BTreeMap;

use serde_json::Value;

/// An ordered mapping from column name to cell value, as observed from
/// either peer. Cell values stay loosely typed (`serde_json::Value`) —
/// type coercion is deliberately left to the peer adapters; cross-peer
/// comparisons always go through [`canonical_string`].
pub type Row = BTreeMap<String, Value>;

/// Cross-peer equality projection. A database's numeric `42` and a
/// spreadsheet's textual `"42"` must compare equal, so every comparison
/// in the detector and resolver goes through this instead of raw
/// `Value` equality.
pub fn canonical_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Extracts the primary key of a row as its canonical string form.
pub fn primary_key_of(row: &Row, primary_key_column: &str) -> Option<String> {
    row.get(primary_key_column).map(|v| canonical_string(Some(v)))
}

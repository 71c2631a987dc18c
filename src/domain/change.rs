use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::row::Row;

/// The side a [`Change`] was detected on, or the side it is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Db,
    Sheet,
}

impl Origin {
    pub fn opposite(self) -> Origin {
        match self {
            Origin::Db => Origin::Sheet,
            Origin::Sheet => Origin::Db,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Db => "db",
            Origin::Sheet => "sheet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

/// One detected mutation against a specific primary key, from a specific
/// origin. `payload` is empty for DELETE, the full row for INSERT, and
/// the changed columns only for UPDATE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub operation: Operation,
    pub primary_key: String,
    pub origin: Origin,
    pub payload: Row,
    pub observed_at: DateTime<Utc>,
}

impl Change {
    pub fn new(operation: Operation, primary_key: impl Into<String>, origin: Origin, payload: Row) -> Self {
        Self {
            operation,
            primary_key: primary_key.into(),
            origin,
            payload,
            observed_at: Utc::now(),
        }
    }
}

use thiserror::Error;

/// Error kinds the engine distinguishes on. `TimestampParseError` and
/// `DuplicatePrimaryKey` are deliberately absent — both are handled
/// locally (resolver / detector) as logged warnings and never escape as
/// a `Result`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("primary key column '{column}' missing from {side} snapshot")]
    Schema { side: &'static str, column: String },

    #[error("failed to read from {side}: {source}")]
    PeerRead {
        side: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write to {side}: {source}")]
    PeerWrite {
        side: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

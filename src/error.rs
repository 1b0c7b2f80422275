// ABOUTME: Error taxonomy for the transfer engine
// ABOUTME: Distinguishes start-time failures from per-table copy failures

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The local source database could not be opened or queried during planning
    #[error("Source database unavailable: {0}")]
    SourceUnavailable(String),

    /// The destination failed its connectivity check
    #[error("Destination unreachable: {0}")]
    DestinationUnreachable(String),

    #[error("Transfer already running")]
    AlreadyRunning,

    #[error("Failed to write batch to '{table}': {reason}")]
    BatchWriteFailure { table: String, reason: String },

    #[error("Failed to read batch from '{table}': {reason}")]
    BatchReadFailure { table: String, reason: String },

    #[error("Checkpoint store error: {0}")]
    CheckpointFailure(String),

    #[error("Failed to prepare destination schema: {0}")]
    SchemaSetup(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TransferError {
    /// Render an `anyhow` chain on one line, e.g. "outer: inner: root".
    pub(crate) fn chain(err: &anyhow::Error) -> String {
        format!("{:#}", err)
    }

    pub(crate) fn source_unavailable(err: anyhow::Error) -> Self {
        Self::SourceUnavailable(Self::chain(&err))
    }

    pub(crate) fn destination_unreachable(err: anyhow::Error) -> Self {
        Self::DestinationUnreachable(Self::chain(&err))
    }

    pub(crate) fn checkpoint(err: anyhow::Error) -> Self {
        Self::CheckpointFailure(Self::chain(&err))
    }
}

pub type TransferResult<T> = std::result::Result<T, TransferError>;

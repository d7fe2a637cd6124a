//! Projection error types.

use common::{Classify, EventId, FailureKind};
use thiserror::Error;

/// Errors raised by the processed-event ledger and the read model store.
#[derive(Debug, Error)]
pub enum ProjectionStoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("Projection store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Classify for ProjectionStoreError {
    fn kind(&self) -> FailureKind {
        FailureKind::Infrastructure
    }
}

/// The store step at which an apply attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStage {
    CheckProcessed,
    Upsert,
    MarkProcessed,
}

impl ApplyStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyStage::CheckProcessed => "check_processed",
            ApplyStage::Upsert => "upsert",
            ApplyStage::MarkProcessed => "mark_processed",
        }
    }
}

impl std::fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the projection applier.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The delivery cannot be turned into a read model row. Retrying will
    /// never fix it.
    #[error("Malformed event {event_id}: {reason}")]
    Parse { event_id: EventId, reason: String },

    /// A store call failed; the delivery should be redelivered.
    #[error("Projection store failed during {stage}: {source}")]
    Store {
        stage: ApplyStage,
        #[source]
        source: ProjectionStoreError,
    },
}

impl Classify for ApplyError {
    fn kind(&self) -> FailureKind {
        match self {
            ApplyError::Parse { .. } => FailureKind::Parse,
            ApplyError::Store { source, .. } => source.kind(),
        }
    }
}

/// Result type for projection store operations.
pub type Result<T> = std::result::Result<T, ProjectionStoreError>;

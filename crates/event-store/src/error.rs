use common::{Classify, FailureKind};
use thiserror::Error;

use crate::{EventId, IdempotencyKey};

/// Errors that can occur when interacting with the event ledger.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The conditional insert was rejected: a record with the same event ID
    /// or idempotency key is already in the ledger.
    #[error("Event already recorded: event {event_id}, idempotency key {idempotency_key}")]
    Conflict {
        event_id: EventId,
        idempotency_key: IdempotencyKey,
    },

    /// The record was rejected before reaching the store.
    #[error("Invalid event record: {0}")]
    InvalidRecord(String),

    /// The backing store could not be reached or refused the operation.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Returns true if this is the conditional-insert conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EventStoreError::Conflict { .. })
    }
}

impl Classify for EventStoreError {
    fn kind(&self) -> FailureKind {
        match self {
            EventStoreError::Conflict { .. } => FailureKind::Conflict,
            EventStoreError::InvalidRecord(_) => FailureKind::Validation,
            EventStoreError::Unavailable(_)
            | EventStoreError::Database(_)
            | EventStoreError::Migration(_)
            | EventStoreError::Serialization(_) => FailureKind::Infrastructure,
        }
    }
}

/// Result type for event ledger operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;

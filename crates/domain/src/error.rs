//! Failure outcomes of the create-order command.

use common::{Classify, FailureKind, IdempotencyKey, OrderId};
use event_store::EventStoreError;
use thiserror::Error;

use crate::command::CreatedOrder;
use crate::order::ValidationError;
use crate::publisher::PublishError;

/// Every way a create-order command can end short of "stored and published".
#[derive(Debug, Error)]
pub enum CommandFailure {
    /// The input failed validation. Nothing was written.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The idempotency key or event ID was already committed.
    ///
    /// The caller should treat this as the command having already taken effect.
    /// `order_id` is the order stored under the key, or `None` when only the
    /// event ID collided and no record holds the key.
    #[error("order already exists for idempotency key {idempotency_key}")]
    AlreadyExists {
        order_id: Option<OrderId>,
        idempotency_key: IdempotencyKey,
    },

    /// The ledger append failed for a reason other than a conflict.
    #[error("event ledger error: {0}")]
    Store(#[source] EventStoreError),

    /// The event is durably stored but the bus has not accepted it.
    ///
    /// Retry with [`CreateOrderHandler::republish`](crate::CreateOrderHandler::republish),
    /// not by re-running the command.
    #[error("order stored but not published")]
    NotPublished {
        created: Box<CreatedOrder>,
        #[source]
        source: PublishError,
    },
}

impl CommandFailure {
    /// Returns true if the command's event reached the ledger.
    pub fn is_stored(&self) -> bool {
        matches!(
            self,
            CommandFailure::AlreadyExists { .. } | CommandFailure::NotPublished { .. }
        )
    }
}

impl Classify for CommandFailure {
    fn kind(&self) -> FailureKind {
        match self {
            CommandFailure::Validation(_) => FailureKind::Validation,
            CommandFailure::AlreadyExists { .. } => FailureKind::Conflict,
            CommandFailure::Store(e) => e.kind(),
            CommandFailure::NotPublished { .. } => FailureKind::Infrastructure,
        }
    }
}

use std::sync::Arc;

use async_trait::async_trait;

use crate::{EventRecord, EventStoreError, IdempotencyKey, OrderId, Result};

/// Core trait for event ledger implementations.
///
/// The ledger is append-only. Its one correctness-critical primitive is a
/// conditional insert: `append` must reject a record whose event ID or
/// idempotency key is already present, atomically, with no window between
/// the existence check and the write. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Appends a record if neither its event ID nor its idempotency key has
    /// been recorded before.
    ///
    /// Returns `EventStoreError::Conflict` when the record already exists.
    async fn append(&self, record: EventRecord) -> Result<()>;

    /// Retrieves all records for an order, oldest first.
    ///
    /// Audit/debugging query; not on the correctness-critical path.
    async fn events_for_order(&self, order_id: &OrderId) -> Result<Vec<EventRecord>>;

    /// Looks up the record committed under `key`, if any.
    ///
    /// Used after a conflict to report the order the key already belongs to.
    async fn find_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<EventRecord>>;
}

#[async_trait]
impl<T: EventLedger + ?Sized> EventLedger for Arc<T> {
    async fn append(&self, record: EventRecord) -> Result<()> {
        (**self).append(record).await
    }

    async fn events_for_order(&self, order_id: &OrderId) -> Result<Vec<EventRecord>> {
        (**self).events_for_order(order_id).await
    }

    async fn find_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<EventRecord>> {
        (**self).find_by_idempotency_key(key).await
    }
}

/// Validates a record before it is handed to the store.
pub fn validate_record_for_append(record: &EventRecord) -> Result<()> {
    record.validate().map_err(EventStoreError::InvalidRecord)
}

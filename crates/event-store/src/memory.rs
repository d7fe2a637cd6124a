use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    EventId, EventRecord, EventStoreError, IdempotencyKey, OrderId, Result,
    store::{EventLedger, validate_record_for_append},
};

#[derive(Default)]
struct LedgerState {
    records: Vec<EventRecord>,
    event_ids: HashSet<EventId>,
    idempotency_keys: HashSet<IdempotencyKey>,
}

/// In-memory event ledger implementation for testing and local runs.
///
/// The existence check and the insert happen under one write lock, which
/// gives the same atomic conditional insert as the PostgreSQL
/// implementation's unique constraints.
#[derive(Clone, Default)]
pub struct InMemoryEventLedger {
    state: Arc<RwLock<LedgerState>>,
    fail_on_append: Arc<AtomicBool>,
}

impl InMemoryEventLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Returns every stored record in insertion order.
    pub async fn records(&self) -> Vec<EventRecord> {
        self.state.read().await.records.clone()
    }

    /// Configures the ledger to report itself unavailable on append.
    pub fn set_fail_on_append(&self, fail: bool) {
        self.fail_on_append.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventLedger for InMemoryEventLedger {
    async fn append(&self, record: EventRecord) -> Result<()> {
        validate_record_for_append(&record)?;

        if self.fail_on_append.load(Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable(
                "event ledger unavailable".to_string(),
            ));
        }

        let mut state = self.state.write().await;

        if state.event_ids.contains(&record.event_id)
            || state.idempotency_keys.contains(&record.idempotency_key)
        {
            return Err(EventStoreError::Conflict {
                event_id: record.event_id,
                idempotency_key: record.idempotency_key,
            });
        }

        state.event_ids.insert(record.event_id.clone());
        state.idempotency_keys.insert(record.idempotency_key.clone());
        state.records.push(record);

        Ok(())
    }

    async fn events_for_order(&self, order_id: &OrderId) -> Result<Vec<EventRecord>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|r| &r.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn find_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<EventRecord>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .find(|r| &r.idempotency_key == key)
            .cloned())
    }
}

//! Queryable order read model.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{ProjectionStoreError, Result};

/// One row of the order read model, keyed by `order_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadModelOrder {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Store for the order read model.
///
/// `upsert` is a last-write-wins overwrite, so applying the same row twice
/// leaves the same state as applying it once.
#[async_trait]
pub trait ReadModelStore: Send + Sync {
    async fn upsert(&self, order: &ReadModelOrder) -> Result<()>;

    async fn get(&self, order_id: &OrderId) -> Result<Option<ReadModelOrder>>;
}

#[async_trait]
impl<T: ReadModelStore + ?Sized> ReadModelStore for Arc<T> {
    async fn upsert(&self, order: &ReadModelOrder) -> Result<()> {
        (**self).upsert(order).await
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<ReadModelOrder>> {
        (**self).get(order_id).await
    }
}

/// In-memory read model for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReadModelStore {
    orders: Arc<RwLock<HashMap<OrderId, ReadModelOrder>>>,
    writes: Arc<AtomicUsize>,
    fail_on_upsert: Arc<AtomicBool>,
}

impl InMemoryReadModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful upserts, including overwrites.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Makes `upsert` fail with `ProjectionStoreError::Unavailable`.
    pub fn set_fail_on_upsert(&self, fail: bool) {
        self.fail_on_upsert.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReadModelStore for InMemoryReadModelStore {
    async fn upsert(&self, order: &ReadModelOrder) -> Result<()> {
        if self.fail_on_upsert.load(Ordering::SeqCst) {
            return Err(ProjectionStoreError::Unavailable(
                "simulated upsert failure".to_string(),
            ));
        }

        self.orders
            .write()
            .await
            .insert(order.order_id.clone(), order.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<ReadModelOrder>> {
        Ok(self.orders.read().await.get(order_id).cloned())
    }
}

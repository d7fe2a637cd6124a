//! Event publisher contract and in-memory implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{Classify, FailureKind};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::order::{OrderCreated, OrderCreatedEnvelope};

/// Errors raised while forwarding an event to the bus.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bus rejected or could not accept the message.
    #[error("bus unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// The receiving side of the bus has gone away.
    #[error("bus closed")]
    Closed,
}

impl Classify for PublishError {
    fn kind(&self) -> FailureKind {
        FailureKind::Infrastructure
    }
}

/// Forwards committed events to a message bus.
///
/// Publishing has no atomicity with the ledger append. Every failure is
/// retriable from the caller's point of view.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderCreated) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, event: &OrderCreated) -> Result<(), PublishError> {
        (**self).publish(event).await
    }
}

/// In-memory publisher that captures envelopes, for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    published: Arc<Mutex<Vec<OrderCreatedEnvelope>>>,
    fail_on_publish: Arc<AtomicBool>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent publishes fail with `PublishError::Unavailable`.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns every envelope published so far, oldest first.
    pub async fn published(&self) -> Vec<OrderCreatedEnvelope> {
        self.published.lock().await.clone()
    }

    pub async fn publish_count(&self) -> usize {
        self.published.lock().await.len()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &OrderCreated) -> Result<(), PublishError> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable(
                "simulated publish failure".to_string(),
            ));
        }

        self.published.lock().await.push(event.envelope());
        Ok(())
    }
}

//! In-process at-least-once bus.
//!
//! `ChannelPublisher` puts serialized envelopes on a bounded channel and a
//! `Consumer` drains it, retrying each delivery while the boundary asks for
//! redelivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{EventPublisher, OrderCreated, PublishError};
use tokio::sync::{mpsc, watch};

use crate::boundary::{Disposition, handle_delivery};
use crate::context::AppContext;

const DEFAULT_REDELIVERY_BACKOFF: Duration = Duration::from_millis(50);

/// One message on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub body: Vec<u8>,
}

/// Creates a bounded bus and returns its two ends.
pub fn channel(capacity: usize) -> (ChannelPublisher, mpsc::Receiver<Delivery>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelPublisher { tx }, rx)
}

/// Publishes envelopes onto the in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<Delivery>,
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: &OrderCreated) -> Result<(), PublishError> {
        let body = serde_json::to_vec(&event.envelope())?;
        self.tx
            .send(Delivery { body })
            .await
            .map_err(|_| PublishError::Closed)?;

        metrics::counter!("bus_published_total").increment(1);
        Ok(())
    }
}

/// Counters reported when a consumer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Deliveries acknowledged, applied or dropped.
    pub acked: u64,
    /// Extra attempts made after a retriable failure.
    pub redelivered: u64,
    /// Deliveries given up on after the last attempt.
    pub abandoned: u64,
}

/// Drains the bus and applies each delivery to the projection.
pub struct Consumer {
    ctx: Arc<AppContext>,
    max_attempts: u32,
    backoff: Duration,
}

impl Consumer {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let max_attempts = ctx.config.max_delivery_attempts.max(1);
        Self {
            ctx,
            max_attempts,
            backoff: DEFAULT_REDELIVERY_BACKOFF,
        }
    }

    /// Sets the pause before each redelivery.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs until `shutdown` flips to true or every sender is dropped, then
    /// drains what is already queued.
    pub async fn run(
        self,
        mut deliveries: mpsc::Receiver<Delivery>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ConsumerStats {
        let mut stats = ConsumerStats::default();

        loop {
            tokio::select! {
                delivery = deliveries.recv() => match delivery {
                    Some(delivery) => self.deliver(&delivery, &mut stats).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        deliveries.close();
        while let Some(delivery) = deliveries.recv().await {
            self.deliver(&delivery, &mut stats).await;
        }

        tracing::info!(
            acked = stats.acked,
            redelivered = stats.redelivered,
            abandoned = stats.abandoned,
            "consumer stopped"
        );
        stats
    }

    /// Delivers one message, retrying while the boundary asks for redelivery.
    pub async fn deliver(&self, delivery: &Delivery, stats: &mut ConsumerStats) {
        for attempt in 1..=self.max_attempts {
            match handle_delivery(&self.ctx, &delivery.body).await {
                Disposition::Ack => {
                    stats.acked += 1;
                    return;
                }
                Disposition::Redeliver if attempt < self.max_attempts => {
                    stats.redelivered += 1;
                    metrics::counter!("bus_redeliveries_total").increment(1);
                    tracing::warn!(attempt, "delivery failed, redelivering");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Disposition::Redeliver => {}
            }
        }

        stats.abandoned += 1;
        metrics::counter!("bus_abandoned_total").increment(1);
        tracing::error!(
            attempts = self.max_attempts,
            "delivery abandoned after max attempts"
        );
    }
}

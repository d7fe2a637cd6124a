//! Processed-event ledger: read-side dedupe with bounded retention.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::EventId;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{ProjectionStoreError, Result};

const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Marker that an event has already produced its read model side effect.
///
/// Never updated once written. Eligible for purge after `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedEventRecord {
    pub event_id: EventId,
    pub processed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// How long processed-event records are kept.
///
/// A redelivery arriving after its record was purged is applied again. The
/// upsert it triggers is an overwrite with the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    ttl: Duration,
}

impl RetentionPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn days(days: i64) -> Self {
        Self::new(Duration::days(days))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Builds the record written when `event_id` is marked at `processed_at`.
    pub fn record(&self, event_id: EventId, processed_at: DateTime<Utc>) -> ProcessedEventRecord {
        ProcessedEventRecord {
            event_id,
            processed_at,
            expires_at: processed_at + self.ttl,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::days(DEFAULT_RETENTION_DAYS)
    }
}

/// Dedupe store of event IDs already applied to the read model.
///
/// A record's presence means processed, whether or not it has expired, until
/// `purge_expired` removes it.
#[async_trait]
pub trait ProcessedEventLedger: Send + Sync {
    async fn is_processed(&self, event_id: &EventId) -> Result<bool>;

    /// Records `event_id` as processed. Marking an already-processed ID is a
    /// no-op and keeps the original record.
    async fn mark_processed(&self, event_id: &EventId) -> Result<()>;

    /// Looks up the record for `event_id`, if any.
    async fn get(&self, event_id: &EventId) -> Result<Option<ProcessedEventRecord>>;

    /// Deletes every record with `expires_at <= now`. Returns how many were
    /// removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
impl<T: ProcessedEventLedger + ?Sized> ProcessedEventLedger for Arc<T> {
    async fn is_processed(&self, event_id: &EventId) -> Result<bool> {
        (**self).is_processed(event_id).await
    }

    async fn mark_processed(&self, event_id: &EventId) -> Result<()> {
        (**self).mark_processed(event_id).await
    }

    async fn get(&self, event_id: &EventId) -> Result<Option<ProcessedEventRecord>> {
        (**self).get(event_id).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        (**self).purge_expired(now).await
    }
}

/// In-memory processed-event ledger for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessedEventLedger {
    records: Arc<RwLock<HashMap<EventId, ProcessedEventRecord>>>,
    retention: RetentionPolicy,
    fail_on_check: Arc<AtomicBool>,
    fail_on_mark: Arc<AtomicBool>,
}

impl InMemoryProcessedEventLedger {
    /// Creates an empty ledger with the default 90-day retention.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    /// Returns the number of records currently held.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Makes `is_processed` fail with `ProjectionStoreError::Unavailable`.
    pub fn set_fail_on_check(&self, fail: bool) {
        self.fail_on_check.store(fail, Ordering::SeqCst);
    }

    /// Makes `mark_processed` fail with `ProjectionStoreError::Unavailable`.
    pub fn set_fail_on_mark(&self, fail: bool) {
        self.fail_on_mark.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessedEventLedger for InMemoryProcessedEventLedger {
    async fn is_processed(&self, event_id: &EventId) -> Result<bool> {
        if self.fail_on_check.load(Ordering::SeqCst) {
            return Err(ProjectionStoreError::Unavailable(
                "simulated check failure".to_string(),
            ));
        }
        Ok(self.records.read().await.contains_key(event_id))
    }

    async fn mark_processed(&self, event_id: &EventId) -> Result<()> {
        if self.fail_on_mark.load(Ordering::SeqCst) {
            return Err(ProjectionStoreError::Unavailable(
                "simulated mark failure".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        records
            .entry(event_id.clone())
            .or_insert_with(|| self.retention.record(event_id.clone(), Utc::now()));
        Ok(())
    }

    async fn get(&self, event_id: &EventId) -> Result<Option<ProcessedEventRecord>> {
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        Ok((before - records.len()) as u64)
    }
}

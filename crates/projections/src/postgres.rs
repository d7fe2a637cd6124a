//! PostgreSQL-backed processed-event ledger and read model.
//!
//! Tables are created by `event_store::run_migrations`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, EventId, OrderId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::Result;
use crate::processed::{ProcessedEventLedger, ProcessedEventRecord, RetentionPolicy};
use crate::read_model::{ReadModelOrder, ReadModelStore};

/// Processed-event ledger over the `processed_events` table.
#[derive(Clone)]
pub struct PostgresProcessedEventLedger {
    pool: PgPool,
    retention: RetentionPolicy,
}

impl PostgresProcessedEventLedger {
    pub fn new(pool: PgPool, retention: RetentionPolicy) -> Self {
        Self { pool, retention }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_record(row: PgRow) -> Result<ProcessedEventRecord> {
        Ok(ProcessedEventRecord {
            event_id: EventId::new(row.try_get::<String, _>("event_id")?),
            processed_at: row.try_get("processed_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

#[async_trait]
impl ProcessedEventLedger for PostgresProcessedEventLedger {
    async fn is_processed(&self, event_id: &EventId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM processed_events WHERE event_id = $1)",
        )
        .bind(event_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(event_id = %event_id))]
    async fn mark_processed(&self, event_id: &EventId) -> Result<()> {
        let record = self.retention.record(event_id.clone(), Utc::now());

        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, processed_at, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(record.event_id.as_str())
        .bind(record.processed_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("event already marked processed");
        }
        Ok(())
    }

    async fn get(&self, event_id: &EventId) -> Result<Option<ProcessedEventRecord>> {
        let row = sqlx::query(
            "SELECT event_id, processed_at, expires_at FROM processed_events WHERE event_id = $1",
        )
        .bind(event_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM processed_events WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        metrics::counter!("processed_events_purged_total").increment(removed);
        tracing::info!(removed, "expired processed-event records purged");
        Ok(removed)
    }
}

/// Order read model over the `orders_read` table.
#[derive(Clone)]
pub struct PostgresReadModelStore {
    pool: PgPool,
}

impl PostgresReadModelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReadModelStore for PostgresReadModelStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn upsert(&self, order: &ReadModelOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders_read (order_id, customer_id, total_cents, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_id) DO UPDATE
            SET customer_id = EXCLUDED.customer_id,
                total_cents = EXCLUDED.total_cents,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(order.customer_id.as_str())
        .bind(order.total_cents)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;

        metrics::counter!("read_model_upserts_total").increment(1);
        Ok(())
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<ReadModelOrder>> {
        let row = sqlx::query(
            "SELECT order_id, customer_id, total_cents, created_at FROM orders_read WHERE order_id = $1",
        )
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ReadModelOrder {
            order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
            total_cents: row.try_get("total_cents")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

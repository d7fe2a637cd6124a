use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    CorrelationId, EventId, EventRecord, EventStoreError, IdempotencyKey, OrderId, Result,
    store::{EventLedger, validate_record_for_append},
};

/// Applies every workspace migration (event ledger, processed events,
/// read model) to the pool.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// PostgreSQL-backed event ledger implementation.
///
/// `event_id` is the primary key and `idempotency_key` carries a unique
/// constraint; `INSERT ... ON CONFLICT DO NOTHING` makes the existence check
/// and the write a single statement.
#[derive(Clone)]
pub struct PostgresEventLedger {
    pool: PgPool,
}

impl PostgresEventLedger {
    /// Creates a new PostgreSQL event ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_record(row: PgRow) -> Result<EventRecord> {
        Ok(EventRecord {
            event_id: EventId::new(row.try_get::<String, _>("event_id")?),
            idempotency_key: IdempotencyKey::new(row.try_get::<String, _>("idempotency_key")?),
            order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
            event_type: row.try_get("event_type")?,
            source: row.try_get("source")?,
            version: row.try_get("version")?,
            correlation_id: CorrelationId::new(row.try_get::<String, _>("correlation_id")?),
            created_at: row.try_get("created_at")?,
            data: row.try_get("data")?,
        })
    }
}

#[async_trait]
impl EventLedger for PostgresEventLedger {
    #[tracing::instrument(skip(self, record), fields(event_id = %record.event_id, order_id = %record.order_id))]
    async fn append(&self, record: EventRecord) -> Result<()> {
        validate_record_for_append(&record)?;

        let result = sqlx::query(
            r#"
            INSERT INTO event_ledger
                (event_id, idempotency_key, order_id, event_type, source, version, correlation_id, created_at, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(record.event_id.as_str())
        .bind(record.idempotency_key.as_str())
        .bind(record.order_id.as_str())
        .bind(&record.event_type)
        .bind(&record.source)
        .bind(&record.version)
        .bind(record.correlation_id.as_str())
        .bind(record.created_at)
        .bind(&record.data)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!("event already recorded");
            return Err(EventStoreError::Conflict {
                event_id: record.event_id,
                idempotency_key: record.idempotency_key,
            });
        }

        metrics::counter!("event_ledger_appends_total").increment(1);
        tracing::debug!("event recorded");
        Ok(())
    }

    async fn events_for_order(&self, order_id: &OrderId) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, idempotency_key, order_id, event_type, source, version, correlation_id, created_at, data
            FROM event_ledger
            WHERE order_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn find_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<EventRecord>> {
        let row = sqlx::query(
            r#"
            SELECT event_id, idempotency_key, order_id, event_type, source, version, correlation_id, created_at, data
            FROM event_ledger
            WHERE idempotency_key = $1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }
}

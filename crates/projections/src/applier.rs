//! Projection applier (read path).
//!
//! Per delivery: check dedupe → parse → upsert read model → mark processed.
//! The upsert runs before the mark, so a crash between the two re-enters
//! safely: the next delivery is not yet marked and repeats an identical
//! overwrite.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{
    Classify, CorrelationId, EventId, Instrumentation, NoopInstrumentation, Outcome, UseCase,
};
use domain::{EVENT_VERSION_V1, OrderCreatedEnvelope};

use crate::error::{ApplyError, ApplyStage};
use crate::processed::ProcessedEventLedger;
use crate::read_model::{ReadModelOrder, ReadModelStore};

/// Result of a successful apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The read model was written and the event marked processed.
    Applied,
    /// The event was already processed; nothing was written.
    AlreadyApplied,
}

/// Applies order-created deliveries to the read model at most once.
///
/// A parse failure leaves no processed record behind. A redelivery of the
/// same malformed event fails the same way and is dropped again.
pub struct ProjectionApplier<D, R>
where
    D: ProcessedEventLedger,
    R: ReadModelStore,
{
    processed: D,
    read_model: R,
    instrumentation: Arc<dyn Instrumentation>,
}

impl<D, R> ProjectionApplier<D, R>
where
    D: ProcessedEventLedger,
    R: ReadModelStore,
{
    pub fn new(processed: D, read_model: R) -> Self {
        Self {
            processed,
            read_model,
            instrumentation: Arc::new(NoopInstrumentation),
        }
    }

    /// Replaces the instrumentation hook.
    pub fn with_instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    pub fn processed(&self) -> &D {
        &self.processed
    }

    pub fn read_model(&self) -> &R {
        &self.read_model
    }

    /// Decodes a raw delivery body and applies it.
    ///
    /// A body that is not an order-created envelope is a parse failure.
    pub async fn apply_json(&self, body: &[u8]) -> Result<ApplyOutcome, ApplyError> {
        let started = Instant::now();
        match serde_json::from_slice::<OrderCreatedEnvelope>(body) {
            Ok(envelope) => self.apply(&envelope).await,
            Err(e) => {
                let err = ApplyError::Parse {
                    event_id: EventId::default(),
                    reason: format!("undecodable envelope: {e}"),
                };
                tracing::warn!(error = %err, "dropping malformed delivery");
                self.instrumentation.record(
                    UseCase::ApplyOrderCreated,
                    Outcome::Failed(err.kind()),
                    started.elapsed(),
                    &CorrelationId::default(),
                );
                Err(err)
            }
        }
    }

    /// Applies one delivery of an order-created event.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            event_id = %envelope.event_id,
            order_id = %envelope.order_id,
            correlation_id = %envelope.correlation_id
        )
    )]
    pub async fn apply(&self, envelope: &OrderCreatedEnvelope) -> Result<ApplyOutcome, ApplyError> {
        let started = Instant::now();
        let result = self.run(envelope).await;

        let outcome = match &result {
            Ok(ApplyOutcome::Applied) => Outcome::Success,
            Ok(ApplyOutcome::AlreadyApplied) => Outcome::Duplicate,
            Err(e) => Outcome::Failed(e.kind()),
        };
        self.instrumentation.record(
            UseCase::ApplyOrderCreated,
            outcome,
            started.elapsed(),
            &envelope.correlation_id,
        );

        result
    }

    async fn run(&self, envelope: &OrderCreatedEnvelope) -> Result<ApplyOutcome, ApplyError> {
        if envelope.event_id.is_empty() {
            let err = parse_error(envelope, "missing event id".to_string());
            tracing::warn!(error = %err, "dropping malformed event");
            return Err(err);
        }

        let already = self
            .processed
            .is_processed(&envelope.event_id)
            .await
            .map_err(|source| store_error(ApplyStage::CheckProcessed, source))?;
        if already {
            tracing::info!("event already applied");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let order = to_read_model(envelope).inspect_err(|err| {
            tracing::warn!(error = %err, "dropping malformed event");
        })?;

        self.read_model
            .upsert(&order)
            .await
            .map_err(|source| store_error(ApplyStage::Upsert, source))?;

        self.processed
            .mark_processed(&envelope.event_id)
            .await
            .map_err(|source| store_error(ApplyStage::MarkProcessed, source))?;

        tracing::info!(total_cents = order.total_cents, "read model updated");
        Ok(ApplyOutcome::Applied)
    }
}

/// Converts an envelope into a read model row.
fn to_read_model(envelope: &OrderCreatedEnvelope) -> Result<ReadModelOrder, ApplyError> {
    if envelope.version != EVENT_VERSION_V1 {
        tracing::warn!(version = %envelope.version, "unknown event version, applying as 1.0");
    }

    if envelope.order_id.is_empty() {
        return Err(parse_error(envelope, "missing order id".to_string()));
    }

    let created_at = DateTime::parse_from_rfc3339(&envelope.created_at)
        .map_err(|e| {
            parse_error(
                envelope,
                format!("invalid created_at {:?}: {e}", envelope.created_at),
            )
        })?
        .with_timezone(&Utc);

    Ok(ReadModelOrder {
        order_id: envelope.order_id.clone(),
        customer_id: envelope.customer_id.clone(),
        total_cents: envelope.total_cents,
        created_at,
    })
}

fn parse_error(envelope: &OrderCreatedEnvelope, reason: String) -> ApplyError {
    ApplyError::Parse {
        event_id: envelope.event_id.clone(),
        reason,
    }
}

fn store_error(stage: ApplyStage, source: crate::error::ProjectionStoreError) -> ApplyError {
    tracing::error!(%stage, error = %source, "projection store failure");
    ApplyError::Store { stage, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processed::InMemoryProcessedEventLedger;
    use crate::read_model::InMemoryReadModelStore;
    use common::{CustomerId, FailureKind, OrderId, RecordingInstrumentation};

    type Applier = ProjectionApplier<InMemoryProcessedEventLedger, InMemoryReadModelStore>;

    fn applier() -> (Applier, RecordingInstrumentation) {
        let recorder = RecordingInstrumentation::new();
        let applier = ProjectionApplier::new(
            InMemoryProcessedEventLedger::new(),
            InMemoryReadModelStore::new(),
        )
        .with_instrumentation(Arc::new(recorder.clone()));
        (applier, recorder)
    }

    fn envelope(event_id: &str, created_at: &str) -> OrderCreatedEnvelope {
        OrderCreatedEnvelope {
            event_id: EventId::new(event_id),
            correlation_id: CorrelationId::new("corr-1"),
            order_id: OrderId::new("o1"),
            customer_id: CustomerId::new("c1"),
            total_cents: 100,
            created_at: created_at.to_string(),
            version: "1.0".to_string(),
        }
    }

    #[tokio::test]
    async fn test_applies_new_event() {
        let (applier, recorder) = applier();

        let outcome = applier
            .apply(&envelope("e1", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Applied);
        let row = applier
            .read_model()
            .get(&OrderId::new("o1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.customer_id.as_str(), "c1");
        assert_eq!(row.total_cents, 100);
        assert_eq!(row.created_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert!(
            applier
                .processed()
                .is_processed(&EventId::new("e1"))
                .await
                .unwrap()
        );
        assert_eq!(
            recorder.outcomes(),
            vec![(UseCase::ApplyOrderCreated, Outcome::Success)]
        );
    }

    #[tokio::test]
    async fn test_redelivery_does_not_write_again() {
        let (applier, recorder) = applier();
        let event = envelope("e1", "2024-01-01T00:00:00Z");

        applier.apply(&event).await.unwrap();
        let outcome = applier.apply(&event).await.unwrap();

        assert_eq!(outcome, ApplyOutcome::AlreadyApplied);
        assert_eq!(applier.read_model().write_count(), 1);
        assert_eq!(applier.processed().record_count().await, 1);
        assert_eq!(
            recorder.outcomes()[1],
            (UseCase::ApplyOrderCreated, Outcome::Duplicate)
        );
    }

    #[tokio::test]
    async fn test_unparsable_timestamp_is_terminal_and_leaves_no_record() {
        let (applier, recorder) = applier();

        let err = applier
            .apply(&envelope("e-bad", "yesterday"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::Parse { .. }));
        assert_eq!(err.kind(), FailureKind::Parse);
        assert!(!err.is_retriable());
        assert_eq!(applier.read_model().write_count(), 0);
        assert!(
            !applier
                .processed()
                .is_processed(&EventId::new("e-bad"))
                .await
                .unwrap()
        );
        assert_eq!(
            recorder.outcomes(),
            vec![(
                UseCase::ApplyOrderCreated,
                Outcome::Failed(FailureKind::Parse)
            )]
        );
    }

    #[tokio::test]
    async fn test_empty_event_id_is_a_parse_failure() {
        let (applier, _) = applier();

        let err = applier
            .apply(&envelope("", "2024-01-01T00:00:00Z"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Parse);
        assert_eq!(applier.read_model().write_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_version_is_applied_as_v1() {
        let (applier, _) = applier();
        let mut event = envelope("e1", "2024-01-01T00:00:00Z");
        event.version = "2.0".to_string();

        assert_eq!(applier.apply(&event).await.unwrap(), ApplyOutcome::Applied);
    }

    #[tokio::test]
    async fn test_check_failure_is_retriable() {
        let (applier, _) = applier();
        applier.processed().set_fail_on_check(true);

        let err = applier
            .apply(&envelope("e1", "2024-01-01T00:00:00Z"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApplyError::Store {
                stage: ApplyStage::CheckProcessed,
                ..
            }
        ));
        assert!(err.is_retriable());
        assert_eq!(applier.read_model().write_count(), 0);
    }

    #[tokio::test]
    async fn test_upsert_failure_is_retriable_and_unmarked() {
        let (applier, _) = applier();
        applier.read_model().set_fail_on_upsert(true);
        let event = envelope("e1", "2024-01-01T00:00:00Z");

        let err = applier.apply(&event).await.unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(applier.processed().record_count().await, 0);

        applier.read_model().set_fail_on_upsert(false);
        assert_eq!(applier.apply(&event).await.unwrap(), ApplyOutcome::Applied);
    }

    #[tokio::test]
    async fn test_crash_between_upsert_and_mark_reenters_safely() {
        let (applier, _) = applier();
        applier.processed().set_fail_on_mark(true);
        let event = envelope("e1", "2024-01-01T00:00:00Z");

        let err = applier.apply(&event).await.unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Store {
                stage: ApplyStage::MarkProcessed,
                ..
            }
        ));
        let first = applier.read_model().get(&OrderId::new("o1")).await.unwrap();

        applier.processed().set_fail_on_mark(false);
        assert_eq!(applier.apply(&event).await.unwrap(), ApplyOutcome::Applied);
        let second = applier.read_model().get(&OrderId::new("o1")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(applier.read_model().write_count(), 2);
        assert_eq!(applier.read_model().order_count().await, 1);
    }

    #[tokio::test]
    async fn test_apply_json_rejects_undecodable_body() {
        let (applier, recorder) = applier();

        let err = applier.apply_json(b"{not json").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);

        let outcome = applier
            .apply_json(
                br#"{"event_id":"e1","order_id":"o1","customer_id":"c1","total_cents":100,"created_at":"2024-01-01T00:00:00Z"}"#,
            )
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(recorder.outcomes().len(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_body_records_elapsed_time() {
        let (applier, recorder) = applier();
        // An unterminated string forces the decoder through the whole body.
        let mut body = br#"{"event_id":""#.to_vec();
        body.extend(std::iter::repeat_n(b'a', 4 * 1024 * 1024));

        let err = applier.apply_json(&body).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Parse);
        assert_eq!(
            recorder.outcomes(),
            vec![(
                UseCase::ApplyOrderCreated,
                Outcome::Failed(FailureKind::Parse)
            )]
        );
        let elapsed = recorder.elapsed();
        assert_eq!(elapsed.len(), 1);
        assert!(elapsed[0] > std::time::Duration::ZERO);
    }
}

//! Integration tests for the create-order write path.
//!
//! These tests drive `CreateOrderHandler` end to end against the in-memory
//! ledger and publisher, covering idempotent retries, concurrency and the
//! stored-but-not-published state.

use std::sync::Arc;

use common::{Classify, CorrelationId, FailureKind, Outcome, RecordingInstrumentation, UseCase};
use domain::{
    CommandFailure, CreateOrderHandler, CreateOrderInput, EventPublisher, InMemoryEventPublisher,
    OrderCreatedEnvelope, ValidationError,
};
use event_store::{EventLedger, InMemoryEventLedger, OrderId};

type Handler = CreateOrderHandler<Arc<InMemoryEventLedger>, Arc<InMemoryEventPublisher>>;

/// Helper to create a handler sharing its ledger and publisher with the test
fn setup() -> (Handler, Arc<InMemoryEventLedger>, Arc<InMemoryEventPublisher>) {
    let ledger = Arc::new(InMemoryEventLedger::new());
    let publisher = Arc::new(InMemoryEventPublisher::new());
    let handler = CreateOrderHandler::new(ledger.clone(), publisher.clone());
    (handler, ledger, publisher)
}

mod write_path {
    use super::*;

    #[tokio::test]
    async fn test_created_order_is_recorded_and_published() {
        let (handler, ledger, publisher) = setup();

        let created = handler
            .execute(
                CreateOrderInput::new("cust-1", 500).with_order_id("order-1"),
                CorrelationId::new("corr-1"),
            )
            .await
            .unwrap();

        let records = ledger
            .events_for_order(&OrderId::new("order-1"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.event_id, *created.event.event_id());
        assert_eq!(record.event_type, "OrderCreated");
        assert_eq!(record.source, "app.orders");
        assert_eq!(record.version, "1.0");
        assert_eq!(record.idempotency_key.as_str(), "order:order-1");
        assert_eq!(record.correlation_id.as_str(), "corr-1");

        // The stored data is exactly the envelope that went on the bus.
        let stored: OrderCreatedEnvelope = serde_json::from_value(record.data.clone()).unwrap();
        let published = publisher.published().await;
        assert_eq!(published, vec![stored]);
        assert_eq!(published[0].customer_id.as_str(), "cust-1");
        assert_eq!(published[0].total_cents, 500);
    }

    #[tokio::test]
    async fn test_each_command_gets_a_fresh_event_id() {
        let (handler, _, publisher) = setup();

        for n in 0..3 {
            handler
                .execute(
                    CreateOrderInput::new("cust-1", 100 + n),
                    CorrelationId::generate(),
                )
                .await
                .unwrap();
        }

        let published = publisher.published().await;
        assert_eq!(published.len(), 3);
        assert_ne!(published[0].event_id, published[1].event_id);
        assert_ne!(published[1].event_id, published[2].event_id);
        assert_ne!(published[0].order_id, published[1].order_id);
    }

    #[tokio::test]
    async fn test_each_validation_failure_names_its_field() {
        let (handler, ledger, _) = setup();

        let cases = [
            (CreateOrderInput::new("", 500), ValidationError::InvalidCustomerId),
            (
                CreateOrderInput::new("cust-1", -5),
                ValidationError::InvalidTotal { total_cents: -5 },
            ),
        ];

        for (input, expected) in cases {
            match handler.execute(input, CorrelationId::generate()).await {
                Err(CommandFailure::Validation(err)) => assert_eq!(err, expected),
                other => panic!("expected validation failure, got {other:?}"),
            }
        }

        assert_eq!(ledger.record_count().await, 0);
    }
}

mod idempotency {
    use super::*;

    #[tokio::test]
    async fn test_retried_command_is_committed_once() {
        let (handler, ledger, publisher) = setup();
        let input = CreateOrderInput::new("cust-1", 500).with_order_id("order-1");

        handler
            .execute(input.clone(), CorrelationId::generate())
            .await
            .unwrap();

        for _ in 0..3 {
            let err = handler
                .execute(input.clone(), CorrelationId::generate())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::Conflict);
            assert!(!err.is_retriable());
        }

        assert_eq!(ledger.record_count().await, 1);
        assert_eq!(publisher.publish_count().await, 1);
    }

    #[tokio::test]
    async fn test_explicit_key_decides_uniqueness() {
        let (handler, ledger, _) = setup();

        handler
            .execute(
                CreateOrderInput::new("cust-1", 500)
                    .with_order_id("order-1")
                    .with_idempotency_key("req-a"),
                CorrelationId::generate(),
            )
            .await
            .unwrap();

        // A different explicit key is a different command.
        handler
            .execute(
                CreateOrderInput::new("cust-1", 500)
                    .with_order_id("order-1")
                    .with_idempotency_key("req-b"),
                CorrelationId::generate(),
            )
            .await
            .unwrap();

        let err = handler
            .execute(
                CreateOrderInput::new("cust-1", 500).with_idempotency_key("req-a"),
                CorrelationId::generate(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommandFailure::AlreadyExists { .. }));

        let records = ledger
            .events_for_order(&OrderId::new("order-1"))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_retries_produce_one_event() {
        let (handler, ledger, publisher) = setup();
        let handler = Arc::new(handler);
        let input = CreateOrderInput::new("cust-1", 500).with_order_id("order-race");

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let handler = handler.clone();
            let input = input.clone();
            tasks.push(tokio::spawn(async move {
                handler.execute(input, CorrelationId::generate()).await
            }));
        }

        let mut created = 0;
        let mut duplicates = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(CommandFailure::AlreadyExists { .. }) => duplicates += 1,
                Err(other) => panic!("unexpected failure: {other:?}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(duplicates, 15);
        assert_eq!(ledger.record_count().await, 1);
        assert_eq!(publisher.publish_count().await, 1);
    }
}

mod partial_failure {
    use super::*;

    #[tokio::test]
    async fn test_publish_only_retry_completes_the_command() {
        let recorder = RecordingInstrumentation::new();
        let ledger = Arc::new(InMemoryEventLedger::new());
        let publisher = Arc::new(InMemoryEventPublisher::new());
        let handler = CreateOrderHandler::new(ledger.clone(), publisher.clone())
            .with_instrumentation(Arc::new(recorder.clone()));

        publisher.set_fail_on_publish(true);
        let err = handler
            .execute(
                CreateOrderInput::new("cust-1", 500).with_order_id("order-1"),
                CorrelationId::generate(),
            )
            .await
            .unwrap_err();

        let CommandFailure::NotPublished { created, source } = err else {
            panic!("expected NotPublished");
        };
        assert!(source.is_retriable());

        // Still failing: publish-only retries do not touch the ledger.
        assert!(handler.republish(&created.event).await.is_err());
        assert_eq!(ledger.record_count().await, 1);

        publisher.set_fail_on_publish(false);
        handler.republish(&created.event).await.unwrap();

        assert_eq!(ledger.record_count().await, 1);
        assert_eq!(publisher.published().await, vec![created.event.envelope()]);

        // Re-running the whole command instead would only see the conflict.
        let err = handler
            .execute(
                CreateOrderInput::new("cust-1", 500).with_order_id("order-1"),
                CorrelationId::generate(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommandFailure::AlreadyExists { .. }));

        assert_eq!(
            recorder.outcomes(),
            vec![
                (
                    UseCase::CreateOrder,
                    Outcome::Failed(FailureKind::Infrastructure)
                ),
                (UseCase::CreateOrder, Outcome::Duplicate),
            ]
        );
    }

    #[tokio::test]
    async fn test_republish_through_trait_object() {
        let (handler, _, publisher) = setup();
        let created = handler
            .execute(CreateOrderInput::new("cust-1", 500), CorrelationId::generate())
            .await
            .unwrap();

        let dynamic: Arc<dyn EventPublisher> = publisher.clone();
        dynamic.publish(&created.event).await.unwrap();

        // At-least-once: the bus may carry the same event twice.
        let published = publisher.published().await;
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].event_id, published[1].event_id);
    }
}

//! The create-order command handler (write path).

use std::sync::Arc;
use std::time::Instant;

use common::{
    Classify, CorrelationId, EventId, IdempotencyKey, Instrumentation, NoopInstrumentation,
    OrderId, Outcome, UseCase,
};
use event_store::{EventLedger, EventStoreError};

use crate::error::CommandFailure;
use crate::order::{CreateOrderInput, Order, OrderCreated};
use crate::publisher::{EventPublisher, PublishError};

/// A command that was validated, committed to the ledger and published.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedOrder {
    pub order: Order,
    pub event: OrderCreated,
}

/// Handler for create-order commands.
///
/// Runs validate → build event → ledger append → publish. The ledger's
/// conditional insert is the only guard against duplicate commands; the
/// handler holds no state of its own between invocations.
pub struct CreateOrderHandler<L, P>
where
    L: EventLedger,
    P: EventPublisher,
{
    ledger: L,
    publisher: P,
    instrumentation: Arc<dyn Instrumentation>,
}

impl<L, P> CreateOrderHandler<L, P>
where
    L: EventLedger,
    P: EventPublisher,
{
    /// Creates a handler that records no outcomes.
    pub fn new(ledger: L, publisher: P) -> Self {
        Self {
            ledger,
            publisher,
            instrumentation: Arc::new(NoopInstrumentation),
        }
    }

    /// Replaces the instrumentation hook.
    pub fn with_instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Executes one create-order command.
    ///
    /// On `CommandFailure::NotPublished` the event is already in the ledger;
    /// re-running the command would only report `AlreadyExists`, so the caller
    /// should re-drive [`republish`](Self::republish) instead.
    #[tracing::instrument(skip(self, input, correlation_id), fields(correlation_id = %correlation_id))]
    pub async fn execute(
        &self,
        input: CreateOrderInput,
        correlation_id: CorrelationId,
    ) -> Result<CreatedOrder, CommandFailure> {
        let started = Instant::now();
        let result = self.run(&input, &correlation_id).await;

        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(CommandFailure::AlreadyExists { .. }) => Outcome::Duplicate,
            Err(e) => Outcome::Failed(e.kind()),
        };
        self.instrumentation
            .record(UseCase::CreateOrder, outcome, started.elapsed(), &correlation_id);

        result
    }

    /// Publishes an already-stored event again. Never touches the ledger.
    #[tracing::instrument(
        skip(self, event),
        fields(event_id = %event.event_id(), order_id = %event.order_id())
    )]
    pub async fn republish(&self, event: &OrderCreated) -> Result<(), PublishError> {
        self.publisher.publish(event).await?;
        tracing::info!("stored event published");
        Ok(())
    }

    async fn run(
        &self,
        input: &CreateOrderInput,
        correlation_id: &CorrelationId,
    ) -> Result<CreatedOrder, CommandFailure> {
        let order = Order::from_input(input).inspect_err(|e| {
            tracing::warn!(field = e.field(), error = %e, "create order rejected");
        })?;

        let idempotency_key = input.idempotency_key_for(order.id());
        let event = OrderCreated::new(
            EventId::generate(),
            correlation_id.clone(),
            idempotency_key,
            &order,
        );

        match self.ledger.append(event.to_record()).await {
            Ok(()) => {}
            Err(EventStoreError::Conflict {
                idempotency_key, ..
            }) => {
                let existing = self.existing_order_id(&idempotency_key).await?;
                tracing::warn!(
                    existing_order_id = existing.as_ref().map(|id| id.as_str()),
                    idempotency_key = %idempotency_key,
                    "order already exists"
                );
                return Err(CommandFailure::AlreadyExists {
                    order_id: existing,
                    idempotency_key,
                });
            }
            Err(e) => {
                tracing::error!(order_id = %order.id(), error = %e, "event ledger append failed");
                return Err(CommandFailure::Store(e));
            }
        }

        let created = CreatedOrder { order, event };

        if let Err(source) = self.publisher.publish(&created.event).await {
            tracing::error!(
                order_id = %created.order.id(),
                event_id = %created.event.event_id(),
                error = %source,
                "event stored but not published"
            );
            return Err(CommandFailure::NotPublished {
                created: Box::new(created),
                source,
            });
        }

        tracing::info!(
            order_id = %created.order.id(),
            event_id = %created.event.event_id(),
            total_cents = created.order.total_cents(),
            "order created"
        );
        Ok(created)
    }

    /// Resolves the order already committed under `key`. The rejected
    /// command's own order ID may have been generated and never stored.
    async fn existing_order_id(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<OrderId>, CommandFailure> {
        match self.ledger.find_by_idempotency_key(key).await {
            Ok(record) => Ok(record.map(|r| r.order_id)),
            Err(e) => {
                tracing::error!(idempotency_key = %key, error = %e, "existing order lookup failed");
                Err(CommandFailure::Store(e))
            }
        }
    }
}

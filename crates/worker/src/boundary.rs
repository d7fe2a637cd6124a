//! Command, query and delivery boundaries.
//!
//! Each function takes the raw request, runs one use case against the
//! context and turns the classified result into a response or a delivery
//! disposition. Nothing here inspects error internals beyond `FailureKind`.

use std::time::Duration;

use common::{Classify, CorrelationId, FailureKind, OrderId};
use domain::{CommandFailure, CreateOrderInput, CreatedOrder, PublishError};
use event_store::EventLedger;
use projections::ReadModelStore;
use serde::Serialize;
use serde_json::{Value, json};

use crate::context::AppContext;
use crate::error::status_for;

/// Result of a command or query, ready to be written back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,

    pub body: Value,
}

impl Response {
    fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            correlation_id: None,
            body,
        }
    }

    fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Builds a failure response for a classified error.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(
            status_for(kind),
            json!({
                "error": message.into(),
                "kind": kind,
                "retriable": kind.is_retriable(),
            }),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What the bus should do with a delivery after one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done with this delivery, either applied or dropped as terminal.
    Ack,
    /// Leave unacknowledged so the bus delivers it again.
    Redeliver,
}

/// Handles a create-order command body.
///
/// A stored-but-not-published command is re-driven through publish-only
/// retries before the failure is reported.
pub async fn handle_command(
    ctx: &AppContext,
    body: &[u8],
    correlation_header: Option<&str>,
) -> Response {
    let correlation_id = CorrelationId::from_header(correlation_header);

    let input: CreateOrderInput = match serde_json::from_slice(body) {
        Ok(input) => input,
        Err(e) => {
            tracing::warn!(%correlation_id, error = %e, "malformed command body");
            return Response::failure(FailureKind::Validation, format!("malformed request body: {e}"))
                .with_correlation_id(correlation_id);
        }
    };

    let result = match ctx.commands.execute(input, correlation_id.clone()).await {
        Err(CommandFailure::NotPublished { created, source }) => {
            republish_with_retry(ctx, *created, source).await
        }
        other => other,
    };

    let response = match result {
        Ok(created) => Response::new(201, created_body(&created)),
        Err(failure) => failure_response(&failure),
    };
    response.with_correlation_id(correlation_id)
}

/// Lists the ledger records of one order, oldest first.
pub async fn handle_events(ctx: &AppContext, order_id: &str) -> Response {
    let order_id = OrderId::new(order_id);

    match ctx.commands.ledger().events_for_order(&order_id).await {
        Ok(events) => Response::new(200, json!({ "order_id": order_id, "events": events })),
        Err(e) => {
            tracing::error!(%order_id, error = %e, "event query failed");
            Response::failure(e.kind(), e.to_string())
        }
    }
}

/// Looks up one order in the read model.
pub async fn handle_get_order(ctx: &AppContext, order_id: &str) -> Response {
    let order_id = OrderId::new(order_id);

    match ctx.projection.read_model().get(&order_id).await {
        Ok(Some(order)) => Response::new(200, json!(order)),
        Ok(None) => Response::new(404, json!({ "error": format!("order {order_id} not found") })),
        Err(e) => {
            tracing::error!(%order_id, error = %e, "read model query failed");
            Response::failure(e.kind(), e.to_string())
        }
    }
}

/// Applies one delivery and decides whether the bus should deliver it again.
pub async fn handle_delivery(ctx: &AppContext, body: &[u8]) -> Disposition {
    match ctx.projection.apply_json(body).await {
        Ok(_) => Disposition::Ack,
        Err(err) => match err.kind() {
            FailureKind::Infrastructure => Disposition::Redeliver,
            FailureKind::Parse | FailureKind::Validation | FailureKind::Conflict => {
                Disposition::Ack
            }
        },
    }
}

async fn republish_with_retry(
    ctx: &AppContext,
    created: CreatedOrder,
    mut last_error: PublishError,
) -> Result<CreatedOrder, CommandFailure> {
    for attempt in 1..=ctx.config.publish_retry_attempts {
        tokio::time::sleep(publish_backoff(attempt)).await;

        match ctx.commands.republish(&created.event).await {
            Ok(()) => return Ok(created),
            Err(e) => {
                tracing::warn!(
                    attempt,
                    event_id = %created.event.event_id(),
                    error = %e,
                    "publish retry failed"
                );
                last_error = e;
            }
        }
    }

    Err(CommandFailure::NotPublished {
        created: Box::new(created),
        source: last_error,
    })
}

fn publish_backoff(attempt: u32) -> Duration {
    Duration::from_millis(20 * 2u64.pow(attempt.saturating_sub(1).min(6)))
}

fn created_body(created: &CreatedOrder) -> Value {
    json!({
        "order_id": created.order.id(),
        "customer_id": created.order.customer_id(),
        "total_cents": created.order.total_cents(),
        "created_at": created.event.envelope().created_at,
    })
}

fn failure_response(failure: &CommandFailure) -> Response {
    let mut response = Response::failure(failure.kind(), failure.to_string());

    match failure {
        CommandFailure::Validation(e) => {
            response.body["field"] = json!(e.field());
        }
        CommandFailure::AlreadyExists { order_id, .. } => {
            if let Some(order_id) = order_id {
                response.body["order_id"] = json!(order_id);
            }
        }
        CommandFailure::Store(_) => {
            response.body["stored"] = json!(false);
        }
        CommandFailure::NotPublished { created, .. } => {
            response.body["stored"] = json!(true);
            response.body["order_id"] = json!(created.order.id());
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ValidationError;

    #[test]
    fn test_failure_response_fields() {
        let response = failure_response(&CommandFailure::Validation(
            ValidationError::InvalidCustomerId,
        ));
        assert_eq!(response.status, 400);
        assert_eq!(response.body["kind"], "validation");
        assert_eq!(response.body["field"], "customer_id");
        assert_eq!(response.body["retriable"], false);

        let response = failure_response(&CommandFailure::AlreadyExists {
            order_id: Some(OrderId::new("o1")),
            idempotency_key: common::IdempotencyKey::new("order:o1"),
        });
        assert_eq!(response.status, 409);
        assert_eq!(response.body["order_id"], "o1");

        let response = failure_response(&CommandFailure::AlreadyExists {
            order_id: None,
            idempotency_key: common::IdempotencyKey::new("req-1"),
        });
        assert_eq!(response.status, 409);
        assert!(response.body.get("order_id").is_none());
    }

    #[test]
    fn test_publish_backoff_grows_and_caps() {
        assert_eq!(publish_backoff(1), Duration::from_millis(20));
        assert_eq!(publish_backoff(2), Duration::from_millis(40));
        assert_eq!(publish_backoff(100), publish_backoff(7));
    }
}

//! The order-created event and its bus envelope.

use chrono::{DateTime, SecondsFormat, Utc};
use common::{CorrelationId, CustomerId, EventId, IdempotencyKey, OrderId};
use event_store::EventRecord;
use serde::{Deserialize, Serialize};

use super::Order;

pub const EVENT_TYPE_ORDER_CREATED: &str = "OrderCreated";
pub const EVENT_SOURCE_ORDERS: &str = "app.orders";
pub const EVENT_VERSION_V1: &str = "1.0";

/// Envelope of an order-created event as it travels on the bus.
///
/// `created_at` stays a string on the wire; the read path parses it and
/// treats an unparsable value as a terminal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEnvelope {
    pub event_id: EventId,

    #[serde(default)]
    pub correlation_id: CorrelationId,

    pub order_id: OrderId,

    pub customer_id: CustomerId,

    pub total_cents: i64,

    /// RFC 3339 timestamp.
    pub created_at: String,

    #[serde(default)]
    pub version: String,
}

/// Immutable event recording the creation of one order.
///
/// Built once per command from a validated [`Order`]; `event_id` is assigned
/// here and never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCreated {
    event_id: EventId,
    correlation_id: CorrelationId,
    idempotency_key: IdempotencyKey,
    order_id: OrderId,
    customer_id: CustomerId,
    total_cents: i64,
    created_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl OrderCreated {
    /// Derives the event from a validated order plus correlation metadata.
    pub fn new(
        event_id: EventId,
        correlation_id: CorrelationId,
        idempotency_key: IdempotencyKey,
        order: &Order,
    ) -> Self {
        let payload = serde_json::json!({
            "event_id": event_id.as_str(),
            "correlation_id": correlation_id.as_str(),
            "order_id": order.id().as_str(),
            "customer_id": order.customer_id().as_str(),
            "total_cents": order.total_cents(),
            "created_at": format_timestamp(order.created_at()),
            "version": EVENT_VERSION_V1,
        });

        Self {
            event_id,
            correlation_id,
            idempotency_key,
            order_id: order.id().clone(),
            customer_id: order.customer_id().clone(),
            total_cents: order.total_cents(),
            created_at: order.created_at(),
            payload,
        }
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    pub fn event_type(&self) -> &'static str {
        EVENT_TYPE_ORDER_CREATED
    }

    pub fn source(&self) -> &'static str {
        EVENT_SOURCE_ORDERS
    }

    pub fn version(&self) -> &'static str {
        EVENT_VERSION_V1
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    pub fn total_cents(&self) -> i64 {
        self.total_cents
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The serialized envelope, as stored in the ledger's `data` column.
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Returns the envelope published to the bus.
    pub fn envelope(&self) -> OrderCreatedEnvelope {
        OrderCreatedEnvelope {
            event_id: self.event_id.clone(),
            correlation_id: self.correlation_id.clone(),
            order_id: self.order_id.clone(),
            customer_id: self.customer_id.clone(),
            total_cents: self.total_cents,
            created_at: format_timestamp(self.created_at),
            version: EVENT_VERSION_V1.to_string(),
        }
    }

    /// Returns the ledger record for this event.
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            event_id: self.event_id.clone(),
            idempotency_key: self.idempotency_key.clone(),
            order_id: self.order_id.clone(),
            event_type: EVENT_TYPE_ORDER_CREATED.to_string(),
            source: EVENT_SOURCE_ORDERS.to_string(),
            version: EVENT_VERSION_V1.to_string(),
            correlation_id: self.correlation_id.clone(),
            created_at: self.created_at,
            data: self.payload.clone(),
        }
    }
}

/// Formats a timestamp as RFC 3339 with second precision and a `Z` suffix.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

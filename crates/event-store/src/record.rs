use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CorrelationId, EventId, IdempotencyKey, OrderId};

/// A committed entry in the event ledger.
///
/// Indexed fields are stored next to `data`, the serialized event envelope,
/// so audit queries by order do not need to decode the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier of the event. Primary key of the ledger.
    pub event_id: EventId,

    /// Key of the command that produced the event. Unique across the ledger.
    pub idempotency_key: IdempotencyKey,

    /// The order this event belongs to.
    pub order_id: OrderId,

    /// The type of the event (e.g., "OrderCreated").
    pub event_type: String,

    /// The system that emitted the event (e.g., "app.orders").
    pub source: String,

    /// Schema version of `data`.
    pub version: String,

    /// Tracing identifier of the originating request.
    pub correlation_id: CorrelationId,

    /// When the event was created.
    pub created_at: DateTime<Utc>,

    /// The serialized event envelope.
    pub data: serde_json::Value,
}

impl EventRecord {
    /// Checks the fields the ledger keys on are present.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.event_id.is_empty() {
            return Err("event_id is required".to_string());
        }
        if self.idempotency_key.is_empty() {
            return Err("idempotency_key is required".to_string());
        }
        if self.order_id.is_empty() {
            return Err("order_id is required".to_string());
        }
        if self.event_type.is_empty() {
            return Err("event_type is required".to_string());
        }
        Ok(())
    }
}

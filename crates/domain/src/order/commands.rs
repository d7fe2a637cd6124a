//! Raw create-order command input.

use common::{IdempotencyKey, OrderId};
use serde::{Deserialize, Serialize};

/// Unvalidated input of a create-order command, as received from a caller.
///
/// Missing fields deserialize to empty/zero values so that validation, not
/// JSON decoding, names the offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderInput {
    /// Caller-supplied order ID. Generated when absent or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    #[serde(default)]
    pub customer_id: String,

    #[serde(default)]
    pub total_cents: i64,

    /// Explicit key for collapsing retries. When absent, the key is derived
    /// from the order ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl CreateOrderInput {
    /// Creates input for a customer and total, with no order ID or key.
    pub fn new(customer_id: impl Into<String>, total_cents: i64) -> Self {
        Self {
            order_id: None,
            customer_id: customer_id.into(),
            total_cents,
            idempotency_key: None,
        }
    }

    /// Sets the caller-supplied order ID.
    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Sets an explicit idempotency key.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Returns the supplied order ID, or a freshly generated one.
    pub fn resolved_order_id(&self) -> OrderId {
        match self.order_id.as_deref() {
            Some(id) if !id.is_empty() => OrderId::new(id),
            _ => OrderId::generate(),
        }
    }

    /// Returns the explicit idempotency key, or the key derived from
    /// `order_id`.
    pub fn idempotency_key_for(&self, order_id: &OrderId) -> IdempotencyKey {
        match self.idempotency_key.as_deref() {
            Some(key) if !key.is_empty() => IdempotencyKey::new(key),
            _ => IdempotencyKey::for_order(order_id),
        }
    }
}

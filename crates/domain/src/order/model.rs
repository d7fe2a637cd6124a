use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use serde::Serialize;

use super::{CreateOrderInput, ValidationError};

/// A validated order.
///
/// Only constructible through [`Order::new`] or [`Order::from_input`], so an
/// `Order` value always satisfies every field invariant. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    total_cents: i64,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Validates the fields and stamps `created_at` with the current UTC time.
    ///
    /// Checks run in order (`order_id`, `customer_id`, `total_cents`) and stop
    /// at the first failure.
    pub fn new(
        id: OrderId,
        customer_id: CustomerId,
        total_cents: i64,
    ) -> Result<Self, ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::InvalidOrderId);
        }
        if customer_id.is_empty() {
            return Err(ValidationError::InvalidCustomerId);
        }
        if total_cents <= 0 {
            return Err(ValidationError::InvalidTotal { total_cents });
        }

        Ok(Self {
            id,
            customer_id,
            total_cents,
            created_at: Utc::now(),
        })
    }

    /// Builds an order from raw command input, generating an order ID when
    /// none was supplied.
    pub fn from_input(input: &CreateOrderInput) -> Result<Self, ValidationError> {
        Self::new(
            input.resolved_order_id(),
            CustomerId::new(input.customer_id.as_str()),
            input.total_cents,
        )
    }

    pub fn id(&self) -> &OrderId {
        &self.id
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
}

//! Order value, creation input, and the order-created event.

mod commands;
mod events;
mod model;

pub use commands::CreateOrderInput;
pub use events::{
    EVENT_SOURCE_ORDERS, EVENT_TYPE_ORDER_CREATED, EVENT_VERSION_V1, OrderCreated,
    OrderCreatedEnvelope,
};
pub use model::Order;

use common::{Classify, FailureKind};
use thiserror::Error;

/// Validation failures, checked in field order and short-circuiting on the
/// first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Order ID is empty.
    #[error("invalid order id: must not be empty")]
    InvalidOrderId,

    /// Customer ID is empty.
    #[error("invalid customer id: must not be empty")]
    InvalidCustomerId,

    /// Total is zero or negative.
    #[error("invalid total: {total_cents} (must be greater than 0)")]
    InvalidTotal { total_cents: i64 },
}

impl ValidationError {
    /// Name of the input field that failed validation.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidOrderId => "order_id",
            ValidationError::InvalidCustomerId => "customer_id",
            ValidationError::InvalidTotal { .. } => "total_cents",
        }
    }
}

impl Classify for ValidationError {
    fn kind(&self) -> FailureKind {
        FailureKind::Validation
    }
}

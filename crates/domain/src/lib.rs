//! Write side of the order pipeline.
//!
//! This crate provides:
//! - Order validation and construction (`Order`, `CreateOrderInput`)
//! - The order-created event and its bus envelope
//! - The event publisher contract
//! - `CreateOrderHandler`, which commits each command at most once

pub mod command;
pub mod error;
pub mod order;
pub mod publisher;

pub use command::{CreateOrderHandler, CreatedOrder};
pub use error::CommandFailure;
pub use order::{
    CreateOrderInput, EVENT_SOURCE_ORDERS, EVENT_TYPE_ORDER_CREATED, EVENT_VERSION_V1, Order,
    OrderCreated, OrderCreatedEnvelope, ValidationError,
};
pub use publisher::{EventPublisher, InMemoryEventPublisher, PublishError};

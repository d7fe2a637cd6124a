//! Shared building blocks for the order pipeline.
//!
//! - Identifier newtypes used by both the write and read paths
//! - [`FailureKind`] and [`Classify`], the single failure taxonomy every
//!   boundary switches on
//! - [`Instrumentation`], the hook orchestration code calls once per
//!   terminal outcome

pub mod classify;
pub mod instrument;
pub mod types;

pub use classify::{Classify, FailureKind};
pub use instrument::{
    Instrumentation, MetricsInstrumentation, NoopInstrumentation, Outcome, RecordingInstrumentation,
    UseCase,
};
pub use types::{CorrelationId, CustomerId, EventId, IdempotencyKey, OrderId};

//! Read side of the order pipeline.
//!
//! This crate provides:
//! - [`ProcessedEventLedger`] for at-most-once application of redelivered events
//! - [`ReadModelStore`] for the queryable order projection
//! - [`ProjectionApplier`], which drives dedupe → upsert → mark per delivery
//! - In-memory and PostgreSQL implementations of both stores

pub mod applier;
pub mod error;
pub mod postgres;
pub mod processed;
pub mod read_model;

pub use applier::{ApplyOutcome, ProjectionApplier};
pub use error::{ApplyError, ApplyStage, ProjectionStoreError, Result};
pub use postgres::{PostgresProcessedEventLedger, PostgresReadModelStore};
pub use processed::{
    InMemoryProcessedEventLedger, ProcessedEventLedger, ProcessedEventRecord, RetentionPolicy,
};
pub use read_model::{InMemoryReadModelStore, ReadModelOrder, ReadModelStore};

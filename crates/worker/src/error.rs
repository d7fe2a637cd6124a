//! Boundary error types and the status mapping for command responses.

use common::FailureKind;
use thiserror::Error;

use crate::config::ConfigError;

/// Failures that stop the worker from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    #[error("Metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Status reported for a failed command, by classification.
pub fn status_for(kind: FailureKind) -> u16 {
    match kind {
        FailureKind::Validation | FailureKind::Parse => 400,
        FailureKind::Conflict => 409,
        FailureKind::Infrastructure => 503,
    }
}

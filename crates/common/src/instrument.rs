//! Instrumentation hook invoked after each terminal outcome.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{CorrelationId, FailureKind};

/// The orchestrations that report outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseCase {
    /// Write path: validate, append, publish.
    CreateOrder,
    /// Read path: dedupe, upsert, mark.
    ApplyOrderCreated,
}

impl UseCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            UseCase::CreateOrder => "create_order",
            UseCase::ApplyOrderCreated => "apply_order_created",
        }
    }
}

/// Terminal outcome of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The effect was produced by this invocation.
    Success,
    /// The effect already existed; nothing was written.
    Duplicate,
    /// The invocation failed with the given classification.
    Failed(FailureKind),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Duplicate => "duplicate",
            Outcome::Failed(kind) => kind.as_str(),
        }
    }
}

/// Sink for per-invocation outcomes.
///
/// Implementations must not fail: recording returns nothing and the caller
/// never waits on or inspects the result.
pub trait Instrumentation: Send + Sync {
    fn record(
        &self,
        use_case: UseCase,
        outcome: Outcome,
        elapsed: Duration,
        correlation_id: &CorrelationId,
    );
}

/// Emits counters and histograms through the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsInstrumentation;

impl Instrumentation for MetricsInstrumentation {
    fn record(
        &self,
        use_case: UseCase,
        outcome: Outcome,
        elapsed: Duration,
        correlation_id: &CorrelationId,
    ) {
        metrics::counter!(
            "order_pipeline_outcomes_total",
            "use_case" => use_case.as_str(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        metrics::histogram!(
            "order_pipeline_duration_seconds",
            "use_case" => use_case.as_str()
        )
        .record(elapsed.as_secs_f64());

        tracing::debug!(
            %correlation_id,
            use_case = use_case.as_str(),
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "outcome recorded"
        );
    }
}

/// Discards every outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {
    fn record(&self, _: UseCase, _: Outcome, _: Duration, _: &CorrelationId) {}
}

/// Keeps every recorded outcome in memory, for assertions in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingInstrumentation {
    outcomes: Arc<Mutex<Vec<(UseCase, Outcome)>>>,
    elapsed: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingInstrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the outcomes recorded so far, oldest first.
    pub fn outcomes(&self) -> Vec<(UseCase, Outcome)> {
        match self.outcomes.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns the durations recorded so far, in the same order as `outcomes`.
    pub fn elapsed(&self) -> Vec<Duration> {
        match self.elapsed.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Instrumentation for RecordingInstrumentation {
    fn record(&self, use_case: UseCase, outcome: Outcome, elapsed: Duration, _: &CorrelationId) {
        if let Ok(mut guard) = self.outcomes.lock() {
            guard.push((use_case, outcome));
        }
        if let Ok(mut guard) = self.elapsed.lock() {
            guard.push(elapsed);
        }
    }
}

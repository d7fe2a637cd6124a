//! Failure taxonomy shared by every boundary.

use serde::{Deserialize, Serialize};

/// Classification attached to a failure where it originates.
///
/// Boundaries decide "retry", "drop" or "report to the caller" by matching on
/// this value exhaustively; they never inspect error internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Bad input shape or values. Terminal, reported to the caller.
    Validation,
    /// Idempotency hit on the write path. Terminal, the effect already exists.
    Conflict,
    /// Malformed event payload on the read path. Terminal, dropped.
    Parse,
    /// Store or bus unavailable. Retriable.
    Infrastructure,
}

impl FailureKind {
    /// Returns true if retrying the same input may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            FailureKind::Infrastructure => true,
            FailureKind::Validation | FailureKind::Conflict | FailureKind::Parse => false,
        }
    }

    /// Returns the label used in logs, metrics and response bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Conflict => "conflict",
            FailureKind::Parse => "parse",
            FailureKind::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every error type that can reach a boundary.
pub trait Classify {
    /// Returns the classification of this failure.
    fn kind(&self) -> FailureKind;

    /// Shorthand for `self.kind().is_retriable()`.
    fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_infrastructure_is_retriable() {
        assert!(FailureKind::Infrastructure.is_retriable());
        assert!(!FailureKind::Validation.is_retriable());
        assert!(!FailureKind::Conflict.is_retriable());
        assert!(!FailureKind::Parse.is_retriable());
    }

    #[test]
    fn test_serializes_as_snake_case() {
        let json = serde_json::to_string(&FailureKind::Infrastructure).unwrap();
        assert_eq!(json, "\"infrastructure\"");
        assert_eq!(FailureKind::Conflict.to_string(), "conflict");
    }
}

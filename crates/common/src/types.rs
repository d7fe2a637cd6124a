use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a string-backed identifier newtype.
///
/// Identifiers cross process boundaries as plain JSON strings, so they are
/// `#[serde(transparent)]` and carry no format restriction beyond what the
/// owning component validates.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing string value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consumes the identifier, returning the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identity of an order. Supplied by the caller or generated on create.
    OrderId
}

string_id! {
    /// Identity of the customer who placed an order.
    CustomerId
}

string_id! {
    /// Globally unique event identity.
    ///
    /// Assigned once when an event is built and used as the dedupe key by
    /// both the event ledger and the processed-event ledger.
    EventId
}

string_id! {
    /// Tracing identifier propagated end-to-end. Never used for correctness.
    CorrelationId
}

string_id! {
    /// Key that collapses retried commands into a single committed event.
    IdempotencyKey
}

impl OrderId {
    /// Generates a fresh random order ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl EventId {
    /// Generates a fresh random event ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl CorrelationId {
    /// Generates a fresh random correlation ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Uses the caller-supplied value if present and non-empty, otherwise
    /// generates a new one.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Self::new(v),
            _ => Self::generate(),
        }
    }
}

impl IdempotencyKey {
    /// Derives the key used when a command carries no explicit key.
    pub fn for_order(order_id: &OrderId) -> Self {
        Self(format!("order:{order_id}"))
    }
}

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::{CorrelationId, EventId, IdempotencyKey, OrderId};
pub use error::{EventStoreError, Result};
pub use memory::InMemoryEventLedger;
pub use postgres::{PostgresEventLedger, run_migrations};
pub use record::EventRecord;
pub use store::EventLedger;

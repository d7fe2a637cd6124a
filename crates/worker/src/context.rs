//! Explicit dependency context built once at startup.

use std::sync::Arc;

use common::Instrumentation;
use domain::{CreateOrderHandler, EventPublisher};
use event_store::{EventLedger, InMemoryEventLedger, PostgresEventLedger};
use projections::{
    InMemoryProcessedEventLedger, InMemoryReadModelStore, PostgresProcessedEventLedger,
    PostgresReadModelStore, ProcessedEventLedger, ProjectionApplier, ReadModelStore,
};
use sqlx::postgres::PgPoolOptions;

use crate::config::Config;
use crate::error::StartupError;

pub type OrderCommands = CreateOrderHandler<Arc<dyn EventLedger>, Arc<dyn EventPublisher>>;
pub type OrderProjection =
    ProjectionApplier<Arc<dyn ProcessedEventLedger>, Arc<dyn ReadModelStore>>;

/// Everything a command or delivery invocation needs.
///
/// Constructed once in `main` and passed by reference to every handler.
pub struct AppContext {
    pub config: Config,
    pub commands: OrderCommands,
    pub projection: OrderProjection,
}

impl AppContext {
    /// Wires the context from explicit stores.
    pub fn new(
        config: Config,
        ledger: Arc<dyn EventLedger>,
        publisher: Arc<dyn EventPublisher>,
        processed: Arc<dyn ProcessedEventLedger>,
        read_model: Arc<dyn ReadModelStore>,
        instrumentation: Arc<dyn Instrumentation>,
    ) -> Self {
        Self {
            commands: CreateOrderHandler::new(ledger, publisher)
                .with_instrumentation(instrumentation.clone()),
            projection: ProjectionApplier::new(processed, read_model)
                .with_instrumentation(instrumentation),
            config,
        }
    }

    /// Wires in-memory ledgers and read model.
    pub fn in_memory(
        config: Config,
        publisher: Arc<dyn EventPublisher>,
        instrumentation: Arc<dyn Instrumentation>,
    ) -> Self {
        let processed = InMemoryProcessedEventLedger::with_retention(config.retention());
        Self::new(
            config,
            Arc::new(InMemoryEventLedger::new()),
            publisher,
            Arc::new(processed),
            Arc::new(InMemoryReadModelStore::new()),
            instrumentation,
        )
    }

    /// Connects to PostgreSQL, applies migrations and wires the Postgres
    /// stores.
    pub async fn postgres(
        config: Config,
        database_url: &str,
        publisher: Arc<dyn EventPublisher>,
        instrumentation: Arc<dyn Instrumentation>,
    ) -> Result<Self, StartupError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(database_url)
            .await?;
        event_store::run_migrations(&pool).await?;

        let retention = config.retention();
        Ok(Self::new(
            config,
            Arc::new(PostgresEventLedger::new(pool.clone())),
            publisher,
            Arc::new(PostgresProcessedEventLedger::new(pool.clone(), retention)),
            Arc::new(PostgresReadModelStore::new(pool)),
            instrumentation,
        ))
    }

    /// Uses PostgreSQL when `DATABASE_URL` is configured, in-memory stores
    /// otherwise.
    pub async fn from_config(
        config: Config,
        publisher: Arc<dyn EventPublisher>,
        instrumentation: Arc<dyn Instrumentation>,
    ) -> Result<Self, StartupError> {
        match config.database_url.clone() {
            Some(url) => {
                tracing::info!("using PostgreSQL stores");
                Self::postgres(config, &url, publisher, instrumentation).await
            }
            None => {
                tracing::info!("using in-memory stores");
                Ok(Self::in_memory(config, publisher, instrumentation))
            }
        }
    }
}

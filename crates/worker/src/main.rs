//! Worker entry point.

use std::sync::Arc;

use common::MetricsInstrumentation;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::{AppContext, Config, Consumer, LogFormat, StartupError, bus, purge, runner};

const BUS_CAPACITY: usize = 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Logs go to stderr; stdout carries responses.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration and initialize tracing
    let config = Config::try_from_env()?;
    init_tracing(&config);

    // 2. Install Prometheus exporter if requested
    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(StartupError::from)?;
        tracing::info!(%addr, "prometheus exporter listening");
    }

    // 3. Build the bus and the dependency context
    let (publisher, deliveries) = bus::channel(BUS_CAPACITY);
    let ctx = Arc::new(
        AppContext::from_config(
            config,
            Arc::new(publisher),
            Arc::new(MetricsInstrumentation),
        )
        .await?,
    );

    // 4. Start the consumer and the purge sweeper
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = tokio::spawn(Consumer::new(ctx.clone()).run(deliveries, shutdown_rx.clone()));
    let sweeper = tokio::spawn(purge::run(ctx.clone(), shutdown_rx));

    // 5. Serve requests from stdin until EOF or a signal
    tracing::info!("order worker ready");
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = runner::serve(&ctx, stdin, tokio::io::stdout()) => {
            result?;
        }
        () = shutdown_signal() => {}
    }

    // 6. Drain the bus and stop background tasks
    let _ = shutdown_tx.send(true);
    let stats = consumer.await?;
    sweeper.await?;

    tracing::info!(
        acked = stats.acked,
        abandoned = stats.abandoned,
        "worker shut down gracefully"
    );
    Ok(())
}

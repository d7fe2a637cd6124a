//! Periodic purge of expired processed-event records.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use projections::ProcessedEventLedger;
use tokio::sync::watch;

use crate::context::AppContext;

/// Purges once per configured interval until `shutdown` flips to true.
pub async fn run(ctx: Arc<AppContext>, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(ctx.config.purge_interval_secs);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                purge_once(&ctx).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Runs one purge pass. Failures are logged; the next tick tries again.
pub async fn purge_once(ctx: &AppContext) -> u64 {
    match ctx.projection.processed().purge_expired(Utc::now()).await {
        Ok(removed) => {
            if removed > 0 {
                tracing::info!(removed, "purged expired processed-event records");
            }
            removed
        }
        Err(e) => {
            tracing::warn!(error = %e, "processed-event purge failed");
            0
        }
    }
}

//! Periodic housekeeping loop.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::engine::SessionManager;

/// Runs [`SessionManager::sweep`] every `interval` until `shutdown` fires.
pub async fn run(manager: Arc<SessionManager>, interval: Duration, shutdown: CancellationToken) {
    info!(interval_secs = interval.as_secs(), "Session sweeper starting");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Session sweeper received shutdown signal");
                return;
            }

            _ = ticker.tick() => {
                if let Err(e) = manager.sweep().await {
                    error!(error = %e, "Sweep failed");
                }
            }
        }
    }
}

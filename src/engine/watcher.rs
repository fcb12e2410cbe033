//! Per-session deadline watcher.

use std::{sync::{Arc, Weak}, time::Duration};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    engine::{SessionManager, clock::Clock},
    models::attempt::CompletionReason,
};

/// Retry behaviour when finalizing on timeout hits a storage failure.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub max_retries: u32,
}

/// Spawns a task that finalizes `session_id` with
/// [`CompletionReason::Timeout`] once `deadline` passes.
///
/// The task exits without firing when `cancel` is triggered, which happens
/// as soon as the session completes by any path. Holding only a weak
/// reference to the manager lets it wind down with the manager.
pub(crate) fn spawn(
    manager: Weak<SessionManager>,
    session_id: Uuid,
    deadline: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    retry: RetryPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // Sleeping can wake early relative to the clock; loop until the
        // clock itself says the deadline has passed.
        loop {
            let remaining = clock.remaining(deadline);
            if remaining.is_zero() {
                break;
            }
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(%session_id, "Deadline watcher cancelled");
                    return;
                }
                _ = tokio::time::sleep(remaining) => {}
            }
        }

        if cancel.is_cancelled() {
            return;
        }

        let mut retries = 0;
        loop {
            let Some(manager) = manager.upgrade() else {
                return;
            };

            match manager.finalize(session_id, CompletionReason::Timeout).await {
                Ok(result) => {
                    info!(
                        %session_id,
                        score = result.score,
                        reason = %result.completion_reason,
                        "Deadline reached"
                    );
                    return;
                }
                Err(e) if e.is_transient() && retries < retry.max_retries => {
                    retries += 1;
                    warn!(%session_id, error = %e, retries, "Timeout finalize failed, retrying");
                }
                Err(e) => {
                    error!(%session_id, error = %e, "Timeout finalize gave up");
                    return;
                }
            }
            drop(manager);

            tokio::select! {
                biased;

                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(retry.backoff) => {}
            }
        }
    })
}

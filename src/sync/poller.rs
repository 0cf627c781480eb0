//! The recurring poll task owned by one synchronizer.
//!
//! The task holds only a weak reference to the synchronizer state, so a
//! dropped synchronizer is never kept alive by its own timer. Ticks run
//! sequentially inside the loop; missed ticks are skipped, never bunched.

use super::{Inner, TickOutcome};
use crate::error::SyncError;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub(crate) struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub(crate) fn spawn(inner: Weak<Inner>, period: Duration, cancel: CancellationToken) -> Self {
        let task = tokio::spawn(run(inner, period, cancel.clone()));
        Self { cancel, task }
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Lets a tick in progress finish; no new tick starts.
    pub(crate) fn stop(self) {
        self.cancel.cancel();
    }

    pub(crate) fn abort(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

async fn run(inner: Weak<Inner>, period: Duration, cancel: CancellationToken) {
    tracing::debug!(period_secs = period.as_secs(), "Campaign poller started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately; the caller has just fetched.
    interval.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = interval.tick() => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };

        match inner.tick().await {
            Ok(report) => {
                if let TickOutcome::Applied { status, .. } = report.outcome {
                    if status.is_terminal() {
                        tracing::info!(campaign_id = %inner.id, %status, "Terminal status observed, poller exiting");
                        break;
                    }
                }
            }
            Err(SyncError::Unmounted) => break,
            Err(e) => {
                tracing::warn!(campaign_id = %inner.id, "Tick failed: {}", e);
            }
        }
    }

    tracing::debug!("Campaign poller stopped");
}

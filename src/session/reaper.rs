//! Periodic eviction of abandoned sessions

use super::SessionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Sweeps the store on a fixed interval, deleting sessions whose last
/// activity is older than the threshold.
pub struct ExpiryReaper {
    store: Arc<dyn SessionStore>,
    interval: Duration,
    threshold: Duration,
}

impl ExpiryReaper {
    pub fn new(store: Arc<dyn SessionStore>, interval: Duration, threshold: Duration) -> Self {
        Self {
            store,
            interval,
            threshold,
        }
    }

    /// Evict sessions idle for longer than the threshold as of `now`.
    ///
    /// Deletion is conditional on the version seen during the scan, so a
    /// session that commits a turn mid-sweep is left alone.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let threshold = chrono::Duration::from_std(self.threshold)
            .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
        let mut evicted = 0;

        for entry in self.store.each().await {
            let idle = now.signed_duration_since(entry.state.last_activity());
            if idle <= threshold {
                continue;
            }
            if self
                .store
                .delete_if_version(&entry.state.session_id, entry.version)
                .await
            {
                tracing::info!(
                    session_id = %entry.state.session_id,
                    idle_secs = idle.num_seconds(),
                    "Cleaning up abandoned session"
                );
                evicted += 1;
            }
        }

        evicted
    }

    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    /// Run sweeps in the background until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it
            ticker.tick().await;
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                threshold_secs = self.threshold.as_secs(),
                "Session reaper started"
            );

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = self.sweep().await;
                        tracing::debug!(evicted, "Reaper sweep finished");
                    }
                }
            }

            tracing::info!("Session reaper stopped");
        })
    }
}

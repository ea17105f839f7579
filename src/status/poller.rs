//! Periodic device snapshot refresh.

use super::Reconciler;
use crate::api::{ApiError, Device};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Source of authoritative device list snapshots.
#[async_trait]
pub trait DeviceSource: Send + Sync {
    async fn fetch_devices(&self) -> Result<Vec<Device>, ApiError>;
}

/// Background task that feeds device snapshots into the [`Reconciler`].
pub struct SnapshotPoller<S> {
    source: Arc<S>,
    reconciler: Arc<Reconciler>,
    /// Zero means a single fetch
    interval: Duration,
}

impl<S: DeviceSource + 'static> SnapshotPoller<S> {
    pub fn new(source: Arc<S>, reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            source,
            reconciler,
            interval,
        }
    }

    /// Fetch one snapshot and install it.
    ///
    /// On failure the cached list is left as it was.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        let devices = self.source.fetch_devices().await?;
        let count = devices.len();
        self.reconciler.replace_all(devices);
        Ok(count)
    }

    /// Start the poller. The first fetch happens immediately.
    ///
    /// The task stops when `cancel_token` fires or when the session is
    /// rejected by the server. A snapshot that arrives after cancellation is
    /// discarded.
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = if self.interval.is_zero() {
                None
            } else {
                Some(self.interval)
            };
            let mut interval = tokio::time::interval(period.unwrap_or(Duration::from_secs(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_seconds = self.interval.as_secs(),
                "Snapshot poller started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Snapshot poller shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let fetched = tokio::select! {
                            _ = cancel_token.cancelled() => break,
                            fetched = self.source.fetch_devices() => fetched,
                        };

                        match fetched {
                            Ok(devices) => {
                                tracing::debug!(devices = devices.len(), "Snapshot fetched");
                                self.reconciler.replace_all(devices);
                            }
                            Err(e) if e.is_unauthorized() => {
                                tracing::info!("Session rejected, snapshot poller stopping");
                                break;
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Snapshot fetch failed, keeping cached devices");
                            }
                        }

                        if period.is_none() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

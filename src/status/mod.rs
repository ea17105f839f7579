//! Status reconciliation module.
//!
//! Keeps the merged `{device id → status}` view consistent by combining
//! authoritative device list snapshots with incremental status events from
//! the push channel.

mod poller;
mod types;


pub use poller::*;
pub use types::*;

use crate::api::{Device, DeviceId};
use crate::channel::{ChannelError, ChannelSink};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;

/// Merged status per device.
pub type StatusMap = HashMap<DeviceId, StatusEntry>;

/// Owns the cached device list and the merged status view.
///
/// Both are held behind `Arc` and replaced wholesale. A status batch is
/// applied to a fresh copy of the map which is then swapped in with a single
/// reference replacement, so a reader sees either none or all of a batch.
///
/// # Examples
///
/// ```
/// use oracle::status::{DeviceState, RawStatusEvent, Reconciler};
///
/// let reconciler = Reconciler::new();
/// assert_eq!(reconciler.get(1).state, DeviceState::Unknown);
///
/// reconciler.apply_delta(vec![RawStatusEvent::new(1, DeviceState::Up, 1000)]);
/// let entry = reconciler.get(1);
/// assert_eq!(entry.state, DeviceState::Up);
/// assert_eq!(entry.since.timestamp(), 1000);
/// ```
#[derive(Debug)]
pub struct Reconciler {
    session_start: DateTime<Utc>,
    devices: watch::Sender<Arc<Vec<Device>>>,
    statuses: watch::Sender<Arc<StatusMap>>,
}

impl Reconciler {
    /// Create an empty view; unknown devices report `now` as their `since`.
    pub fn new() -> Self {
        Self::with_session_start(Utc::now())
    }

    /// Create an empty view with an explicit session start time.
    pub fn with_session_start(session_start: DateTime<Utc>) -> Self {
        let (devices, _) = watch::channel(Arc::new(Vec::new()));
        let (statuses, _) = watch::channel(Arc::new(StatusMap::new()));
        Self {
            session_start,
            devices,
            statuses,
        }
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    /// Replace the cached device list with a fresh snapshot.
    ///
    /// The status view is not touched: statuses for devices missing from the
    /// snapshot are kept, and devices never named by an event report
    /// `Unknown`. Duplicate ids keep their first occurrence.
    pub fn replace_all(&self, devices: Vec<Device>) {
        let mut seen = HashSet::with_capacity(devices.len());
        let total = devices.len();
        let devices: Vec<Device> = devices
            .into_iter()
            .filter(|device| seen.insert(device.id))
            .collect();

        if devices.len() != total {
            tracing::warn!(
                duplicates = total - devices.len(),
                "Device snapshot contained duplicate ids"
            );
        }

        tracing::debug!(devices = devices.len(), "Device snapshot replaced");
        self.devices.send_replace(Arc::new(devices));
    }

    /// Merge a batch of status events.
    ///
    /// Events carrying a status replace the entry for their id (last write
    /// wins, in arrival order). Events without a status are ignored. The
    /// whole batch becomes visible at once. Returns the number of entries
    /// written.
    pub fn apply_delta(&self, events: Vec<RawStatusEvent>) -> usize {
        let updates: Vec<(DeviceId, StatusEntry)> = events
            .into_iter()
            .filter_map(|event| {
                event.status.map(|(state, since)| {
                    (
                        event.id,
                        StatusEntry {
                            state,
                            since: since.to_datetime(),
                        },
                    )
                })
            })
            .collect();
        let applied = updates.len();

        self.statuses.send_modify(|current| {
            let mut next = StatusMap::clone(current);
            next.extend(updates);
            *current = Arc::new(next);
        });

        applied
    }

    /// Status of a device. Never fails: devices without an entry report
    /// `Unknown` since the session start.
    pub fn get(&self, id: DeviceId) -> StatusEntry {
        self.statuses
            .borrow()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| StatusEntry::unknown(self.session_start))
    }

    /// Consistent snapshot of the cached device list.
    pub fn devices(&self) -> Arc<Vec<Device>> {
        Arc::clone(&self.devices.borrow())
    }

    /// Consistent snapshot of the merged status view.
    pub fn statuses(&self) -> Arc<StatusMap> {
        Arc::clone(&self.statuses.borrow())
    }

    /// Look up a status in a snapshot taken with [`Reconciler::statuses`].
    pub fn lookup(&self, snapshot: &StatusMap, id: DeviceId) -> StatusEntry {
        snapshot
            .get(&id)
            .cloned()
            .unwrap_or_else(|| StatusEntry::unknown(self.session_start))
    }

    /// Devices joined with their status, in snapshot order.
    pub fn device_views(&self) -> Vec<DeviceView> {
        let devices = self.devices();
        let statuses = self.statuses();
        devices
            .iter()
            .map(|device| DeviceView {
                device: device.clone(),
                status: self.lookup(&statuses, device.id),
            })
            .collect()
    }

    /// Notified once per applied batch.
    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusMap>> {
        self.statuses.subscribe()
    }

    /// Notified once per device snapshot.
    pub fn subscribe_devices(&self) -> watch::Receiver<Arc<Vec<Device>>> {
        self.devices.subscribe()
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSink for Reconciler {
    type Batch = Vec<RawStatusEvent>;

    fn decode(&self, payload: &str) -> Result<Self::Batch, ChannelError> {
        decode_batch(payload)
    }

    fn on_batch(&self, batch: Self::Batch) {
        let events = batch.len();
        let applied = self.apply_delta(batch);
        tracing::debug!(events, applied, "Status batch applied");
    }
}

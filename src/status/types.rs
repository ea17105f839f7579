//! Status event and entry types.

use crate::api::{Device, DeviceId};
use crate::channel::ChannelError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Reachability state reported by the server.
///
/// Serialized as the bare server string. Strings this client does not know
/// are kept verbatim in `Other` so new server states still display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceState {
    /// No event seen for the device yet
    Unknown,
    /// Device answers pings
    Up,
    /// Device stopped answering pings
    Down,
    /// Server-defined state
    Other(String),
}

impl From<String> for DeviceState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Unknown" => DeviceState::Unknown,
            "Up" => DeviceState::Up,
            "Down" => DeviceState::Down,
            _ => DeviceState::Other(s),
        }
    }
}

impl From<DeviceState> for String {
    fn from(state: DeviceState) -> Self {
        state.to_string()
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Unknown => f.write_str("Unknown"),
            DeviceState::Up => f.write_str("Up"),
            DeviceState::Down => f.write_str("Down"),
            DeviceState::Other(s) => f.write_str(s),
        }
    }
}

/// Server timestamp as serialized on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochTime {
    pub secs_since_epoch: u64,
    #[serde(default)]
    pub nanos_since_epoch: u32,
}

impl EpochTime {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            secs_since_epoch: secs,
            nanos_since_epoch: 0,
        }
    }

    /// Convert to a UTC timestamp. Out-of-range values collapse to the epoch.
    pub fn to_datetime(self) -> DateTime<Utc> {
        i64::try_from(self.secs_since_epoch)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, self.nanos_since_epoch).single())
            .unwrap_or_default()
    }
}

/// Merged status of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub state: DeviceState,
    pub since: DateTime<Utc>,
}

impl StatusEntry {
    /// Entry reported for a device no event has named yet.
    pub fn unknown(since: DateTime<Utc>) -> Self {
        Self {
            state: DeviceState::Unknown,
            since,
        }
    }
}

/// One element of a status channel batch.
///
/// `status` is absent for heartbeat-like or malformed events, which leave the
/// merged view untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatusEvent {
    pub id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<(DeviceState, EpochTime)>,
}

impl RawStatusEvent {
    pub fn new(id: DeviceId, state: DeviceState, since_secs: u64) -> Self {
        Self {
            id,
            status: Some((state, EpochTime::from_secs(since_secs))),
        }
    }

    pub fn heartbeat(id: DeviceId) -> Self {
        Self { id, status: None }
    }
}

/// A device joined with its merged status, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceView {
    #[serde(flatten)]
    pub device: Device,
    pub status: StatusEntry,
}

/// Decode one status channel message.
///
/// The payload must be a JSON array, otherwise the whole frame is rejected.
/// Elements are decoded independently: one without a numeric `id` is
/// dropped, and one whose `status` has the wrong shape is kept without a
/// status so it has no effect.
///
/// # Examples
///
/// ```
/// use oracle::status::{decode_batch, DeviceState};
///
/// let batch = decode_batch(r#"[{"id": 1, "status": ["Up", {"secs_since_epoch": 1000}]}]"#).unwrap();
/// let (state, since) = batch[0].status.clone().unwrap();
/// assert_eq!(state, DeviceState::Up);
/// assert_eq!(since.secs_since_epoch, 1000);
///
/// assert!(decode_batch("{\"id\": 1}").is_err());
/// ```
pub fn decode_batch(payload: &str) -> Result<Vec<RawStatusEvent>, ChannelError> {
    let values: Vec<Value> =
        serde_json::from_str(payload).map_err(|e| ChannelError::Malformed(e.to_string()))?;

    let mut events = Vec::with_capacity(values.len());
    for value in values {
        let Some(id) = value
            .get("id")
            .and_then(Value::as_u64)
            .and_then(|id| DeviceId::try_from(id).ok())
        else {
            tracing::debug!(event = %value, "Dropping status event without a device id");
            continue;
        };

        let status = match value.get("status") {
            None | Some(Value::Null) => None,
            Some(raw) => match serde_json::from_value::<(DeviceState, EpochTime)>(raw.clone()) {
                Ok(status) => Some(status),
                Err(error) => {
                    tracing::debug!(
                        device_id = id,
                        error = %error,
                        "Ignoring malformed status payload"
                    );
                    None
                }
            },
        };

        events.push(RawStatusEvent { id, status });
    }

    Ok(events)
}

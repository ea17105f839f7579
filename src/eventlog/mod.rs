//! Server event log, fed by the log push channel.
//!
//! Entries are kept newest first. The server sends batches oldest to
//! newest, and [`LogBook::prepend_batch`] is the only mutation point.

use crate::channel::{ChannelError, ChannelSink};
use crate::status::EpochTime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// One server log entry.
///
/// Kept as the raw JSON value so entries of any shape survive. The
/// accessors read the fields the server emits today and return `None` when
/// they are missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry(pub Value);

impl LogEntry {
    /// Entry category, e.g. `Note` or `Error`.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    pub fn message(&self) -> Option<&str> {
        self.0.get("msg").and_then(Value::as_str)
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.get("time")?;
        serde_json::from_value::<EpochTime>(raw.clone())
            .ok()
            .map(EpochTime::to_datetime)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for LogEntry {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Newest-first list of server log entries.
#[derive(Debug)]
pub struct LogBook {
    entries: watch::Sender<Arc<Vec<LogEntry>>>,
    capacity: Option<usize>,
    loaded: AtomicBool,
}

impl LogBook {
    /// `capacity` of `None` keeps every entry.
    pub fn new(capacity: Option<usize>) -> Self {
        let (entries, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            entries,
            capacity,
            loaded: AtomicBool::new(false),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Put each entry at the front, in delivery order, then trim the oldest
    /// entries beyond the capacity.
    pub fn prepend_batch(&self, batch: Vec<LogEntry>) {
        if batch.is_empty() {
            return;
        }

        self.entries.send_modify(|current| {
            let mut next = Vec::with_capacity(batch.len() + current.len());
            next.extend(batch.into_iter().rev());
            next.extend(current.iter().cloned());
            if let Some(capacity) = self.capacity {
                next.truncate(capacity);
            }
            *current = Arc::new(next);
        });
    }

    /// Snapshot, newest first.
    pub fn entries(&self) -> Arc<Vec<LogEntry>> {
        Arc::clone(&self.entries.borrow())
    }

    /// Up to `n` newest entries.
    pub fn latest(&self, n: usize) -> Vec<LogEntry> {
        self.entries.borrow().iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// True once the log channel has connected at least once.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn mark_loaded(&self) {
        self.loaded.store(true, Ordering::Release);
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<LogEntry>>> {
        self.entries.subscribe()
    }
}

impl Default for LogBook {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl ChannelSink for LogBook {
    type Batch = Vec<LogEntry>;

    fn decode(&self, payload: &str) -> Result<Self::Batch, ChannelError> {
        serde_json::from_str(payload).map_err(|e| ChannelError::Malformed(e.to_string()))
    }

    fn on_open(&self) {
        self.mark_loaded();
    }

    fn on_batch(&self, batch: Self::Batch) {
        tracing::debug!(entries = batch.len(), "Log batch received");
        self.prepend_batch(batch);
    }
}

//! Monitoring console configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Refresh cadence and log retention for `oracle watch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Device list snapshot period. 0 fetches once.
    pub refresh_interval_seconds: u64,
    pub render_interval_seconds: u64,
    /// Maximum retained log entries. 0 keeps all of them.
    pub log_capacity: usize,
}

impl MonitorConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_secs(self.render_interval_seconds)
    }

    pub fn log_capacity(&self) -> Option<usize> {
        match self.log_capacity {
            0 => None,
            n => Some(n),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: 30,
            render_interval_seconds: 1,
            log_capacity: 0,
        }
    }
}

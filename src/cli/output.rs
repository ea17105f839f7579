//! Output formatting helpers for CLI commands

use crate::api::Settings;
use crate::channel::ChannelState;
use crate::eventlog::LogEntry;
use crate::presenter::format_elapsed;
use crate::status::{DeviceState, DeviceView};
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// Device row with its time in the current state.
#[derive(Debug, Clone)]
pub struct DeviceRow {
    pub view: DeviceView,
    pub elapsed: chrono::Duration,
}

impl DeviceRow {
    /// Row with `elapsed` measured against `now`.
    pub fn at(view: DeviceView, now: DateTime<Utc>) -> Self {
        let elapsed = (now - view.status.since).max(chrono::Duration::zero());
        Self { view, elapsed }
    }
}

/// Colored state label
pub fn state_label(state: &DeviceState) -> String {
    match state {
        DeviceState::Up => "Up".green().to_string(),
        DeviceState::Down => "Down".red().to_string(),
        DeviceState::Unknown => "Unknown".yellow().to_string(),
        DeviceState::Other(s) => s.cyan().to_string(),
    }
}

/// Get status icon for device state
pub fn state_icon(state: &DeviceState) -> &'static str {
    match state {
        DeviceState::Up => "✓",
        DeviceState::Down => "✗",
        DeviceState::Unknown => "?",
        DeviceState::Other(_) => "~",
    }
}

/// Format devices as a table
///
/// The state columns are only shown when `with_status` is set.
pub fn format_devices_table(rows: &[DeviceRow], with_status: bool) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec!["ID", "Device", "IPv4", "SNMP"];
    if with_status {
        header.extend(["State", "For"]);
    }
    table.set_header(header);

    for row in rows {
        let device = &row.view.device;
        let mut cells = vec![
            Cell::new(device.id),
            Cell::new(device.desc()),
            Cell::new(device.ipv4.map(|ip| ip.to_string()).unwrap_or_default()),
            Cell::new(if device.snmp { "yes" } else { "no" }),
        ];
        if with_status {
            let state = &row.view.status.state;
            cells.push(Cell::new(format!("{} {}", state_icon(state), state_label(state))));
            cells.push(Cell::new(format_elapsed(row.elapsed)));
        }
        table.add_row(cells);
    }

    table.to_string()
}

/// Format devices as JSON
pub fn format_devices_json(views: &[DeviceView]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "devices": views }))
}

/// Format settings as a table
pub fn format_settings_table(settings: &Settings) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec![Cell::new("Web port"), Cell::new(settings.web_port)]);
    table.add_row(vec![
        Cell::new("Ping interval"),
        Cell::new(format!("{}s", settings.ping_interval)),
    ]);
    table.to_string()
}

pub fn format_settings_json(settings: &Settings) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(settings)
}

/// One log line: `time kind: message`, or the raw entry if it has no message.
pub fn format_log_line(entry: &LogEntry) -> String {
    let Some(message) = entry.message() else {
        return entry.raw().to_string();
    };

    let time = entry
        .time()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let kind = match entry.kind() {
        Some("Error") => "Error".red().to_string(),
        Some(kind) => kind.to_string(),
        None => "Log".to_string(),
    };

    format!("{} {}: {}", time.dimmed(), kind, message)
}

/// Channel state as shown in the watch header.
pub fn channel_label(state: &ChannelState) -> String {
    match state {
        ChannelState::Open => "live".green().to_string(),
        ChannelState::Connecting => "connecting".yellow().to_string(),
        ChannelState::Closed { reason: None } => "closed".red().to_string(),
        ChannelState::Closed {
            reason: Some(reason),
        } => format!("{} ({})", "closed".red(), reason),
    }
}

/// Everything drawn on one frame of `oracle watch`.
#[derive(Debug)]
pub struct WatchScreen<'a> {
    pub server: &'a str,
    pub rows: &'a [DeviceRow],
    pub status_channel: &'a ChannelState,
    /// `None` when the log is not followed
    pub log_channel: Option<&'a ChannelState>,
    pub log: &'a [LogEntry],
}

/// Render one frame of the watch screen.
pub fn format_watch_screen(screen: &WatchScreen<'_>) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{}  status: {}",
        screen.server.bold(),
        channel_label(screen.status_channel)
    ));
    if let Some(log_state) = screen.log_channel {
        output.push_str(&format!("  log: {}", channel_label(log_state)));
    }
    output.push('\n');

    output.push_str(&format_devices_table(screen.rows, true));
    output.push('\n');

    if screen.log_channel.is_some() {
        output.push('\n');
        if screen.log.is_empty() {
            output.push_str(&"No log entries".dimmed().to_string());
            output.push('\n');
        }
        for entry in screen.log {
            output.push_str(&format_log_line(entry));
            output.push('\n');
        }
    }

    output
}

//! Settings command implementation

use crate::api::ConsoleClient;
use crate::cli::output::{format_settings_json, format_settings_table};
use crate::cli::{SettingsSetArgs, SettingsShowArgs};

/// Handle `oracle settings show`
pub async fn handle_settings_show(
    args: &SettingsShowArgs,
    client: &ConsoleClient,
) -> Result<String, Box<dyn std::error::Error>> {
    let settings = client.settings().await?;
    if args.json {
        Ok(format_settings_json(&settings)?)
    } else {
        Ok(format_settings_table(&settings))
    }
}

/// Handle `oracle settings set`
///
/// Fields not given on the command line keep their current server value.
pub async fn handle_settings_set(
    args: &SettingsSetArgs,
    client: &ConsoleClient,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut settings = client.settings().await?;
    if let Some(web_port) = args.web_port {
        settings.web_port = web_port;
    }
    if let Some(ping_interval) = args.ping_interval {
        settings.ping_interval = ping_interval;
    }

    client.update_settings(&settings).await?;
    Ok(format!(
        "✓ Settings saved\n{}",
        format_settings_table(&settings)
    ))
}

//! Devices command implementation

use crate::api::{ConsoleClient, Device};
use crate::channel;
use crate::cli::output::{format_devices_json, format_devices_table, DeviceRow};
use crate::cli::{DevicesAddArgs, DevicesListArgs, DevicesRemoveArgs};
use crate::status::Reconciler;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// How long `devices list --status` waits for the first status frame.
pub const STATUS_WAIT: Duration = Duration::from_secs(5);

/// Handle `oracle devices list`
pub async fn handle_devices_list(
    args: &DevicesListArgs,
    client: &ConsoleClient,
) -> Result<String, Box<dyn std::error::Error>> {
    let reconciler = Arc::new(Reconciler::new());
    reconciler.replace_all(client.list_devices().await?);

    if args.status {
        wait_for_first_status(client, &reconciler).await?;
    }

    let views = reconciler.device_views();
    if args.json {
        return Ok(format_devices_json(&views)?);
    }

    let now = Utc::now();
    let rows: Vec<DeviceRow> = views.into_iter().map(|v| DeviceRow::at(v, now)).collect();
    Ok(format_devices_table(&rows, args.status))
}

/// Open the status channel until the first batch lands or it closes.
///
/// The server sends the full current status as its first frame.
async fn wait_for_first_status(
    client: &ConsoleClient,
    reconciler: &Arc<Reconciler>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut updates = reconciler.subscribe();
    let mut supervisor = channel::status_channel(client, Arc::clone(reconciler))?;
    supervisor.open();

    let outcome = tokio::time::timeout(STATUS_WAIT, async {
        tokio::select! {
            changed = updates.changed() => changed.map_err(|e| e.to_string()),
            reason = supervisor.wait_closed() => Err(match reason {
                Some(reason) => format!("status channel {}", reason),
                None => "status channel closed".to_string(),
            }),
        }
    })
    .await;

    supervisor.close().await;

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => {
            tracing::warn!(
                wait_seconds = STATUS_WAIT.as_secs(),
                "No status update received, showing devices as Unknown"
            );
            Ok(())
        }
    }
}

/// Handle `oracle devices add`
pub async fn handle_devices_add(
    args: &DevicesAddArgs,
    client: &ConsoleClient,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut device = Device::draft(args.name.as_deref(), args.ipv4)?;
    if args.snmp {
        device = device.with_snmp(args.community.clone());
    }

    let label = device.desc();
    client.add_device(device).await?;
    Ok(format!("✓ Added device: {}", label))
}

/// Handle `oracle devices remove`
pub async fn handle_devices_remove(
    args: &DevicesRemoveArgs,
    client: &ConsoleClient,
) -> Result<String, Box<dyn std::error::Error>> {
    client.remove_device(args.id).await?;
    Ok(format!("✓ Removed device #{}", args.id))
}

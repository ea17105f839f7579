//! Watch command implementation: the live monitoring console

use crate::channel::{self, ChannelState, CloseReason};
use crate::cli::output::{format_watch_screen, DeviceRow, WatchScreen};
use crate::cli::{ConsoleContext, WatchArgs};
use crate::eventlog::LogBook;
use crate::presenter::TickerBoard;
use crate::session::LOGIN_ROUTE;
use crate::status::{Reconciler, SnapshotPoller};
use std::io::Write;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Handle `oracle watch`
///
/// Runs until Ctrl-C, or until the server rejects the session. A closed
/// status channel is shown on screen and not reopened.
pub async fn run_watch(
    args: &WatchArgs,
    ctx: ConsoleContext,
) -> Result<(), Box<dyn std::error::Error>> {
    let ConsoleContext {
        config,
        client,
        mut navigation,
    } = ctx;

    let reconciler = Arc::new(Reconciler::new());
    let log = Arc::new(LogBook::new(config.monitor.log_capacity()));
    let cancel_token = CancellationToken::new();

    let poller = SnapshotPoller::new(
        Arc::clone(&client),
        Arc::clone(&reconciler),
        config.monitor.refresh_interval(),
    )
    .start(cancel_token.child_token());

    let mut status_channel = channel::status_channel(&client, Arc::clone(&reconciler))?;
    status_channel.open();
    let mut status_state = status_channel.watch_state();

    let mut log_channel = if args.no_log {
        None
    } else {
        let mut supervisor = channel::log_channel(&client, Arc::clone(&log))?;
        supervisor.open();
        Some(supervisor)
    };

    let mut board = TickerBoard::new();
    let mut render = tokio::time::interval(config.monitor.render_interval());
    render.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status_open = true;
    let mut navigation_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tracing::info!(server = %client.base_url(), "Watching");

    let outcome: Result<(), Box<dyn std::error::Error>> = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            route = navigation.recv(), if navigation_open => match route {
                Some(route) if route == LOGIN_ROUTE => {
                    break Err("session rejected by the server, log in again".into());
                }
                Some(route) => tracing::debug!(route = %route, "Ignoring navigation request"),
                None => navigation_open = false,
            },
            changed = status_state.changed(), if status_open => {
                if changed.is_err() {
                    status_open = false;
                    continue;
                }
                let state = status_state.borrow_and_update().clone();
                if let ChannelState::Closed { reason } = state {
                    status_open = false;
                    tracing::warn!(
                        reason = %reason.as_ref().map(ToString::to_string).unwrap_or_default(),
                        "Status channel closed, live updates stopped"
                    );
                    if reason == Some(CloseReason::Unauthorized) {
                        break Err("status channel rejected the session, log in again".into());
                    }
                }
            }
            _ = render.tick() => {
                let views = reconciler.device_views();
                board.sync(views.iter().map(|v| (v.device.id, v.status.since)));
                let rows: Vec<DeviceRow> = views
                    .into_iter()
                    .map(|view| {
                        let elapsed = board
                            .elapsed(view.device.id)
                            .unwrap_or_else(chrono::Duration::zero);
                        DeviceRow { view, elapsed }
                    })
                    .collect();

                let log_state = log_channel.as_ref().map(|c| c.state());
                let entries = log.latest(args.log_lines);
                let status = status_channel.state();
                let screen = format_watch_screen(&WatchScreen {
                    server: client.base_url().as_str(),
                    rows: &rows,
                    status_channel: &status,
                    log_channel: log_state.as_ref(),
                    log: &entries,
                });

                let mut stdout = std::io::stdout().lock();
                if let Err(e) = write!(stdout, "{}{}", CLEAR_SCREEN, screen).and_then(|_| stdout.flush()) {
                    break Err(e.into());
                }
            }
        }
    };

    cancel_token.cancel();
    status_channel.close().await;
    if let Some(supervisor) = log_channel.as_mut() {
        supervisor.close().await;
    }
    if let Err(e) = poller.await {
        tracing::warn!(error = %e, "Snapshot poller task failed");
    }

    tracing::info!("Watch stopped");
    outcome
}

//! Push channel supervision.
//!
//! A [`ChannelSupervisor`] owns one WebSocket subscription and walks it
//! through `Closed → Connecting → Open → Closed`. Frames are decoded and
//! applied by a [`ChannelSink`]; the status channel feeds the
//! [`Reconciler`](crate::status::Reconciler) and the log channel feeds the
//! [`LogBook`](crate::eventlog::LogBook).
//!
//! There is no automatic reconnect. Callers that want one watch
//! [`ChannelSupervisor::wait_closed`] and call [`ChannelSupervisor::open`]
//! again.

mod connection;
mod error;


pub use error::ChannelError;

use crate::api::ConsoleClient;
use crate::eventlog::LogBook;
use crate::session::RequestGuard;
use crate::status::Reconciler;
use connection::Link;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Status channel path, relative to the server base URL.
pub const STATUS_PATH: &str = "api/devices/status";

/// Log channel path, relative to the server base URL.
pub const LOG_PATH: &str = "api/log";

/// Derive a push endpoint from the REST base URL.
///
/// `http` becomes `ws` and `https` becomes `wss`; host and port are kept.
pub fn push_endpoint(base: &Url, path: &str) -> Result<Url, ChannelError> {
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(ChannelError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                other
            )))
        }
    };

    let mut url = base
        .join(path)
        .map_err(|e| ChannelError::InvalidUrl(e.to_string()))?;
    url.set_scheme(scheme)
        .map_err(|_| ChannelError::InvalidUrl(format!("cannot switch {} to {}", base, scheme)))?;
    Ok(url)
}

/// Why a channel ended up closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called
    Requested,
    /// Server sent a close frame
    ServerClosed,
    /// Stream ended without a close frame
    StreamEnded,
    /// Handshake or read failure
    Transport(String),
    /// Handshake rejected with an authorization failure
    Unauthorized,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Requested => f.write_str("closed by client"),
            CloseReason::ServerClosed => f.write_str("closed by server"),
            CloseReason::StreamEnded => f.write_str("stream ended"),
            CloseReason::Transport(e) => write!(f, "transport error: {}", e),
            CloseReason::Unauthorized => f.write_str("not authorized"),
        }
    }
}

/// Lifecycle state of a push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// Not connected. `reason` is `None` until the first connection ends.
    Closed { reason: Option<CloseReason> },
    Connecting,
    Open,
}

impl ChannelState {
    pub fn is_closed(&self) -> bool {
        matches!(self, ChannelState::Closed { .. })
    }
}

/// Consumer of a channel's frames.
pub trait ChannelSink: Send + Sync + 'static {
    type Batch: Send;

    /// Decode one text frame. An error drops the frame.
    fn decode(&self, payload: &str) -> Result<Self::Batch, ChannelError>;

    /// Called once per successful handshake.
    fn on_open(&self) {}

    fn on_batch(&self, batch: Self::Batch);
}

struct Connection {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns one push channel subscription.
pub struct ChannelSupervisor<S: ChannelSink> {
    name: &'static str,
    url: Url,
    sink: Arc<S>,
    guard: RequestGuard,
    state: Arc<watch::Sender<ChannelState>>,
    dropped_frames: Arc<AtomicU64>,
    connection: Option<Connection>,
}

impl<S: ChannelSink> ChannelSupervisor<S> {
    pub fn new(name: &'static str, url: Url, sink: Arc<S>, guard: RequestGuard) -> Self {
        let (state, _) = watch::channel(ChannelState::Closed { reason: None });
        Self {
            name,
            url,
            sink,
            guard,
            state: Arc::new(state),
            dropped_frames: Arc::new(AtomicU64::new(0)),
            connection: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    /// Start connecting.
    ///
    /// A no-op while `Connecting` or `Open`. From `Closed` a fresh
    /// connection task is spawned.
    pub fn open(&mut self) {
        if !self.state.borrow().is_closed() {
            tracing::debug!(channel = self.name, "Open ignored, channel already active");
            return;
        }

        self.state.send_replace(ChannelState::Connecting);
        tracing::info!(channel = self.name, url = %self.url, "Push channel connecting");

        let cancel = CancellationToken::new();
        let link = Link {
            name: self.name,
            url: self.url.clone(),
            sink: Arc::clone(&self.sink),
            guard: self.guard.clone(),
            state: Arc::clone(&self.state),
            dropped_frames: Arc::clone(&self.dropped_frames),
        };
        let task = tokio::spawn(connection::run(link, cancel.clone()));

        if let Some(previous) = self.connection.replace(Connection { cancel, task }) {
            previous.cancel.cancel();
        }
    }

    /// Close the channel. Safe to call in any state, any number of times.
    ///
    /// Frames that arrive after this returns are never applied.
    pub async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel.cancel();
            if let Err(e) = connection.task.await {
                tracing::warn!(channel = self.name, error = %e, "Push channel task failed");
            }
        }

        self.state.send_if_modified(|state| {
            if state.is_closed() {
                false
            } else {
                *state = ChannelState::Closed {
                    reason: Some(CloseReason::Requested),
                };
                true
            }
        });
    }

    pub fn state(&self) -> ChannelState {
        self.state.borrow().clone()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Resolve once the channel is closed, with the reason of the last close.
    pub async fn wait_closed(&self) -> Option<CloseReason> {
        let mut rx = self.state.subscribe();
        let reason = match rx.wait_for(ChannelState::is_closed).await {
            Ok(state) => match &*state {
                ChannelState::Closed { reason } => reason.clone(),
                _ => None,
            },
            Err(_) => None,
        };
        reason
    }

    /// Frames dropped because they could not be decoded.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

impl<S: ChannelSink> Drop for ChannelSupervisor<S> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel.cancel();
        }
    }
}

impl<S: ChannelSink> fmt::Debug for ChannelSupervisor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSupervisor")
            .field("name", &self.name)
            .field("url", &self.url.as_str())
            .field("state", &*self.state.borrow())
            .field("dropped_frames", &self.dropped_frames())
            .finish()
    }
}

/// Status channel feeding `reconciler`, authorized through the client's guard.
pub fn status_channel(
    client: &ConsoleClient,
    reconciler: Arc<Reconciler>,
) -> Result<ChannelSupervisor<Reconciler>, ChannelError> {
    Ok(ChannelSupervisor::new(
        "status",
        client.status_channel_url()?,
        reconciler,
        client.guard().clone(),
    ))
}

/// Log channel feeding `log`, authorized through the client's guard.
pub fn log_channel(
    client: &ConsoleClient,
    log: Arc<LogBook>,
) -> Result<ChannelSupervisor<LogBook>, ChannelError> {
    Ok(ChannelSupervisor::new(
        "log",
        client.log_channel_url()?,
        log,
        client.guard().clone(),
    ))
}

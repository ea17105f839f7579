//! Connection task for a single push channel.

use super::{ChannelError, ChannelSink, ChannelState, CloseReason};
use crate::session::RequestGuard;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a requested close waits for the close frame to be written.
pub(super) const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything the connection task shares with its supervisor.
pub(super) struct Link<S> {
    pub(super) name: &'static str,
    pub(super) url: Url,
    pub(super) sink: Arc<S>,
    pub(super) guard: RequestGuard,
    pub(super) state: Arc<watch::Sender<ChannelState>>,
    pub(super) dropped_frames: Arc<AtomicU64>,
}

impl<S: ChannelSink> Link<S> {
    /// Decode one text frame and hand it to the sink.
    pub(super) fn deliver(&self, payload: &str) {
        match self.sink.decode(payload) {
            Ok(batch) => self.sink.on_batch(batch),
            Err(e) => {
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    channel = self.name,
                    error = %e,
                    bytes = payload.len(),
                    "Dropping undecodable frame"
                );
            }
        }
    }

    async fn handshake(&self) -> Result<WsStream, ChannelError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ChannelError::Handshake(e.to_string()))?;

        if let Some(authorization) = self.guard.authorization() {
            let value = HeaderValue::from_str(&authorization)
                .map_err(|e| ChannelError::Handshake(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        match connect_async(request).await {
            Ok((stream, _response)) => Ok(stream),
            Err(WsError::Http(response)) => {
                let status = response.status().as_u16();
                self.guard
                    .observe_status(status, self.url.as_str())
                    .map_err(|_| ChannelError::Unauthorized)?;
                Err(ChannelError::Handshake(format!(
                    "server answered HTTP {}",
                    status
                )))
            }
            Err(e) => Err(ChannelError::Handshake(e.to_string())),
        }
    }
}

/// Run one connection from handshake to close and publish the final state.
pub(super) async fn run<S: ChannelSink>(link: Link<S>, cancel: CancellationToken) {
    let reason = connect_and_pump(&link, &cancel).await;

    tracing::info!(channel = link.name, reason = %reason, "Push channel closed");
    link.state.send_replace(ChannelState::Closed {
        reason: Some(reason),
    });
}

async fn connect_and_pump<S: ChannelSink>(
    link: &Link<S>,
    cancel: &CancellationToken,
) -> CloseReason {
    let handshake = tokio::select! {
        biased;
        _ = cancel.cancelled() => return CloseReason::Requested,
        handshake = link.handshake() => handshake,
    };

    let stream = match handshake {
        Ok(stream) => stream,
        Err(ChannelError::Unauthorized) => return CloseReason::Unauthorized,
        Err(e) => {
            tracing::warn!(channel = link.name, url = %link.url, error = %e, "Push channel handshake failed");
            return CloseReason::Transport(e.to_string());
        }
    };

    link.state.send_replace(ChannelState::Open);
    tracing::info!(channel = link.name, url = %link.url, "Push channel open");
    link.sink.on_open();

    let (mut writer, reader) = stream.split();
    let reason = pump(link, reader, cancel).await;

    if reason == CloseReason::Requested {
        send_close_frame(link.name, &mut writer).await;
    }

    reason
}

/// Write a close frame, giving up after [`CLOSE_FRAME_TIMEOUT`].
///
/// A peer that stopped reading can leave the send pending forever, so the
/// connection is released either way. Returns whether the frame went out.
pub(super) async fn send_close_frame<W>(name: &'static str, writer: &mut W) -> bool
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    match tokio::time::timeout(CLOSE_FRAME_TIMEOUT, writer.send(Message::Close(None))).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(channel = name, error = %e, "Close frame not delivered");
            false
        }
        Err(_) => {
            tracing::debug!(channel = name, "Close frame timed out");
            false
        }
    }
}

/// Read frames until the stream ends or the channel is cancelled.
///
/// Text frames go through the sink. Binary, ping and pong frames are
/// ignored. Cancellation wins over a frame that is ready at the same time.
pub(super) async fn pump<S, R>(link: &Link<S>, mut frames: R, cancel: &CancellationToken) -> CloseReason
where
    S: ChannelSink,
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return CloseReason::Requested,
            frame = frames.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(payload))) => link.deliver(&payload),
            Some(Ok(Message::Close(_))) => return CloseReason::ServerClosed,
            Some(Ok(_)) => {}
            Some(Err(e)) => return CloseReason::Transport(e.to_string()),
            None => return CloseReason::StreamEnded,
        }
    }
}

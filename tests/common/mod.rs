//! Shared test utilities for oracle integration tests.
//!
//! Provides a scripted oracle server: REST device list plus both push
//! channels, served by axum on an ephemeral port.

#![allow(dead_code)]

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use oracle::api::ConsoleClient;
use oracle::session::{ChannelNavigator, CredentialStore, RequestGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// =============================================================================
// Scripted server
// =============================================================================

/// What the fake server does on each connection.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Required session token; `None` accepts any caller
    pub token: Option<String>,
    /// Frames sent on the status channel right after the handshake
    pub status_frames: Vec<String>,
    /// Frames sent on the log channel right after the handshake
    pub log_frames: Vec<String>,
    /// Send a close frame once the scripted frames are out
    pub close_after_frames: bool,
    /// Body of `GET /api/devices`
    pub devices: serde_json::Value,
}

struct ServerState {
    script: Script,
    handshakes: AtomicUsize,
}

impl ServerState {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        match &self.script.token {
            None => true,
            Some(token) => headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == format!("Bearer {}", token)),
        }
    }
}

/// Running scripted server.
pub struct PushServer {
    pub base_url: String,
    state: Arc<ServerState>,
}

impl PushServer {
    pub async fn start(script: Script) -> Self {
        let state = Arc::new(ServerState {
            script,
            handshakes: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/devices", get(devices))
            .route("/api/devices/status", get(status_ws))
            .route("/api/log", get(log_ws))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Upgrades accepted so far, both channels.
    pub fn handshakes(&self) -> usize {
        self.state.handshakes.load(Ordering::SeqCst)
    }
}

async fn devices(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(state.script.devices.clone()).into_response()
}

async fn status_ws(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let frames = state.script.status_frames.clone();
    upgrade(state, headers, ws, frames)
}

async fn log_ws(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let frames = state.script.log_frames.clone();
    upgrade(state, headers, ws, frames)
}

fn upgrade(
    state: Arc<ServerState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    frames: Vec<String>,
) -> Response {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.handshakes.fetch_add(1, Ordering::SeqCst);
    let close_after = state.script.close_after_frames;
    ws.on_upgrade(move |socket| serve_frames(socket, frames, close_after))
}

async fn serve_frames(mut socket: WebSocket, frames: Vec<String>, close_after: bool) {
    for frame in frames {
        if socket.send(Message::Text(frame)).await.is_err() {
            return;
        }
    }

    if close_after {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    // Hold the connection until the client leaves
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
}

// =============================================================================
// Client helpers
// =============================================================================

/// Client whose guard reports navigation on the returned receiver.
pub fn client_for(
    server: &PushServer,
    token: Option<&str>,
) -> (ConsoleClient, mpsc::UnboundedReceiver<String>) {
    let credentials = match token {
        Some(token) => CredentialStore::with_token(token),
        None => CredentialStore::new(),
    };
    let (navigator, routes) = ChannelNavigator::new();
    let guard = RequestGuard::new(credentials, Arc::new(navigator));
    let client = ConsoleClient::new(&server.base_url, Duration::from_secs(5), guard).unwrap();
    (client, routes)
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}

/// A status batch setting each `(id, state, secs)`.
pub fn status_frame(events: &[(u32, &str, u64)]) -> String {
    let events: Vec<serde_json::Value> = events
        .iter()
        .map(|(id, state, secs)| {
            serde_json::json!({
                "id": id,
                "status": [state, { "secs_since_epoch": secs, "nanos_since_epoch": 0 }]
            })
        })
        .collect();
    serde_json::Value::Array(events).to_string()
}

/// A log batch of `Note` entries.
pub fn log_frame(messages: &[&str]) -> String {
    let entries: Vec<serde_json::Value> = messages
        .iter()
        .map(|msg| {
            serde_json::json!({
                "kind": "Note",
                "msg": msg,
                "time": { "secs_since_epoch": 1000, "nanos_since_epoch": 0 }
            })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}

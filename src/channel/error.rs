//! Error types for push channels.

use thiserror::Error;

/// Errors raised while deriving, opening or reading a push channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Frame payload could not be decoded; the frame is dropped
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Endpoint could not be derived from the base URL
    #[error("invalid channel URL: {0}")]
    InvalidUrl(String),

    /// WebSocket handshake failed
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Handshake rejected because the session is not authorized
    #[error("handshake rejected: not authorized")]
    Unauthorized,
}

//! Error types for the napbridge pipeline.

use thiserror::Error;

/// Errors that can occur while listening, decoding or persisting events.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The WebSocket handshake (TCP connect, TLS, HTTP upgrade) failed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// WebSocket send/receive error on an open connection.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// No pong arrived within the keep-alive timeout.
    #[error("Keep-alive timed out after {ms}ms without pong")]
    KeepaliveTimeout { ms: u64 },

    /// Frame is not a JSON object.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A known field is present with the wrong JSON type.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The epoch-seconds value cannot be represented as a timestamp.
    #[error("Timestamp out of range: {secs}")]
    Timestamp { secs: i64 },

    /// Pool checkout, statement execution or commit failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or unusable settings.
    #[error("Config error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Returns `true` if the error ends the current connection session.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Handshake(_) | Self::WebSocket(_) | Self::KeepaliveTimeout { .. }
        )
    }

    /// Returns `true` if the error only affects the frame being decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::InvalidField { .. })
    }

    /// Returns `true` if the error only affects the event being persisted.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Timestamp { .. })
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

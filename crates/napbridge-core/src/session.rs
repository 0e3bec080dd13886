//! Connection session state of the stream listener.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the listener's socket.
///
/// `Disconnected → Connecting → Open → Closing → Disconnected`, forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No socket; either not started yet or waiting out the reconnect delay.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Handshake accepted with the bearer token; frames are being received.
    Open,
    /// The session ended and its resources are being released.
    Closing,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// How a session ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent a close frame.
    RemoteClosed { code: Option<u16>, reason: String },
    /// The stream ended without a close frame.
    StreamEnded,
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoteClosed { code: Some(code), reason } => {
                write!(f, "closed by peer ({code}: {reason})")
            }
            Self::RemoteClosed { code: None, .. } => write!(f, "closed by peer"),
            Self::StreamEnded => write!(f, "stream ended"),
        }
    }
}

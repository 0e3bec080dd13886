//! Stream listener configuration.

use std::time::Duration;

/// Configuration for the [`StreamListener`](crate::StreamListener).
#[derive(Clone)]
pub struct ListenerConfig {
    /// Upstream WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Sent as `Authorization: Bearer <token>`; no header when empty.
    pub auth_token: String,
    /// Fixed wait between a lost session and the next connect attempt.
    pub reconnect_delay: Duration,
    /// How often to probe the peer with a ping.
    pub ping_interval: Duration,
    /// How long to wait for the pong before giving up on the connection.
    pub ping_timeout: Duration,
    /// Upper bound for TCP connect + WebSocket handshake.
    pub connect_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            url: "ws://172.17.0.1:3001".into(),
            auth_token: "napcat".into(),
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for ListenerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerConfig")
            .field("url", &self.url)
            .field("auth_token", &"<redacted>")
            .field("reconnect_delay", &self.reconnect_delay)
            .field("ping_interval", &self.ping_interval)
            .field("ping_timeout", &self.ping_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

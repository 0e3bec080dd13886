//! napbridge-ws — WebSocket stream listener for napbridge.
//!
//! # Features
//! - `Authorization: Bearer` handshake
//! - Ping/pong keep-alive with a pong timeout
//! - Fixed-delay reconnect, retried forever
//! - Malformed frames and store failures never end a session

pub mod config;
pub mod listener;
pub mod stats;

pub use config::ListenerConfig;
pub use listener::StreamListener;
pub use stats::{ListenerStats, StatsSnapshot};

//! WebSocket stream listener with bearer auth, keep-alive and fixed-delay
//! reconnect.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use napbridge_core::error::BridgeError;
use napbridge_core::event::Event;
use napbridge_core::session::{SessionEnd, SessionState};
use napbridge_core::store::{deliver, EventStore};

use crate::config::ListenerConfig;
use crate::stats::ListenerStats;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// How long to wait for our close frame to go out before dropping the socket.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Subscribes to one upstream WebSocket and hands every decoded frame to an
/// [`EventStore`].
///
/// Frames are processed strictly one at a time: the next frame is not read
/// until the store has answered for the current one.
pub struct StreamListener {
    config: ListenerConfig,
    store: Arc<dyn EventStore>,
    stats: Arc<ListenerStats>,
    state: watch::Sender<SessionState>,
}

impl StreamListener {
    pub fn new(config: ListenerConfig, store: Arc<dyn EventStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            store,
            stats: Arc::new(ListenerStats::new()),
            state,
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Shared counters, updated as frames arrive.
    pub fn stats(&self) -> Arc<ListenerStats> {
        self.stats.clone()
    }

    /// Observe session state transitions.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Connect, receive, and reconnect forever.
    ///
    /// Never returns; stop it by dropping or aborting the task it runs in.
    pub async fn run(&self) {
        let delay = self.config.reconnect_delay;
        loop {
            match self.run_session().await {
                Ok(end) => tracing::warn!(
                    url = %self.config.url,
                    reason = %end,
                    "WS session ended, reconnecting in {delay:?}"
                ),
                Err(e) => tracing::warn!(
                    url = %self.config.url,
                    error = %e,
                    "WS connection lost, retrying in {delay:?}"
                ),
            }
            time::sleep(delay).await;
        }
    }

    /// Run one connect → receive → close cycle.
    ///
    /// Returns how the session ended; connection-level failures (handshake,
    /// I/O, protocol, keep-alive) come back as `Err`. Decode and store
    /// failures never end a session.
    pub async fn run_session(&self) -> Result<SessionEnd, BridgeError> {
        self.set_state(SessionState::Connecting);
        tracing::info!(url = %self.config.url, "connecting via WebSocket");

        let ws = match self.connect().await {
            Ok(ws) => ws,
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };

        self.stats.record_session();
        self.set_state(SessionState::Open);
        tracing::info!(url = %self.config.url, "connected to upstream WebSocket");

        let (mut sink, mut source) = ws.split();
        let outcome = self.receive_loop(&mut sink, &mut source).await;

        self.set_state(SessionState::Closing);
        let _ = time::timeout(CLOSE_GRACE, sink.close()).await;
        self.set_state(SessionState::Disconnected);
        outcome
    }

    /// Decode one frame and forward it to the store.
    ///
    /// Undecodable frames are logged and discarded; store failures are
    /// logged by [`deliver`]. Nothing here can end the session.
    pub async fn process_frame(&self, text: &str) {
        self.stats.record_frame();
        tracing::debug!(len = text.len(), "frame received");

        match Event::from_frame(text) {
            Ok(event) => {
                let delivery = deliver(self.store.as_ref(), &event).await;
                self.stats.record_delivery(delivery);
            }
            Err(e) => {
                self.stats.record_decode_failure();
                let head: String = text.chars().take(64).collect();
                tracing::warn!(error = %e, frame = %head, "discarding undecodable frame");
            }
        }
    }

    async fn connect(&self) -> Result<WsStream, BridgeError> {
        let request = self.handshake_request()?;
        let connecting = tokio_tungstenite::connect_async(request);

        match time::timeout(self.config.connect_timeout, connecting).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(e)) => Err(BridgeError::Handshake(e.to_string())),
            Err(_) => Err(BridgeError::Handshake(format!(
                "timed out after {:?}",
                self.config.connect_timeout
            ))),
        }
    }

    fn handshake_request(&self) -> Result<Request, BridgeError> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::Handshake(format!("invalid URL {}: {e}", self.config.url)))?;

        if !self.config.auth_token.is_empty() {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.auth_token))
                .map_err(|e| BridgeError::Handshake(format!("invalid auth token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, bearer);
        }
        Ok(request)
    }

    async fn receive_loop(
        &self,
        sink: &mut WsSink,
        source: &mut WsSource,
    ) -> Result<SessionEnd, BridgeError> {
        let interval = self.config.ping_interval;
        let mut ping_timer = time::interval_at(Instant::now() + interval, interval);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pong_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                msg = source.next() => match msg {
                    None => return Ok(SessionEnd::StreamEnded),
                    Some(Err(e)) => return Err(BridgeError::WebSocket(e.to_string())),
                    Some(Ok(Message::Text(text))) => self.process_frame(text.as_str()).await,
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => self.process_frame(text).await,
                        Err(e) => {
                            self.stats.record_frame();
                            self.stats.record_decode_failure();
                            tracing::warn!(error = %e, len = bytes.len(), "discarding non-UTF-8 binary frame");
                        }
                    },
                    Some(Ok(Message::Pong(_))) => pong_deadline = None,
                    Some(Ok(Message::Close(frame))) => {
                        return Ok(SessionEnd::RemoteClosed {
                            code: frame.as_ref().map(|f| u16::from(f.code)),
                            reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
                        });
                    }
                    // Pings are answered by tungstenite on the next read/write.
                    Some(Ok(_)) => {}
                },
                _ = ping_timer.tick() => {
                    if pong_deadline.is_none() {
                        sink.send(Message::Ping(Default::default()))
                            .await
                            .map_err(|e| BridgeError::WebSocket(format!("ping: {e}")))?;
                        pong_deadline = Some(Instant::now() + self.config.ping_timeout);
                    }
                }
                _ = time::sleep_until(pong_deadline.unwrap_or_else(Instant::now)), if pong_deadline.is_some() => {
                    return Err(BridgeError::KeepaliveTimeout {
                        ms: self.config.ping_timeout.as_millis() as u64,
                    });
                }
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        let prev = self.state.send_replace(state);
        if prev != state {
            tracing::debug!(from = %prev, to = %state, "session state");
        }
    }
}

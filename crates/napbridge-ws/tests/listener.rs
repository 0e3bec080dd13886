//! Listener tests against a local WebSocket upstream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use napbridge_core::{BridgeError, SessionEnd, SessionState};
use napbridge_storage::InMemoryStore;
use napbridge_ws::{ListenerConfig, StreamListener};

fn frame(id: i64) -> String {
    format!(r#"{{"post_type":"message","message_id":{id},"time":1700000000,"message":"frame {id}"}}"#)
}

fn config(url: String) -> ListenerConfig {
    ListenerConfig {
        url,
        auth_token: "napcat".into(),
        reconnect_delay: Duration::from_millis(200),
        ping_interval: Duration::from_secs(30),
        ping_timeout: Duration::from_secs(60),
        connect_timeout: Duration::from_secs(2),
    }
}

async fn bind() -> (TcpListener, String) {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", tcp.local_addr().unwrap());
    (tcp, url)
}

async fn eventually<F: Fn() -> bool>(what: &str, cond: F) {
    time::timeout(Duration::from_secs(5), async {
        while !cond() {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn bearer_token_and_malformed_frame_isolation() {
    let (tcp, url) = bind().await;
    let seen_auth = Arc::new(Mutex::new(None::<String>));

    let auth = seen_auth.clone();
    let server = tokio::spawn(async move {
        let (stream, _) = tcp.accept().await.unwrap();
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            *auth.lock().unwrap() = req
                .headers()
                .get("authorization")
                .map(|v| v.to_str().unwrap().to_string());
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();
        ws.send(Message::Text(frame(1).into())).await.unwrap();
        ws.send(Message::Text("this is not json".to_string().into())).await.unwrap();
        ws.send(Message::Text(frame(2).into())).await.unwrap();
        ws.send(Message::Text(frame(1).into())).await.unwrap();
        // Hold the connection open until the test ends.
        while ws.next().await.is_some() {}
    });

    let store = Arc::new(InMemoryStore::new());
    let listener = Arc::new(StreamListener::new(config(url), store.clone()));
    let stats = listener.stats();
    let task = {
        let l = listener.clone();
        tokio::spawn(async move { l.run().await })
    };

    eventually("all frames processed", || stats.snapshot().frames == 4).await;

    let snap = stats.snapshot();
    assert_eq!(snap.sessions, 1, "malformed frame must not force a reconnect");
    assert_eq!(snap.decode_failures, 1);
    assert_eq!(snap.inserted, 2);
    assert_eq!(snap.duplicates, 1);
    assert_eq!(store.len(), 2);
    assert_eq!(seen_auth.lock().unwrap().as_deref(), Some("Bearer napcat"));
    assert_eq!(*listener.state().borrow(), SessionState::Open);

    task.abort();
    server.abort();
}

#[tokio::test]
async fn reconnects_after_drop_and_resumes() {
    let (tcp, url) = bind().await;
    let dropped_at = Arc::new(Mutex::new(None::<Instant>));
    let reaccepted_at = Arc::new(Mutex::new(None::<Instant>));

    let (d, r) = (dropped_at.clone(), reaccepted_at.clone());
    let server = tokio::spawn(async move {
        let (stream, _) = tcp.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(frame(10).into())).await.unwrap();
        ws.close(None).await.ok();
        drop(ws);
        *d.lock().unwrap() = Some(Instant::now());

        let (stream, _) = tcp.accept().await.unwrap();
        *r.lock().unwrap() = Some(Instant::now());
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(frame(11).into())).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let store = Arc::new(InMemoryStore::new());
    let listener = Arc::new(StreamListener::new(config(url), store.clone()));
    let stats = listener.stats();
    let task = {
        let l = listener.clone();
        tokio::spawn(async move { l.run().await })
    };

    eventually("second session delivers", || store.len() == 2).await;
    assert_eq!(stats.snapshot().sessions, 2);

    let gap = reaccepted_at.lock().unwrap().unwrap() - dropped_at.lock().unwrap().unwrap();
    assert!(gap >= Duration::from_millis(150), "reconnected after only {gap:?}");

    task.abort();
    server.abort();
}

#[tokio::test]
async fn remote_close_ends_session_cleanly() {
    let (tcp, url) = bind().await;
    let server = tokio::spawn(async move {
        let (stream, _) = tcp.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        }))
        .await
        .unwrap();
        while ws.next().await.is_some() {}
    });

    let listener = StreamListener::new(config(url), Arc::new(InMemoryStore::new()));
    let end = time::timeout(Duration::from_secs(5), listener.run_session())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        end,
        SessionEnd::RemoteClosed {
            code: Some(1000),
            reason: "bye".into()
        }
    );
    assert_eq!(*listener.state().borrow(), SessionState::Disconnected);
    server.abort();
}

#[tokio::test]
async fn unanswered_ping_times_out() {
    let (tcp, url) = bind().await;
    let server = tokio::spawn(async move {
        let (stream, _) = tcp.accept().await.unwrap();
        // Never read, so no pong is ever sent back.
        let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        time::sleep(Duration::from_secs(30)).await;
    });

    let cfg = ListenerConfig {
        ping_interval: Duration::from_millis(50),
        ping_timeout: Duration::from_millis(100),
        ..config(url)
    };
    let listener = StreamListener::new(cfg, Arc::new(InMemoryStore::new()));
    let result = time::timeout(Duration::from_secs(5), listener.run_session())
        .await
        .unwrap();

    assert!(matches!(result, Err(BridgeError::KeepaliveTimeout { ms: 100 })));
    server.abort();
}

#[tokio::test]
async fn answered_pings_keep_the_session_open() {
    let (tcp, url) = bind().await;
    let pings = Arc::new(AtomicUsize::new(0));

    let seen = pings.clone();
    let server = tokio::spawn(async move {
        let (stream, _) = tcp.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // Reading lets tungstenite answer each ping with a pong.
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_ping() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    let cfg = ListenerConfig {
        ping_interval: Duration::from_millis(50),
        ping_timeout: Duration::from_millis(100),
        ..config(url)
    };
    let listener = Arc::new(StreamListener::new(cfg, Arc::new(InMemoryStore::new())));
    let stats = listener.stats();
    let task = {
        let l = listener.clone();
        tokio::spawn(async move { l.run().await })
    };

    let state = listener.state();
    eventually("session open", || *state.borrow() == SessionState::Open).await;
    time::sleep(Duration::from_millis(800)).await;

    assert_eq!(stats.snapshot().sessions, 1, "session dropped despite pongs");
    assert_eq!(*listener.state().borrow(), SessionState::Open);
    assert!(pings.load(Ordering::SeqCst) >= 5, "only {} pings", pings.load(Ordering::SeqCst));

    task.abort();
    server.abort();
}

#[tokio::test]
async fn refused_connection_is_a_handshake_error() {
    let (tcp, url) = bind().await;
    drop(tcp);

    let listener = StreamListener::new(config(url), Arc::new(InMemoryStore::new()));
    let err = listener.run_session().await.unwrap_err();

    assert!(matches!(err, BridgeError::Handshake(_)));
    assert!(err.is_connection());
    assert_eq!(listener.stats().snapshot().sessions, 0);
}

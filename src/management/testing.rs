//! In-process management endpoint for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, broadcast};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;

use super::protocol::{BANS_QUERY, PLAYERS_QUERY};

#[derive(Debug)]
struct MockState {
    secret: RwLock<String>,
    players: RwLock<Vec<Value>>,
    bans_supported: RwLock<bool>,
    reply_delay: RwLock<Duration>,
    connections: AtomicUsize,
    open_sessions: AtomicUsize,
    requests: AtomicUsize,
    notifications: broadcast::Sender<String>,
}

/// A fake instance speaking the management protocol on a loopback port.
#[derive(Debug)]
pub(crate) struct MockInstance {
    port: u16,
    state: Arc<MockState>,
    task: tokio::task::JoinHandle<()>,
}

#[allow(clippy::expect_used)]
impl MockInstance {
    pub(crate) async fn start(secret: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let port = listener.local_addr().expect("local addr").port();
        let (notifications, _) = broadcast::channel(16);
        let state = Arc::new(MockState {
            secret: RwLock::new(secret.to_string()),
            players: RwLock::new(Vec::new()),
            bans_supported: RwLock::new(true),
            reply_delay: RwLock::new(Duration::ZERO),
            connections: AtomicUsize::new(0),
            open_sessions: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            notifications,
        });

        let accept_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept_state)));
            }
        });

        Self { port, state, task }
    }

    /// URL usable as a channel URL template.
    pub(crate) fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    pub(crate) async fn set_secret(&self, secret: &str) {
        *self.state.secret.write().await = secret.to_string();
    }

    pub(crate) async fn set_players(&self, names: &[&str]) {
        *self.state.players.write().await = names
            .iter()
            .map(|name| json!({ "id": uuid::Uuid::new_v4().to_string(), "name": name }))
            .collect();
    }

    pub(crate) async fn disable_bans(&self) {
        *self.state.bans_supported.write().await = false;
    }

    /// Holds every reply back by `delay` after the request is read.
    pub(crate) async fn set_reply_delay(&self, delay: Duration) {
        *self.state.reply_delay.write().await = delay;
    }

    /// Pushes a notification to every open session.
    pub(crate) fn notify(&self, method: &str) {
        let _ = self.state.notifications.send(method.to_string());
    }

    /// Number of sessions that passed authentication.
    pub(crate) fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Number of authenticated sessions whose socket is still open.
    pub(crate) fn open_sessions(&self) -> usize {
        self.state.open_sessions.load(Ordering::SeqCst)
    }

    /// Number of requests read across all sessions.
    pub(crate) fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

impl Drop for MockInstance {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct OpenSession(Arc<MockState>);

impl Drop for OpenSession {
    fn drop(&mut self) {
        self.0.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn serve(stream: TcpStream, state: Arc<MockState>) {
    let expected = format!("Bearer {}", state.secret.read().await);
    let check = |request: &Request, response: Response| {
        let authorized = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == expected);
        if authorized {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("unauthorized".to_string()));
            *rejection.status_mut() = StatusCode::UNAUTHORIZED;
            Err(rejection)
        }
    };
    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, check).await else {
        return;
    };
    state.connections.fetch_add(1, Ordering::SeqCst);
    state.open_sessions.fetch_add(1, Ordering::SeqCst);
    let _open = OpenSession(Arc::clone(&state));
    let mut notifications = state.notifications.subscribe();

    loop {
        tokio::select! {
            frame = ws.next() => {
                let Some(Ok(Message::Text(text))) = frame else { return };
                let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else { return };
                let id = request.get("id").cloned().unwrap_or(Value::Null);
                let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
                state.requests.fetch_add(1, Ordering::SeqCst);
                let delay = *state.reply_delay.read().await;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let players = state.players.read().await.clone();
                let bans_supported = *state.bans_supported.read().await;
                let reply = match method {
                    PLAYERS_QUERY => json!({ "jsonrpc": "2.0", "id": id, "result": players }),
                    BANS_QUERY if bans_supported => json!({ "jsonrpc": "2.0", "id": id, "result": [] }),
                    _ => json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": -32601, "message": "Method not found" }
                    }),
                };
                if ws.send(Message::text(reply.to_string())).await.is_err() {
                    return;
                }
            }
            notification = notifications.recv() => {
                let Ok(method) = notification else { return };
                let frame = json!({ "jsonrpc": "2.0", "method": method, "params": [] });
                if ws.send(Message::text(frame.to_string())).await.is_err() {
                    return;
                }
            }
        }
    }
}

//! WebSocket connection loop.
//!
//! Handles the read/write loop for a single viewer connection: commands
//! from the client are answered inline, and events admitted by the
//! viewer's subscription are forwarded as they arrive.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::gateway::SubscriptionHandle;
use super::messages::{WsCommand, WsMessage};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards events from the viewer's [`SubscriptionHandle`].
pub async fn run_connection(socket: WebSocket, mut subscription: SubscriptionHandle) {
    let viewer = subscription.viewer();
    let (mut ws_tx, mut ws_rx) = socket.split();
    tracing::debug!(%viewer, "ws connection opened");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(text.as_str(), &subscription);
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
            event = subscription.next() => {
                let Some(event) = event else { break };
                let json = serde_json::to_string(&WsMessage::event(&event)).unwrap_or_default();
                if ws_tx.send(Message::text(json)).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!(%viewer, "ws connection closed");
}

/// Handles a text message from the client, returning an optional JSON response.
fn handle_text_message(text: &str, subscription: &SubscriptionHandle) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        let err = WsMessage::error(String::new(), 400, "malformed JSON");
        return serde_json::to_string(&err).ok();
    };

    let reply = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(WsCommand::RefreshAuthorization) => {
            subscription.request_refresh();
            WsMessage::response(msg.id, serde_json::json!({ "refresh_requested": true }))
        }
        Ok(WsCommand::Ping) => WsMessage::response(msg.id, serde_json::json!({ "pong": true })),
        Err(_) => WsMessage::error(msg.id, 404, "unknown command"),
    };
    serde_json::to_string(&reply).ok()
}

//! Wire format of the instance management protocol.
//!
//! The protocol is JSON over WebSocket. The gateway sends requests
//! `{"jsonrpc":"2.0","id":N,"method":"..."}`; the instance answers with
//! `{"id":N,"result":...}` (or `"error"`) and pushes notifications
//! `{"method":"<domain>:notification/<category>/<action>","params":...}`
//! at any time, including between a request and its response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ChannelError;

/// Query returning the connected player list.
pub const PLAYERS_QUERY: &str = "minecraft:players";

/// Query returning the ban list.
pub const BANS_QUERY: &str = "minecraft:bans";

/// Outbound request frame.
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    jsonrpc: &'static str,
    /// Correlation id echoed by the response.
    pub id: u64,
    /// Method name.
    pub method: &'a str,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Request<'a> {
    /// Builds a request without parameters.
    #[must_use]
    pub const fn new(id: u64, method: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Successful answer to request `id`.
    Response {
        /// Correlation id.
        id: u64,
        /// Result payload (`null` when absent).
        result: Value,
    },
    /// Error answer to request `id`.
    Failure {
        /// Correlation id.
        id: u64,
        /// Error object as sent by the instance.
        error: Value,
    },
    /// Asynchronous notification.
    Notification(Notification),
}

/// Notifications the gateway reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A player joined.
    PlayersJoined,
    /// A player left.
    PlayersLeft,
    /// A ban was added.
    BansAdded,
    /// A ban was lifted.
    BansRemoved,
    /// A world save started.
    ServerSaving,
    /// A world save completed.
    ServerSaved,
    /// The server finished starting.
    ServerStarted,
    /// The server is shutting down.
    ServerStopping,
    /// Anything else; carries the raw method name.
    Unrecognized(String),
}

impl Notification {
    /// Classifies a notification by its method name.
    ///
    /// Only the `<category>/<action>` part after `notification/` matters,
    /// so the domain prefix is not pinned.
    #[must_use]
    pub fn from_method(method: &str) -> Self {
        let action = method
            .split_once(':')
            .and_then(|(_, rest)| rest.strip_prefix("notification/"));
        match action {
            Some("players/joined") => Self::PlayersJoined,
            Some("players/left") => Self::PlayersLeft,
            Some("bans/added") => Self::BansAdded,
            Some("bans/removed") => Self::BansRemoved,
            Some("server/saving") => Self::ServerSaving,
            Some("server/saved") => Self::ServerSaved,
            Some("server/started") => Self::ServerStarted,
            Some("server/stopping") => Self::ServerStopping,
            _ => Self::Unrecognized(method.to_string()),
        }
    }
}

/// Decodes one text frame.
///
/// # Errors
///
/// Returns [`ChannelError::Protocol`] if the frame is not JSON, or is
/// neither a response (has `id`) nor a notification (has `method`).
pub fn decode(text: &str) -> Result<Inbound, ChannelError> {
    let frame: RawFrame = serde_json::from_str(text)
        .map_err(|e| ChannelError::Protocol(format!("malformed frame: {e}")))?;

    match (frame.id, frame.method) {
        (Some(id), None) => match frame.error {
            Some(error) => Ok(Inbound::Failure { id, error }),
            None => Ok(Inbound::Response {
                id,
                result: frame.result.unwrap_or(Value::Null),
            }),
        },
        (None, Some(method)) => Ok(Inbound::Notification(Notification::from_method(&method))),
        (Some(_), Some(method)) => Err(ChannelError::Protocol(format!(
            "unexpected request {method} from instance"
        ))),
        (None, None) => Err(ChannelError::Protocol(
            "frame has neither id nor method".to_string(),
        )),
    }
}

//! Failures of a single management connection.
//!
//! None of these are fatal: every variant ends the current session and the
//! owning channel reconnects after its backoff delay.

use std::time::Duration;

use tokio_tungstenite::tungstenite;

/// Reason a management session ended.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Handshake, read or write failure on the underlying WebSocket.
    #[error("connection failure: {0}")]
    Connection(Box<tungstenite::Error>),

    /// The instance closed the connection.
    #[error("connection closed by instance")]
    Closed,

    /// The endpoint or credential could not be turned into a request.
    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    /// The instance sent a frame that does not follow the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The instance answered a request with an error object.
    #[error("request {method} rejected: {message}")]
    Remote {
        /// Method of the failed request.
        method: &'static str,
        /// Error object as reported by the instance.
        message: String,
    },

    /// A request or the handshake exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// What was being awaited.
        operation: &'static str,
        /// The deadline that was exceeded.
        after: Duration,
    },
}

impl From<tungstenite::Error> for ChannelError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Connection(Box::new(err))
    }
}

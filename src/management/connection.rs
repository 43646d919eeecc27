//! One open WebSocket session with an instance's management endpoint.
//!
//! [`ManagementConnection`] multiplexes request/response pairs and
//! unsolicited notifications over a single socket. Notifications that
//! arrive while a request is in flight are queued and handed out, in
//! arrival order, by [`ManagementConnection::next_notification`].

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::ChannelError;
use super::protocol::{self, Inbound, Notification, Request};

/// An authenticated management session.
#[derive(Debug)]
pub struct ManagementConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
    pending: VecDeque<Notification>,
    request_timeout: Duration,
}

impl ManagementConnection {
    /// Connects to `url`, authenticating with `secret` as a bearer token.
    ///
    /// The handshake is bounded by `request_timeout`, like every request
    /// made on the resulting connection.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Endpoint`] for an unusable URL or secret,
    /// [`ChannelError::Connection`] if the handshake fails, and
    /// [`ChannelError::Timeout`] if it does not complete in time.
    pub async fn open(
        url: &str,
        secret: &str,
        request_timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| ChannelError::Endpoint(format!("{url}: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {secret}"))
            .map_err(|_| ChannelError::Endpoint("secret is not a valid header value".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, _response) =
            tokio::time::timeout(request_timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| ChannelError::Timeout {
                    operation: "handshake",
                    after: request_timeout,
                })??;

        Ok(Self {
            stream,
            next_id: 1,
            pending: VecDeque::new(),
            request_timeout,
        })
    }

    /// Sends `method` and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Remote`] if the instance answers with an
    /// error, [`ChannelError::Timeout`] if no answer arrives in time, and
    /// any read/decode failure of the connection.
    pub async fn request(&mut self, method: &'static str) -> Result<Value, ChannelError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let frame = serde_json::to_string(&Request::new(id, method))
            .map_err(|e| ChannelError::Protocol(e.to_string()))?;

        let limit = self.request_timeout;
        tokio::time::timeout(limit, self.exchange(id, method, frame))
            .await
            .map_err(|_| ChannelError::Timeout {
                operation: method,
                after: limit,
            })?
    }

    async fn exchange(
        &mut self,
        id: u64,
        method: &'static str,
        frame: String,
    ) -> Result<Value, ChannelError> {
        self.stream.send(Message::text(frame)).await?;
        loop {
            match self.read_frame().await? {
                Inbound::Response { id: answered, result } if answered == id => {
                    return Ok(result);
                }
                Inbound::Failure { id: answered, error } if answered == id => {
                    return Err(ChannelError::Remote {
                        method,
                        message: error.to_string(),
                    });
                }
                Inbound::Notification(notification) => self.pending.push_back(notification),
                Inbound::Response { id: stray, .. } | Inbound::Failure { id: stray, .. } => {
                    tracing::debug!(stray, expected = id, "ignoring response to unknown request");
                }
            }
        }
    }

    /// Waits for the next notification, draining queued ones first.
    ///
    /// # Errors
    ///
    /// Returns the read/decode failure that ended the connection.
    pub async fn next_notification(&mut self) -> Result<Notification, ChannelError> {
        if let Some(notification) = self.pending.pop_front() {
            return Ok(notification);
        }
        loop {
            match self.read_frame().await? {
                Inbound::Notification(notification) => return Ok(notification),
                Inbound::Response { id, .. } | Inbound::Failure { id, .. } => {
                    tracing::debug!(id, "ignoring late response");
                }
            }
        }
    }

    async fn read_frame(&mut self) -> Result<Inbound, ChannelError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return protocol::decode(text.as_str()),
                Some(Ok(Message::Binary(_))) => {
                    return Err(ChannelError::Protocol("unexpected binary frame".to_string()));
                }
                Some(Ok(Message::Close(_))) | None => return Err(ChannelError::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

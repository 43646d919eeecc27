//! Instance management protocol client.
//!
//! Each tracked instance exposes a management endpoint speaking a JSON-RPC
//! dialect over WebSocket. This module holds the wire format, a single
//! authenticated connection, the reconnect policy, and the
//! [`InstanceChannel`] that ties them together and keeps the status store
//! current.

pub mod backoff;
pub mod channel;
pub mod connection;
pub mod error;
pub mod protocol;

#[cfg(test)]
pub(crate) mod testing;

pub use backoff::{BackoffError, BackoffPolicy, BackoffStep, ReconnectState};
pub use channel::{ChannelSettings, ChannelStatus, ConnectionState, InstanceChannel};
pub use connection::ManagementConnection;
pub use error::ChannelError;
pub use protocol::Notification;

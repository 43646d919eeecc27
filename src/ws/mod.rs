//! WebSocket layer: viewer subscriptions, authorization, connection handling.
//!
//! The WebSocket endpoint at `/ws` streams the domain events a viewer is
//! allowed to see. Filtering happens in [`gateway::ObserverGateway`], one
//! forwarding task per connected viewer.

pub mod authorization;
pub mod connection;
pub mod gateway;
pub mod handler;
pub mod messages;

pub use authorization::{AuthorizationError, AuthorizationSource, MemoryAuthorizationSource};
pub use gateway::{ObserverGateway, SubscriptionHandle};

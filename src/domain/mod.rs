//! Domain layer: identifiers, events, the event bus, and the status cache.
//!
//! This module contains the server-side domain model: instance and viewer
//! identity, viewer roles, the closed set of domain events, the broadcast
//! bus that carries them, and the shared cache of live instance status.

pub mod domain_event;
pub mod event_bus;
pub mod ids;
pub mod instance;
pub mod role;
pub mod status_store;

pub use domain_event::{DomainEvent, EventKind};
pub use event_bus::EventBus;
pub use ids::{InstanceId, ViewerId};
pub use instance::{InstanceRef, Loader};
pub use role::{AuthorizationSnapshot, Role};
pub use status_store::{InstanceStatus, Player, PlayerBan, StatusKey, StatusStore};

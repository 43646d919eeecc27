//! # fleet-gateway
//!
//! Status synchronization and observer gateway for a fleet of game-server
//! instances.
//!
//! The gateway keeps one management channel open per tracked instance,
//! caches what each instance reports (connected players, ban list), and
//! fans every change out to connected viewers, filtered by the roles each
//! viewer holds. It also ships the version ordering and extension
//! compatibility checks used before moving an instance to another game
//! version.
//!
//! ## Architecture
//!
//! ```text
//! Viewers (WebSocket)          Lifecycle layer (HTTP)
//!     │                              │
//!     ├── WS Handler (ws/)           ├── REST Handlers (api/)
//!     ├── ObserverGateway (ws/)      │
//!     │                              ├── FleetSynchronizer (service/)
//!     │                              ├── InstanceChannel (management/)
//!     │                              │       └── game-server management endpoints
//!     │                              │
//!     └──────── EventBus (domain/) ──┴── StatusStore (domain/)
//!
//! CompatibilityResolver (compat/) ── ExtensionRegistry (injected)
//! ```

pub mod api;
pub mod app_state;
pub mod compat;
pub mod config;
pub mod domain;
pub mod error;
pub mod management;
pub mod service;
pub mod ws;

//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::FleetConfig;
use crate::domain::{EventBus, StatusStore};
use crate::service::FleetSynchronizer;
use crate::ws::authorization::MemoryAuthorizationSource;
use crate::ws::gateway::ObserverGateway;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Tracked instances and their status channels.
    pub fleet: Arc<FleetSynchronizer>,
    /// Event bus shared by channels, collaborators and observers.
    pub event_bus: EventBus,
    /// Viewer subscriptions.
    pub gateway: ObserverGateway,
    /// Viewer roles, written through the viewer endpoints.
    pub authorizations: Arc<MemoryAuthorizationSource>,
}

impl AppState {
    /// Wires the domain, service and observer layers from `config`.
    #[must_use]
    pub fn from_config(config: &FleetConfig) -> Self {
        let event_bus = EventBus::new(&config.event_channel_name, config.event_bus_capacity);
        let store = Arc::new(StatusStore::new());
        let fleet = Arc::new(FleetSynchronizer::new(
            store,
            event_bus.clone(),
            config.channel_settings(),
        ));
        let authorizations = Arc::new(MemoryAuthorizationSource::new());
        let source: Arc<MemoryAuthorizationSource> = Arc::clone(&authorizations);
        let gateway = ObserverGateway::new(
            event_bus.clone(),
            source,
            config.min_viewing_role,
            config.observer_queue_capacity,
        );

        Self {
            fleet,
            event_bus,
            gateway,
            authorizations,
        }
    }
}

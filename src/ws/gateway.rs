//! Per-viewer filtered delivery of domain events.
//!
//! [`ObserverGateway::accept`] attaches a viewer to the [`EventBus`]. Each
//! subscription runs a forwarding task that decides, event by event,
//! whether the viewer may see it:
//!
//! 1. if the event lists the viewer as affected, the viewer's roles are
//!    reloaded from the [`AuthorizationSource`] first;
//! 2. `deleted` events are always delivered;
//! 3. fleet-wide events (no instance id) are always delivered;
//! 4. anything else requires at least the minimum viewing role on the
//!    event's instance.
//!
//! Events keep their bus order. A subscriber that falls behind the bus
//! loses the oldest events; publishers never wait.

use std::sync::Arc;

use tokio::sync::{Notify, broadcast, mpsc};
use tokio::task::JoinHandle;

use super::authorization::{AuthorizationError, AuthorizationSource};
use crate::domain::{AuthorizationSnapshot, DomainEvent, EventBus, EventKind, Role, ViewerId};

/// Attaches viewers to the event bus.
#[derive(Debug, Clone)]
pub struct ObserverGateway {
    bus: EventBus,
    authorizations: Arc<dyn AuthorizationSource>,
    min_role: Role,
    queue_capacity: usize,
}

impl ObserverGateway {
    /// Creates a gateway.
    ///
    /// `queue_capacity` bounds the events buffered between the forwarding
    /// task and the consumer of a [`SubscriptionHandle`].
    #[must_use]
    pub fn new(
        bus: EventBus,
        authorizations: Arc<dyn AuthorizationSource>,
        min_role: Role,
        queue_capacity: usize,
    ) -> Self {
        Self {
            bus,
            authorizations,
            min_role,
            queue_capacity,
        }
    }

    /// Minimum role required to see instance-scoped events.
    #[must_use]
    pub const fn min_role(&self) -> Role {
        self.min_role
    }

    /// Returns the authorization source used for refreshes.
    #[must_use]
    pub fn authorizations(&self) -> &Arc<dyn AuthorizationSource> {
        &self.authorizations
    }

    /// Subscribes `viewer` starting from `initial`.
    ///
    /// The bus subscription is taken before this returns, so every event
    /// published afterwards is considered for the viewer.
    #[must_use]
    pub fn accept(&self, viewer: ViewerId, initial: AuthorizationSnapshot) -> SubscriptionHandle {
        let receiver = self.bus.subscribe();
        let (sender, events) = mpsc::channel(self.queue_capacity.max(1));
        let refresh = Arc::new(Notify::new());
        let filter = ObserverFilter {
            viewer,
            snapshot: initial,
            min_role: self.min_role,
            source: Arc::clone(&self.authorizations),
        };
        let task = tokio::spawn(forward(filter, receiver, sender, Arc::clone(&refresh)));

        tracing::debug!(%viewer, channel = self.bus.channel_name(), "observer subscribed");
        SubscriptionHandle {
            viewer,
            events,
            refresh,
            task,
        }
    }
}

/// A viewer's filtered event stream.
///
/// Dropping the handle stops the forwarding task.
#[derive(Debug)]
pub struct SubscriptionHandle {
    viewer: ViewerId,
    events: mpsc::Receiver<DomainEvent>,
    refresh: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// The subscribed viewer.
    #[must_use]
    pub const fn viewer(&self) -> ViewerId {
        self.viewer
    }

    /// Waits for the next event this viewer may see.
    ///
    /// Returns `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<DomainEvent> {
        self.events.recv().await
    }

    /// Asks the forwarding task to reload the viewer's roles before it
    /// filters the next event.
    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug)]
struct ObserverFilter {
    viewer: ViewerId,
    snapshot: AuthorizationSnapshot,
    min_role: Role,
    source: Arc<dyn AuthorizationSource>,
}

impl ObserverFilter {
    async fn evaluate(&mut self, event: &DomainEvent) -> bool {
        if event.affects(self.viewer) {
            self.refresh().await;
        }
        self.admits(event)
    }

    fn admits(&self, event: &DomainEvent) -> bool {
        if event.kind() == EventKind::Deleted {
            return true;
        }
        event
            .instance_id()
            .is_none_or(|id| self.snapshot.role_for(id) >= self.min_role)
    }

    async fn refresh(&mut self) {
        match self.source.load(self.viewer).await {
            Ok(snapshot) => {
                tracing::debug!(
                    viewer = %self.viewer,
                    instances = snapshot.len(),
                    "authorization refreshed"
                );
                self.snapshot = snapshot;
            }
            Err(AuthorizationError::UnknownViewer(_)) => {
                tracing::info!(viewer = %self.viewer, "viewer no longer known, roles cleared");
                self.snapshot = AuthorizationSnapshot::new();
            }
            Err(e @ AuthorizationError::Unavailable(_)) => {
                tracing::warn!(
                    viewer = %self.viewer,
                    error = %e,
                    "authorization refresh failed, keeping previous roles"
                );
            }
        }
    }
}

async fn forward(
    mut filter: ObserverFilter,
    mut receiver: broadcast::Receiver<DomainEvent>,
    sender: mpsc::Sender<DomainEvent>,
    refresh: Arc<Notify>,
) {
    loop {
        tokio::select! {
            biased;
            () = sender.closed() => break,
            () = refresh.notified() => filter.refresh().await,
            received = receiver.recv() => match received {
                Ok(event) => {
                    if filter.evaluate(&event).await && sender.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    tracing::warn!(
                        viewer = %filter.viewer,
                        dropped,
                        "observer lagging, oldest events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    tracing::debug!(viewer = %filter.viewer, "observer unsubscribed");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::domain::InstanceId;
    use crate::ws::authorization::MemoryAuthorizationSource;

    #[derive(Debug, Default)]
    struct CountingSource {
        inner: MemoryAuthorizationSource,
        loads: AtomicUsize,
        failing: bool,
    }

    #[async_trait]
    impl AuthorizationSource for CountingSource {
        async fn load(
            &self,
            viewer: ViewerId,
        ) -> Result<AuthorizationSnapshot, AuthorizationError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                return Err(AuthorizationError::Unavailable("db down".to_string()));
            }
            self.inner.load(viewer).await
        }
    }

    fn gateway(bus: &EventBus, source: Arc<CountingSource>) -> ObserverGateway {
        ObserverGateway::new(bus.clone(), source, Role::User, 16)
    }

    fn deleted(instance_id: InstanceId) -> DomainEvent {
        DomainEvent::Deleted {
            instance_id,
            affected_observers: None,
            timestamp: Utc::now(),
        }
    }

    fn updated(instance_id: Option<InstanceId>, affected: Vec<ViewerId>) -> DomainEvent {
        DomainEvent::Updated {
            instance_id,
            affected_observers: Some(affected),
            timestamp: Utc::now(),
        }
    }

    async fn next(handle: &mut SubscriptionHandle) -> DomainEvent {
        match tokio::time::timeout(Duration::from_secs(5), handle.next()).await {
            Ok(Some(event)) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_viewer_only_sees_deletions_and_fleet_events() {
        let bus = EventBus::new("fleet-updates", 16);
        let source = Arc::new(CountingSource::default());
        let mut handle =
            gateway(&bus, Arc::clone(&source)).accept(ViewerId::new(), AuthorizationSnapshot::new());
        let instance = InstanceId::new();

        bus.publish(DomainEvent::players_changed(instance, Vec::new()));
        bus.publish(deleted(instance));
        bus.publish(updated(None, Vec::new()));

        assert_eq!(next(&mut handle).await.kind(), EventKind::Deleted);
        let fleet_wide = next(&mut handle).await;
        assert_eq!(fleet_wide.kind(), EventKind::Updated);
        assert_eq!(fleet_wide.instance_id(), None);
        assert_eq!(source.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn role_below_minimum_is_filtered() {
        let bus = EventBus::new("fleet-updates", 16);
        let visible = InstanceId::new();
        let hidden = InstanceId::new();
        let snapshot = AuthorizationSnapshot::new()
            .with_role(visible, Role::User)
            .with_role(hidden, Role::None);
        let mut handle =
            gateway(&bus, Arc::new(CountingSource::default())).accept(ViewerId::new(), snapshot);

        bus.publish(DomainEvent::players_changed(hidden, Vec::new()));
        bus.publish(DomainEvent::players_changed(visible, Vec::new()));

        assert_eq!(next(&mut handle).await.instance_id(), Some(visible));
    }

    #[tokio::test]
    async fn affected_viewer_refreshes_exactly_once_before_filtering() {
        let bus = EventBus::new("fleet-updates", 16);
        let source = Arc::new(CountingSource::default());
        let viewer = ViewerId::new();
        let instance = InstanceId::new();
        let mut handle =
            gateway(&bus, Arc::clone(&source)).accept(viewer, AuthorizationSnapshot::new());

        source.inner.grant(viewer, instance, Role::Moderator).await;
        bus.publish(updated(Some(instance), vec![viewer]));
        bus.publish(DomainEvent::players_changed(instance, Vec::new()));

        assert_eq!(next(&mut handle).await.kind(), EventKind::Updated);
        assert_eq!(next(&mut handle).await.kind(), EventKind::PlayersChanged);
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn revoked_viewer_still_receives_deletion() {
        let bus = EventBus::new("fleet-updates", 16);
        let source = Arc::new(CountingSource::default());
        let viewer = ViewerId::new();
        let instance = InstanceId::new();
        let initial = AuthorizationSnapshot::new().with_role(instance, Role::Admin);
        let mut handle = gateway(&bus, Arc::clone(&source)).accept(viewer, initial);

        bus.publish(DomainEvent::Deleted {
            instance_id: instance,
            affected_observers: Some(vec![viewer]),
            timestamp: Utc::now(),
        });
        bus.publish(DomainEvent::players_changed(instance, Vec::new()));
        bus.publish(updated(None, Vec::new()));

        assert_eq!(next(&mut handle).await.kind(), EventKind::Deleted);
        assert_eq!(next(&mut handle).await.kind(), EventKind::Updated);
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let bus = EventBus::new("fleet-updates", 16);
        let source = Arc::new(CountingSource {
            failing: true,
            ..CountingSource::default()
        });
        let viewer = ViewerId::new();
        let instance = InstanceId::new();
        let initial = AuthorizationSnapshot::new().with_role(instance, Role::User);
        let mut handle = gateway(&bus, Arc::clone(&source)).accept(viewer, initial);

        bus.publish(updated(Some(instance), vec![viewer]));

        assert_eq!(next(&mut handle).await.instance_id(), Some(instance));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn revoked_viewer_loses_instance_events() {
        let bus = EventBus::new("fleet-updates", 16);
        let source = Arc::new(CountingSource::default());
        let viewer = ViewerId::new();
        let instance = InstanceId::new();
        source.inner.grant(viewer, instance, Role::Admin).await;
        let initial = AuthorizationSnapshot::new().with_role(instance, Role::Admin);
        let mut handle = gateway(&bus, Arc::clone(&source)).accept(viewer, initial);

        assert!(source.inner.revoke(viewer).await);
        bus.publish(updated(None, vec![viewer]));
        bus.publish(DomainEvent::players_changed(instance, Vec::new()));
        bus.publish(deleted(instance));

        assert_eq!(next(&mut handle).await.kind(), EventKind::Updated);
        assert_eq!(next(&mut handle).await.kind(), EventKind::Deleted);
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn manual_refresh_reloads_roles() {
        let bus = EventBus::new("fleet-updates", 16);
        let source = Arc::new(CountingSource::default());
        let viewer = ViewerId::new();
        let instance = InstanceId::new();
        let mut handle =
            gateway(&bus, Arc::clone(&source)).accept(viewer, AuthorizationSnapshot::new());

        source.inner.grant(viewer, instance, Role::User).await;
        handle.request_refresh();
        tokio::task::yield_now().await;
        bus.publish(DomainEvent::players_changed(instance, Vec::new()));

        assert_eq!(next(&mut handle).await.instance_id(), Some(instance));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lagging_observer_drops_oldest() {
        let bus = EventBus::new("fleet-updates", 2);
        let source = Arc::new(CountingSource::default());
        let mut handle =
            gateway(&bus, source).accept(ViewerId::new(), AuthorizationSnapshot::new());

        let ids: Vec<InstanceId> = (0..4).map(|_| InstanceId::new()).collect();
        for id in &ids {
            bus.publish(deleted(*id));
        }

        assert_eq!(next(&mut handle).await.instance_id(), ids.get(2).copied());
        assert_eq!(next(&mut handle).await.instance_id(), ids.get(3).copied());
    }

    #[tokio::test]
    async fn dropping_handle_releases_bus_receiver() {
        let bus = EventBus::new("fleet-updates", 16);
        let handle = gateway(&bus, Arc::new(CountingSource::default()))
            .accept(ViewerId::new(), AuthorizationSnapshot::new());
        assert_eq!(bus.receiver_count(), 1);

        drop(handle);
        for _ in 0..10 {
            if bus.receiver_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(bus.receiver_count(), 0);
    }
}

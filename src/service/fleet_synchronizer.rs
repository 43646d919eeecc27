//! Fleet synchronizer: owns one status channel per tracked instance.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::{EventBus, InstanceId, InstanceRef, Loader, StatusStore};
use crate::management::{ChannelSettings, ChannelStatus, InstanceChannel};

#[derive(Debug)]
struct TrackedChannel {
    loader: Loader,
    cancel: CancellationToken,
    status: watch::Receiver<ChannelStatus>,
    task: JoinHandle<()>,
}

/// A tracked instance as reported by [`FleetSynchronizer::tracked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedInstance {
    /// Instance identifier.
    pub id: InstanceId,
    /// Loader the instance runs.
    pub loader: Loader,
    /// Latest channel status.
    pub status: ChannelStatus,
}

/// Starts and stops [`InstanceChannel`]s.
///
/// The synchronizer is the only component that spawns or cancels channels.
/// Its task map is guarded by a single lock held across the
/// check-then-insert in [`FleetSynchronizer::track`], so concurrent calls
/// for the same instance start at most one channel.
#[derive(Debug)]
pub struct FleetSynchronizer {
    channels: RwLock<HashMap<InstanceId, TrackedChannel>>,
    store: Arc<StatusStore>,
    bus: EventBus,
    settings: Arc<ChannelSettings>,
    root: CancellationToken,
}

impl FleetSynchronizer {
    /// Creates a synchronizer with no tracked instances.
    #[must_use]
    pub fn new(store: Arc<StatusStore>, bus: EventBus, settings: ChannelSettings) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            store,
            bus,
            settings: Arc::new(settings),
            root: CancellationToken::new(),
        }
    }

    /// Returns the status store the channels write into.
    #[must_use]
    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }

    /// Returns the bus the channels publish on.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Starts a channel for `instance` unless one is already running.
    ///
    /// Returns `true` if a new channel was started. A channel whose task
    /// has already finished is replaced.
    pub async fn track(&self, instance: InstanceRef) -> bool {
        let id = instance.id;
        let mut channels = self.channels.write().await;

        if channels.get(&id).is_some_and(|c| !c.task.is_finished()) {
            tracing::debug!(instance_id = %id, "instance already tracked");
            return false;
        }

        let cancel = self.root.child_token();
        let loader = instance.loader;
        let (channel, status) = InstanceChannel::new(
            instance,
            Arc::clone(&self.settings),
            Arc::clone(&self.store),
            self.bus.clone(),
            cancel.clone(),
        );
        let task = tokio::spawn(channel.run());

        let previous = channels.insert(
            id,
            TrackedChannel {
                loader,
                cancel,
                status,
                task,
            },
        );
        debug_assert!(
            previous.as_ref().is_none_or(|p| p.task.is_finished()),
            "second live channel started for {id}"
        );

        tracing::info!(instance_id = %id, %loader, tracked = channels.len(), "instance tracked");
        true
    }

    /// Stops the channel of `id`, if any.
    ///
    /// The cached status is kept; see [`FleetSynchronizer::invalidate`].
    /// Returns `true` if a channel was tracked.
    pub async fn untrack(&self, id: InstanceId) -> bool {
        let removed = self.channels.write().await.remove(&id);
        match removed {
            Some(channel) => {
                channel.cancel.cancel();
                tracing::info!(instance_id = %id, "instance untracked");
                true
            }
            None => false,
        }
    }

    /// Drops the cached status of `id`.
    pub async fn invalidate(&self, id: InstanceId) -> bool {
        let existed = self.store.invalidate(id).await;
        if existed {
            tracing::debug!(instance_id = %id, "instance status invalidated");
        }
        existed
    }

    /// Returns the channel status of `id` if it is tracked.
    pub async fn channel_status(&self, id: InstanceId) -> Option<ChannelStatus> {
        self.channels
            .read()
            .await
            .get(&id)
            .map(|c| *c.status.borrow())
    }

    /// Lists every tracked instance, ordered by id.
    pub async fn tracked(&self) -> Vec<TrackedInstance> {
        let mut tracked: Vec<TrackedInstance> = self
            .channels
            .read()
            .await
            .iter()
            .map(|(id, c)| TrackedInstance {
                id: *id,
                loader: c.loader,
                status: *c.status.borrow(),
            })
            .collect();
        tracked.sort_by_key(|t| t.id);
        tracked
    }

    /// Cancels every channel and waits for their tasks to finish.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let drained: Vec<(InstanceId, TrackedChannel)> =
            self.channels.write().await.drain().collect();
        let count = drained.len();
        for (id, channel) in drained {
            if let Err(e) = channel.task.await {
                tracing::warn!(instance_id = %id, error = %e, "instance channel task failed");
            }
        }
        tracing::info!(channels = count, "fleet synchronizer stopped");
    }
}

impl Drop for FleetSynchronizer {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

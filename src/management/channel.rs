//! Reconnecting status channel for one instance.
//!
//! An [`InstanceChannel`] owns the management connection of a single
//! instance and keeps that instance's [`StatusStore`] entry current. It is
//! a small state machine:
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected
//!      ▲               │              │
//!      └───── backoff ◄┴──── failure ◄┘
//! ```
//!
//! Any failure (handshake, read, malformed frame, timeout) drops the
//! connection; the channel sleeps according to its [`BackoffPolicy`] and
//! tries again. Requests are never retried individually.
//!
//! The channel only stops when its cancellation token fires, which is
//! observed during the handshake, while waiting for a notification, and
//! while sleeping. A query that is already in flight runs to completion
//! together with its store write and publish.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use super::backoff::{BackoffPolicy, ReconnectState};
use super::connection::ManagementConnection;
use super::protocol::{BANS_QUERY, Notification, PLAYERS_QUERY};
use super::ChannelError;
use crate::domain::{
    DomainEvent, EventBus, InstanceId, InstanceRef, Player, PlayerBan, StatusStore,
};

/// Connection state of an [`InstanceChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected; waiting for the backoff delay to elapse.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Session established and status seeded.
    Connected,
}

/// Observable snapshot of a channel's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful handshake.
    pub consecutive_failures: u32,
    /// Delay that applies before the next attempt.
    pub current_backoff: Duration,
}

/// Settings shared by every channel of a fleet.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Endpoint URL template; `{id}` is replaced by the instance id.
    pub url_template: String,
    /// Deadline for the handshake and for every request.
    pub request_timeout: Duration,
    /// Reconnect delay policy.
    pub backoff: BackoffPolicy,
}

impl ChannelSettings {
    /// Returns the management endpoint URL of `instance_id`.
    #[must_use]
    pub fn endpoint_for(&self, instance_id: InstanceId) -> String {
        self.url_template.replace("{id}", &instance_id.to_string())
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            url_template: "ws://instance-{id}:25585".to_string(),
            request_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// How a session ended.
#[derive(Debug)]
enum SessionEnd {
    Cancelled,
    Failed(ChannelError),
}

impl From<ChannelError> for SessionEnd {
    fn from(error: ChannelError) -> Self {
        Self::Failed(error)
    }
}

/// Keeps one instance's live status in sync with its management endpoint.
#[derive(Debug)]
pub struct InstanceChannel {
    instance: InstanceRef,
    endpoint: String,
    settings: Arc<ChannelSettings>,
    store: Arc<StatusStore>,
    bus: EventBus,
    status: watch::Sender<ChannelStatus>,
    cancel: CancellationToken,
}

impl InstanceChannel {
    /// Creates a channel in the `Disconnected` state.
    ///
    /// Returns the channel together with a receiver that observes every
    /// state transition.
    #[must_use]
    pub fn new(
        instance: InstanceRef,
        settings: Arc<ChannelSettings>,
        store: Arc<StatusStore>,
        bus: EventBus,
        cancel: CancellationToken,
    ) -> (Self, watch::Receiver<ChannelStatus>) {
        let endpoint = settings.endpoint_for(instance.id);
        let (status, status_rx) = watch::channel(ChannelStatus {
            state: ConnectionState::Disconnected,
            consecutive_failures: 0,
            current_backoff: settings.backoff.floor(),
        });
        let channel = Self {
            instance,
            endpoint,
            settings,
            store,
            bus,
            status,
            cancel,
        };
        (channel, status_rx)
    }

    /// Runs the reconnect loop until the cancellation token fires.
    pub async fn run(self) {
        let instance_id = self.instance.id;
        tracing::info!(%instance_id, endpoint = %self.endpoint, "instance channel started");

        let policy = &self.settings.backoff;
        let mut reconnect = ReconnectState::new(policy);

        loop {
            self.transition(ConnectionState::Connecting, &reconnect);
            let error = match self.connect_and_serve(&mut reconnect).await {
                SessionEnd::Cancelled => break,
                SessionEnd::Failed(error) => error,
            };

            let delay = reconnect.on_failure(policy);
            if reconnect.failures() == 1 {
                tracing::warn!(
                    %instance_id,
                    error = %error,
                    backoff_secs = delay.as_secs_f64(),
                    "management connection lost"
                );
            } else {
                tracing::debug!(
                    %instance_id,
                    error = %error,
                    consecutive_failures = reconnect.failures(),
                    backoff_secs = delay.as_secs_f64(),
                    "management connection attempt failed"
                );
            }
            self.transition(ConnectionState::Disconnected, &reconnect);

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.transition(ConnectionState::Disconnected, &reconnect);
        tracing::info!(%instance_id, "instance channel stopped");
    }

    /// Connects, seeds the status, and serves notifications until failure
    /// or cancellation.
    async fn connect_and_serve(&self, reconnect: &mut ReconnectState) -> SessionEnd {
        let opened = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return SessionEnd::Cancelled,
            opened = ManagementConnection::open(
                &self.endpoint,
                &self.instance.management_secret,
                self.settings.request_timeout,
            ) => opened,
        };
        let mut connection = match opened {
            Ok(connection) => connection,
            Err(e) => return SessionEnd::Failed(e),
        };

        reconnect.on_connected(&self.settings.backoff);
        self.transition(ConnectionState::Connected, reconnect);
        tracing::info!(instance_id = %self.instance.id, "connected to management server");

        match self.serve(&mut connection).await {
            Ok(()) => SessionEnd::Cancelled,
            Err(end) => end,
        }
    }

    /// Returns `Ok(())` once cancelled; every other exit is an error.
    async fn serve(&self, connection: &mut ManagementConnection) -> Result<(), SessionEnd> {
        let instance_id = self.instance.id;
        self.refresh_players(connection).await?;
        self.seed_bans(connection).await?;

        loop {
            let notification = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(()),
                notification = connection.next_notification() => notification?,
            };
            match notification {
                Notification::PlayersJoined | Notification::PlayersLeft => {
                    self.refresh_players(connection).await?;
                }
                Notification::BansAdded | Notification::BansRemoved => {
                    self.refresh_bans(connection).await?;
                }
                Notification::ServerSaving => {
                    tracing::info!(%instance_id, "server save started");
                }
                Notification::ServerSaved => {
                    tracing::info!(%instance_id, "server save completed");
                }
                Notification::ServerStarted => {
                    tracing::info!(%instance_id, "server started");
                }
                Notification::ServerStopping => {
                    tracing::info!(%instance_id, "server stopping");
                }
                Notification::Unrecognized(method) => {
                    tracing::trace!(%instance_id, %method, "ignoring notification");
                }
            }
        }
    }

    async fn refresh_players(
        &self,
        connection: &mut ManagementConnection,
    ) -> Result<(), ChannelError> {
        let result = connection.request(PLAYERS_QUERY).await?;
        let players: Vec<Player> = serde_json::from_value(result)
            .map_err(|e| ChannelError::Protocol(format!("invalid players payload: {e}")))?;

        tracing::debug!(
            instance_id = %self.instance.id,
            players = ?players.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            "players list updated"
        );
        self.store.set_players(self.instance.id, players.clone()).await;
        self.bus
            .publish(DomainEvent::players_changed(self.instance.id, players));
        Ok(())
    }

    async fn refresh_bans(&self, connection: &mut ManagementConnection) -> Result<(), ChannelError> {
        let result = connection.request(BANS_QUERY).await?;
        let bans: Vec<PlayerBan> = serde_json::from_value(result)
            .map_err(|e| ChannelError::Protocol(format!("invalid bans payload: {e}")))?;

        tracing::debug!(instance_id = %self.instance.id, count = bans.len(), "ban list updated");
        self.store.set_bans(self.instance.id, bans.clone()).await;
        self.bus
            .publish(DomainEvent::ban_list_changed(self.instance.id, bans));
        Ok(())
    }

    /// Initial ban query. Servers without ban support answer with an error,
    /// which leaves the ban list unknown instead of dropping the session.
    async fn seed_bans(&self, connection: &mut ManagementConnection) -> Result<(), ChannelError> {
        match self.refresh_bans(connection).await {
            Err(ChannelError::Remote { message, .. }) => {
                tracing::warn!(instance_id = %self.instance.id, %message, "ban list unavailable");
                Ok(())
            }
            other => other,
        }
    }

    fn transition(&self, state: ConnectionState, reconnect: &ReconnectState) {
        self.status.send_replace(ChannelStatus {
            state,
            consecutive_failures: reconnect.failures(),
            current_backoff: reconnect.backoff(),
        });
    }
}

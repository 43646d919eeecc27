//! Domain events describing fleet changes.
//!
//! Every observable change is emitted as a [`DomainEvent`] through the
//! [`super::EventBus`]. Producers are the instance channels (player and ban
//! updates) and the external lifecycle layer (created, updated, deleted).
//! The union is closed: observers never see a free-form payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{InstanceId, Player, PlayerBan, ViewerId};

/// Discriminator of a [`DomainEvent`], used for logging and metrics fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// [`DomainEvent::Created`].
    Created,
    /// [`DomainEvent::Updated`].
    Updated,
    /// [`DomainEvent::Deleted`].
    Deleted,
    /// [`DomainEvent::PlayersChanged`].
    PlayersChanged,
    /// [`DomainEvent::BanListChanged`].
    BanListChanged,
}

impl EventKind {
    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::PlayersChanged => "players_changed",
            Self::BanListChanged => "ban_list_changed",
        }
    }
}

/// Domain event fanned out to every observer.
///
/// `affected_observers` lists viewers whose permissions were changed by
/// the operation that produced the event. Those viewers must reload their
/// authorization before the event is filtered for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// An instance was created.
    Created {
        /// Instance identifier.
        instance_id: InstanceId,
        /// Viewers whose roles changed with the creation.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        affected_observers: Option<Vec<ViewerId>>,
        /// Event timestamp.
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// An instance (or, without an id, the whole fleet) was reconfigured.
    Updated {
        /// Instance identifier; `None` for fleet-wide changes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_id: Option<InstanceId>,
        /// Viewers whose roles changed with the update.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        affected_observers: Option<Vec<ViewerId>>,
        /// Event timestamp.
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// An instance was removed.
    Deleted {
        /// Instance identifier.
        instance_id: InstanceId,
        /// Viewers who lost their role with the deletion.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        affected_observers: Option<Vec<ViewerId>>,
        /// Event timestamp.
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// The connected player list of an instance changed.
    PlayersChanged {
        /// Instance identifier.
        instance_id: InstanceId,
        /// Full player list after the change.
        players: Vec<Player>,
        /// Event timestamp.
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// The ban list of an instance changed.
    BanListChanged {
        /// Instance identifier.
        instance_id: InstanceId,
        /// Full ban list after the change.
        bans: Vec<PlayerBan>,
        /// Event timestamp.
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Builds a [`DomainEvent::PlayersChanged`] stamped now.
    #[must_use]
    pub fn players_changed(instance_id: InstanceId, players: Vec<Player>) -> Self {
        Self::PlayersChanged {
            instance_id,
            players,
            timestamp: Utc::now(),
        }
    }

    /// Builds a [`DomainEvent::BanListChanged`] stamped now.
    #[must_use]
    pub fn ban_list_changed(instance_id: InstanceId, bans: Vec<PlayerBan>) -> Self {
        Self::BanListChanged {
            instance_id,
            bans,
            timestamp: Utc::now(),
        }
    }

    /// Returns the instance this event concerns, or `None` for fleet-wide events.
    #[must_use]
    pub fn instance_id(&self) -> Option<InstanceId> {
        match self {
            Self::Created { instance_id, .. }
            | Self::Deleted { instance_id, .. }
            | Self::PlayersChanged { instance_id, .. }
            | Self::BanListChanged { instance_id, .. } => Some(*instance_id),
            Self::Updated { instance_id, .. } => *instance_id,
        }
    }

    /// Returns the viewers listed as affected by this event.
    #[must_use]
    pub fn affected_observers(&self) -> &[ViewerId] {
        match self {
            Self::Created {
                affected_observers, ..
            }
            | Self::Updated {
                affected_observers, ..
            }
            | Self::Deleted {
                affected_observers, ..
            } => affected_observers.as_deref().unwrap_or_default(),
            Self::PlayersChanged { .. } | Self::BanListChanged { .. } => &[],
        }
    }

    /// Returns `true` if `viewer` is listed as affected.
    #[must_use]
    pub fn affects(&self, viewer: ViewerId) -> bool {
        self.affected_observers().contains(&viewer)
    }

    /// Returns the event discriminator.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Created { .. } => EventKind::Created,
            Self::Updated { .. } => EventKind::Updated,
            Self::Deleted { .. } => EventKind::Deleted,
            Self::PlayersChanged { .. } => EventKind::PlayersChanged,
            Self::BanListChanged { .. } => EventKind::BanListChanged,
        }
    }
}

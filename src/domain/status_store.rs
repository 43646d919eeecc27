//! Live status cache for every instance the gateway has heard from.
//!
//! [`StatusStore`] keeps one [`InstanceStatus`] per instance behind an
//! `Arc`. Writers build a new status and swap the pointer, so readers
//! always hold an immutable snapshot and never observe a half-applied
//! update.
//!
//! Both fields are written only by the instance's channel. Entries
//! survive untracking until [`StatusStore::invalidate`] is called, and
//! every field distinguishes "never reported" (`None`) from "reported
//! empty".

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::InstanceId;

/// A player currently connected to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Player {
    /// Player UUID as reported by the server.
    pub id: String,
    /// Player display name.
    pub name: String,
}

/// An entry of an instance's ban list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerBan {
    /// The banned player.
    pub player: Player,
    /// Free-form ban reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Who issued the ban.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Expiry timestamp as reported by the server; `None` means permanent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

/// Immutable snapshot of one instance's live status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceStatus {
    /// Connected players, `None` until first reported.
    pub players: Option<Vec<Player>>,
    /// Ban list, `None` until first reported.
    pub bans: Option<Vec<PlayerBan>>,
}

/// Addressable fields of an [`InstanceStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusKey {
    /// [`InstanceStatus::players`].
    Players,
    /// [`InstanceStatus::bans`].
    Bans,
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Players => f.write_str("players"),
            Self::Bans => f.write_str("bans"),
        }
    }
}

impl FromStr for StatusKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "players" => Ok(Self::Players),
            "bans" => Ok(Self::Bans),
            other => Err(format!("unknown status key: {other}")),
        }
    }
}

/// Shared cache of [`InstanceStatus`] keyed by [`InstanceId`].
#[derive(Debug, Default)]
pub struct StatusStore {
    entries: RwLock<HashMap<InstanceId, Arc<InstanceStatus>>>,
}

impl StatusStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot for an instance, if anything is known.
    pub async fn snapshot(&self, instance_id: InstanceId) -> Option<Arc<InstanceStatus>> {
        self.entries.read().await.get(&instance_id).cloned()
    }

    /// Returns one field of an instance's status as JSON.
    ///
    /// `None` means the value is unknown, either because the instance was
    /// never seen or because that field was never reported.
    pub async fn get(&self, instance_id: InstanceId, key: StatusKey) -> Option<serde_json::Value> {
        let status = self.snapshot(instance_id).await?;
        let value = match key {
            StatusKey::Players => serde_json::to_value(status.players.as_ref()?),
            StatusKey::Bans => serde_json::to_value(status.bans.as_ref()?),
        };
        value.ok()
    }

    /// Replaces the player list of an instance.
    pub(crate) async fn set_players(&self, instance_id: InstanceId, players: Vec<Player>) {
        self.update(instance_id, |status| status.players = Some(players))
            .await;
    }

    /// Replaces the ban list of an instance.
    pub(crate) async fn set_bans(&self, instance_id: InstanceId, bans: Vec<PlayerBan>) {
        self.update(instance_id, |status| status.bans = Some(bans))
            .await;
    }

    /// Drops everything known about an instance.
    ///
    /// Returns `true` if an entry existed.
    pub async fn invalidate(&self, instance_id: InstanceId) -> bool {
        self.entries.write().await.remove(&instance_id).is_some()
    }

    /// Returns the number of instances with a cached status.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if no instance has a cached status.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn update(&self, instance_id: InstanceId, apply: impl FnOnce(&mut InstanceStatus)) {
        let mut map = self.entries.write().await;
        let mut next = map
            .get(&instance_id)
            .map(|current| current.as_ref().clone())
            .unwrap_or_default();
        apply(&mut next);
        map.insert(instance_id, Arc::new(next));
    }
}

//! Reference to an externally owned game-server instance.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::InstanceId;

/// Server platform an instance runs, which determines the extensions it
/// can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Loader {
    /// Unmodified server, data packs only.
    Vanilla,
    /// Paper plugin platform.
    Paper,
    /// Fabric mod loader.
    Fabric,
    /// Forge mod loader.
    Forge,
    /// NeoForge mod loader.
    NeoForge,
}

impl Loader {
    /// Returns the loader tag used by the extension registry.
    #[must_use]
    pub const fn registry_tag(&self) -> &'static str {
        match self {
            Self::Vanilla => "datapack",
            Self::Paper => "paper",
            Self::Fabric => "fabric",
            Self::Forge => "forge",
            Self::NeoForge => "neoforge",
        }
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.registry_tag())
    }
}

/// Everything the synchronizer needs to reach one instance.
///
/// The instance itself is owned by the lifecycle layer; this is a
/// read-only reference handed to [`crate::service::FleetSynchronizer::track`].
/// The management secret is rotated whenever the instance is created, so
/// it is passed through explicitly instead of being cached globally.
#[derive(Clone, Serialize, Deserialize)]
pub struct InstanceRef {
    /// Instance identifier.
    pub id: InstanceId,
    /// Bearer secret for the instance's management endpoint.
    pub management_secret: String,
    /// Platform tag of the instance.
    pub loader: Loader,
}

impl InstanceRef {
    /// Creates a new instance reference.
    #[must_use]
    pub fn new(id: InstanceId, management_secret: impl Into<String>, loader: Loader) -> Self {
        Self {
            id,
            management_secret: management_secret.into(),
            loader,
        }
    }
}

impl fmt::Debug for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRef")
            .field("id", &self.id)
            .field("management_secret", &"<redacted>")
            .field("loader", &self.loader)
            .finish()
    }
}

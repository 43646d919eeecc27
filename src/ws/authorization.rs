//! Source of truth for viewer roles.
//!
//! Observer subscriptions cache an [`AuthorizationSnapshot`] and reload it
//! through [`AuthorizationSource`] when an event marks their viewer as
//! affected.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{AuthorizationSnapshot, InstanceId, Role, ViewerId};

/// Failure to load a viewer's roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    /// The viewer does not exist.
    #[error("unknown viewer: {0}")]
    UnknownViewer(ViewerId),
    /// The backing store could not be queried.
    #[error("authorization source unavailable: {0}")]
    Unavailable(String),
}

/// Loads authorization snapshots.
#[async_trait]
pub trait AuthorizationSource: Send + Sync + std::fmt::Debug {
    /// Returns the current roles of `viewer`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError`] if the viewer is unknown or the
    /// source cannot be queried.
    async fn load(&self, viewer: ViewerId) -> Result<AuthorizationSnapshot, AuthorizationError>;
}

/// In-memory [`AuthorizationSource`], written through the HTTP API.
///
/// Viewers are created on their first grant.
#[derive(Debug, Default)]
pub struct MemoryAuthorizationSource {
    viewers: RwLock<HashMap<ViewerId, AuthorizationSnapshot>>,
}

impl MemoryAuthorizationSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `viewer`'s role on `instance_id`; [`Role::None`] removes it.
    pub async fn grant(&self, viewer: ViewerId, instance_id: InstanceId, role: Role) {
        self.viewers
            .write()
            .await
            .entry(viewer)
            .or_default()
            .set_role(instance_id, role);
        tracing::debug!(%viewer, %instance_id, %role, "role granted");
    }

    /// Forgets `viewer` entirely. Returns `true` if it was known.
    pub async fn revoke(&self, viewer: ViewerId) -> bool {
        self.viewers.write().await.remove(&viewer).is_some()
    }
}

#[async_trait]
impl AuthorizationSource for MemoryAuthorizationSource {
    async fn load(&self, viewer: ViewerId) -> Result<AuthorizationSnapshot, AuthorizationError> {
        self.viewers
            .read()
            .await
            .get(&viewer)
            .cloned()
            .ok_or(AuthorizationError::UnknownViewer(viewer))
    }
}

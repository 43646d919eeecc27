//! Per-instance viewer roles and cached authorization snapshots.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::InstanceId;

/// Role a viewer holds on one instance.
///
/// Variants are declared in ascending order of privilege so the derived
/// `Ord` answers "meets or exceeds" questions directly.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// No access.
    #[default]
    None,
    /// May view the instance.
    User,
    /// May moderate players.
    Moderator,
    /// Full control.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        };
        f.write_str(s)
    }
}

/// Error returned when a role name cannot be parsed.
#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "user" => Ok(Self::User),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// A viewer's roles at a point in time, keyed by instance.
///
/// Instances absent from the map resolve to [`Role::None`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationSnapshot {
    roles: HashMap<InstanceId, Role>,
}

impl AuthorizationSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the role held on `instance_id`.
    #[must_use]
    pub fn role_for(&self, instance_id: InstanceId) -> Role {
        self.roles.get(&instance_id).copied().unwrap_or_default()
    }

    /// Sets the role held on `instance_id`. Setting [`Role::None`] removes the entry.
    pub fn set_role(&mut self, instance_id: InstanceId, role: Role) {
        if role == Role::None {
            self.roles.remove(&instance_id);
        } else {
            self.roles.insert(instance_id, role);
        }
    }

    /// Builder-style variant of [`Self::set_role`].
    #[must_use]
    pub fn with_role(mut self, instance_id: InstanceId, role: Role) -> Self {
        self.set_role(instance_id, role);
        self
    }

    /// Number of instances the viewer holds any role on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns `true` if the viewer holds no role anywhere.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl FromIterator<(InstanceId, Role)> for AuthorizationSnapshot {
    fn from_iter<T: IntoIterator<Item = (InstanceId, Role)>>(iter: T) -> Self {
        let mut snapshot = Self::new();
        for (id, role) in iter {
            snapshot.set_role(id, role);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::None < Role::User);
        assert!(Role::User < Role::Moderator);
        assert!(Role::Moderator < Role::Admin);
        assert!(Role::Admin >= Role::User);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Moderator".parse::<Role>().ok(), Some(Role::Moderator));
        assert_eq!("ADMIN".parse::<Role>().ok(), Some(Role::Admin));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn unknown_instance_resolves_to_none() {
        let snapshot = AuthorizationSnapshot::new();
        assert_eq!(snapshot.role_for(InstanceId::new()), Role::None);
    }

    #[test]
    fn setting_none_removes_entry() {
        let id = InstanceId::new();
        let mut snapshot = AuthorizationSnapshot::new().with_role(id, Role::Admin);
        assert_eq!(snapshot.len(), 1);
        snapshot.set_role(id, Role::None);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.role_for(id), Role::None);
    }
}

//! Extension registry collaborator.
//!
//! The registry lists published versions of extension projects together
//! with the loaders and game versions each one supports. It is an external
//! HTTP service; the resolver only sees it through [`ExtensionRegistry`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::version::PublishDates;

/// Filter for [`ExtensionRegistry::project_versions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionQuery {
    /// Project to list versions of.
    pub project_id: String,
    /// Accepted loader tags; empty means any.
    pub loaders: Vec<String>,
    /// Accepted game versions; empty means any.
    pub game_versions: Vec<String>,
}

impl VersionQuery {
    /// Versions of `project_id` for `loader` on `game_version`.
    #[must_use]
    pub fn exact(project_id: &str, loader: &str, game_version: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            loaders: vec![loader.to_string()],
            game_versions: vec![game_version.to_string()],
        }
    }

    /// Versions of `project_id` for `loader`, any game version.
    #[must_use]
    pub fn loader_only(project_id: &str, loader: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            loaders: vec![loader.to_string()],
            game_versions: Vec::new(),
        }
    }
}

/// One published version of an extension project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryVersion {
    /// Version identifier.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Human-readable version number.
    pub version_number: String,
    /// Game versions this version supports.
    pub game_versions: Vec<String>,
    /// Loader tags this version supports.
    pub loaders: Vec<String>,
    /// Publication timestamp.
    pub date_published: DateTime<Utc>,
}

/// A game version known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameVersion {
    /// Version string.
    pub version: String,
    /// Release date.
    pub date: DateTime<Utc>,
}

/// Registry lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The registry could not be reached or answered with a server error.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// The project does not exist.
    #[error("project not found: {0}")]
    NotFound(String),

    /// The registry answered with something unreadable.
    #[error("malformed registry response: {0}")]
    Malformed(String),
}

/// Read access to the extension registry.
#[async_trait]
pub trait ExtensionRegistry: Send + Sync + std::fmt::Debug {
    /// Lists versions matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the lookup fails.
    async fn project_versions(
        &self,
        query: &VersionQuery,
    ) -> Result<Vec<RegistryVersion>, RegistryError>;

    /// Lists every game version with its release date.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the lookup fails.
    async fn game_versions(&self) -> Result<Vec<GameVersion>, RegistryError>;
}

/// Release dates of game versions, indexed for [`PublishDates`] lookups.
#[derive(Debug, Clone, Default)]
pub struct GameVersionCatalog {
    dates: HashMap<String, DateTime<Utc>>,
}

impl GameVersionCatalog {
    /// Number of known versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Returns `true` if no version is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl FromIterator<GameVersion> for GameVersionCatalog {
    fn from_iter<T: IntoIterator<Item = GameVersion>>(iter: T) -> Self {
        Self {
            dates: iter.into_iter().map(|v| (v.version, v.date)).collect(),
        }
    }
}

impl PublishDates for GameVersionCatalog {
    fn published(&self, version: &str) -> Option<DateTime<Utc>> {
        self.dates.get(version).copied()
    }
}

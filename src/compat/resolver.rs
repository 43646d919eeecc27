//! Extension compatibility resolution for game version upgrades.
//!
//! Before an instance moves to a new game version, every installed
//! extension is checked against the registry. The result is one
//! [`CompatibilityVerdict`] per extension plus an aggregate
//! [`UpgradeGate`] that says whether the upgrade can proceed.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use super::registry::{
    ExtensionRegistry, GameVersionCatalog, RegistryError, RegistryVersion, VersionQuery,
};
use super::version::{PublishDates, compare};
use crate::domain::Loader;

/// An extension installed on an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledExtension {
    /// Key the verdict is reported under.
    pub id: String,
    /// Registry project.
    pub project_id: String,
    /// Installed registry version, if it came from the registry.
    pub version_id: Option<String>,
}

/// Classification of one extension against a target game version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// The installed version already supports the target.
    UpToDate,
    /// Other versions support the target.
    UpdateAvailable,
    /// Nothing published supports the target.
    NoCompatibleVersions,
    /// The registry lookup failed.
    Error,
}

/// How candidates were matched to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// The registry matched the target string directly.
    Exact,
    /// Matched through version ordering after a broadened search.
    Degraded,
}

/// Verdict for one extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityVerdict {
    /// Classification.
    pub status: UpdateStatus,
    /// Compatible version ids, most recent first. Empty unless
    /// `status` is [`UpdateStatus::UpdateAvailable`].
    pub candidate_ids: Vec<String>,
    /// Supported game versions of each candidate, index-aligned.
    pub game_versions: Vec<Vec<String>>,
    /// Match confidence.
    pub confidence: Confidence,
    /// Lookup failure, for [`UpdateStatus::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompatibilityVerdict {
    fn without_candidates(status: UpdateStatus, confidence: Confidence) -> Self {
        Self {
            status,
            candidate_ids: Vec::new(),
            game_versions: Vec::new(),
            confidence,
            error: None,
        }
    }

    fn failed(error: &RegistryError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::without_candidates(UpdateStatus::Error, Confidence::Exact)
        }
    }

    /// Returns `true` if this verdict blocks an upgrade.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(
            self.status,
            UpdateStatus::NoCompatibleVersions | UpdateStatus::Error
        )
    }
}

/// Aggregate decision over a set of verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum UpgradeGate {
    /// Every extension is up to date or has an update.
    Safe,
    /// At least one extension has no compatible version or failed to resolve.
    Blocked {
        /// Ids of the blocking extensions, sorted.
        blocking: Vec<String>,
    },
}

/// Folds verdicts into an [`UpgradeGate`].
#[must_use]
pub fn gate(verdicts: &BTreeMap<String, CompatibilityVerdict>) -> UpgradeGate {
    let blocking: Vec<String> = verdicts
        .iter()
        .filter(|(_, verdict)| verdict.is_blocking())
        .map(|(id, _)| id.clone())
        .collect();
    if blocking.is_empty() {
        UpgradeGate::Safe
    } else {
        UpgradeGate::Blocked { blocking }
    }
}

/// Direction of a game version change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeDirection {
    /// Target is newer.
    Upgrade,
    /// Target equals the current version.
    Unchanged,
    /// Target is older.
    Downgrade,
}

/// Result of [`CompatibilityResolver::plan_upgrade`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradePlan {
    /// Current game version.
    pub current: String,
    /// Requested game version.
    pub target: String,
    /// Direction of the change.
    pub direction: UpgradeDirection,
    /// Per-extension verdicts.
    pub verdicts: BTreeMap<String, CompatibilityVerdict>,
    /// Aggregate decision.
    pub gate: UpgradeGate,
}

impl UpgradePlan {
    /// An upgrade is safe when nothing blocks it and it does not go back
    /// in time.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.gate == UpgradeGate::Safe && self.direction != UpgradeDirection::Downgrade
    }
}

/// Upgrade planning failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The two versions cannot be ordered.
    #[error("cannot order game versions {current} and {target}")]
    Incomparable {
        /// Current game version.
        current: String,
        /// Requested game version.
        target: String,
    },
}

/// Resolves installed extensions against a target game version.
#[derive(Debug, Clone)]
pub struct CompatibilityResolver {
    registry: Arc<dyn ExtensionRegistry>,
}

impl CompatibilityResolver {
    /// Creates a resolver backed by `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn ExtensionRegistry>) -> Self {
        Self { registry }
    }

    /// Resolves every extension concurrently.
    ///
    /// A failed lookup only affects the verdict of its own extension.
    pub async fn resolve(
        &self,
        loader: Loader,
        extensions: &[InstalledExtension],
        target: &str,
    ) -> BTreeMap<String, CompatibilityVerdict> {
        self.resolve_with(loader, extensions, target, &GameVersionCatalog::default())
            .await
    }

    /// Checks an upgrade from `current` to `target`.
    ///
    /// Release dates are fetched from the registry so weekly snapshots can
    /// be ordered; if that fails, only structurally comparable versions are
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Incomparable`] if the two versions cannot be
    /// ordered.
    pub async fn plan_upgrade(
        &self,
        loader: Loader,
        current: &str,
        target: &str,
        extensions: &[InstalledExtension],
    ) -> Result<UpgradePlan, ResolveError> {
        let catalog: GameVersionCatalog = match self.registry.game_versions().await {
            Ok(versions) => versions.into_iter().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "game version catalog unavailable");
                GameVersionCatalog::default()
            }
        };

        let direction = match compare(current, target, &catalog) {
            Some(Ordering::Less) => UpgradeDirection::Upgrade,
            Some(Ordering::Equal) => UpgradeDirection::Unchanged,
            Some(Ordering::Greater) => UpgradeDirection::Downgrade,
            None => {
                return Err(ResolveError::Incomparable {
                    current: current.to_string(),
                    target: target.to_string(),
                });
            }
        };

        let verdicts = self.resolve_with(loader, extensions, target, &catalog).await;
        let gate = gate(&verdicts);
        tracing::info!(
            current,
            target,
            ?direction,
            extensions = extensions.len(),
            ?gate,
            "upgrade planned"
        );

        Ok(UpgradePlan {
            current: current.to_string(),
            target: target.to_string(),
            direction,
            verdicts,
            gate,
        })
    }

    async fn resolve_with(
        &self,
        loader: Loader,
        extensions: &[InstalledExtension],
        target: &str,
        dates: &GameVersionCatalog,
    ) -> BTreeMap<String, CompatibilityVerdict> {
        let lookups = extensions.iter().map(|extension| async move {
            let verdict = self.resolve_one(loader, extension, target, dates).await;
            (extension.id.clone(), verdict)
        });
        join_all(lookups).await.into_iter().collect()
    }

    async fn resolve_one(
        &self,
        loader: Loader,
        extension: &InstalledExtension,
        target: &str,
        dates: &GameVersionCatalog,
    ) -> CompatibilityVerdict {
        let tag = loader.registry_tag();
        let (versions, confidence) = match self.lookup(&extension.project_id, tag, target, dates).await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    extension = %extension.id,
                    project_id = %extension.project_id,
                    error = %e,
                    "registry lookup failed"
                );
                return CompatibilityVerdict::failed(&e);
            }
        };

        classify(extension, versions, confidence)
    }

    /// Exact query first; if that finds nothing, every version for the
    /// loader filtered by version ordering.
    async fn lookup(
        &self,
        project_id: &str,
        loader_tag: &str,
        target: &str,
        dates: &GameVersionCatalog,
    ) -> Result<(Vec<RegistryVersion>, Confidence), RegistryError> {
        let exact = self
            .registry
            .project_versions(&VersionQuery::exact(project_id, loader_tag, target))
            .await?;
        if !exact.is_empty() {
            return Ok((exact, Confidence::Exact));
        }

        let broadened = self
            .registry
            .project_versions(&VersionQuery::loader_only(project_id, loader_tag))
            .await?;
        let matching = broadened
            .into_iter()
            .filter(|version| supports(version, target, dates))
            .collect();
        Ok((matching, Confidence::Degraded))
    }
}

fn supports<D: PublishDates + ?Sized>(version: &RegistryVersion, target: &str, dates: &D) -> bool {
    version
        .game_versions
        .iter()
        .any(|supported| compare(supported, target, dates) == Some(Ordering::Equal))
}

fn classify(
    extension: &InstalledExtension,
    mut versions: Vec<RegistryVersion>,
    confidence: Confidence,
) -> CompatibilityVerdict {
    if versions.is_empty() {
        return CompatibilityVerdict::without_candidates(
            UpdateStatus::NoCompatibleVersions,
            confidence,
        );
    }

    let installed = extension.version_id.as_deref();
    if versions.iter().any(|v| Some(v.id.as_str()) == installed) {
        return CompatibilityVerdict::without_candidates(UpdateStatus::UpToDate, confidence);
    }

    versions.sort_by(|a, b| b.date_published.cmp(&a.date_published));
    let (candidate_ids, game_versions): (Vec<String>, Vec<Vec<String>>) = versions
        .into_iter()
        .map(|v| (v.id, v.game_versions))
        .unzip();

    CompatibilityVerdict {
        status: UpdateStatus::UpdateAvailable,
        candidate_ids,
        game_versions,
        confidence,
        error: None,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::compat::registry::GameVersion;

    #[derive(Debug, Default)]
    struct MockRegistry {
        projects: HashMap<String, Vec<RegistryVersion>>,
        failing: Vec<String>,
        catalog: Option<Vec<GameVersion>>,
    }

    impl MockRegistry {
        fn with_project(mut self, project_id: &str, versions: Vec<RegistryVersion>) -> Self {
            self.projects.insert(project_id.to_string(), versions);
            self
        }

        fn with_failing(mut self, project_id: &str) -> Self {
            self.failing.push(project_id.to_string());
            self
        }
    }

    #[async_trait]
    impl ExtensionRegistry for MockRegistry {
        async fn project_versions(
            &self,
            query: &VersionQuery,
        ) -> Result<Vec<RegistryVersion>, RegistryError> {
            if self.failing.contains(&query.project_id) {
                return Err(RegistryError::Unavailable("503".to_string()));
            }
            let versions = self
                .projects
                .get(&query.project_id)
                .ok_or_else(|| RegistryError::NotFound(query.project_id.clone()))?;
            Ok(versions
                .iter()
                .filter(|v| query.loaders.iter().all(|l| v.loaders.contains(l)))
                .filter(|v| query.game_versions.iter().all(|g| v.game_versions.contains(g)))
                .cloned()
                .collect())
        }

        async fn game_versions(&self) -> Result<Vec<GameVersion>, RegistryError> {
            self.catalog
                .clone()
                .ok_or_else(|| RegistryError::Unavailable("offline".to_string()))
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        let Some(date) = Utc.with_ymd_and_hms(2025, 6, d, 0, 0, 0).single() else {
            panic!("valid date");
        };
        date
    }

    fn version(id: &str, project_id: &str, games: &[&str], published: u32) -> RegistryVersion {
        RegistryVersion {
            id: id.to_string(),
            project_id: project_id.to_string(),
            version_number: format!("{id}-v"),
            game_versions: games.iter().map(ToString::to_string).collect(),
            loaders: vec!["fabric".to_string()],
            date_published: day(published),
        }
    }

    fn installed(project_id: &str, version_id: Option<&str>) -> InstalledExtension {
        InstalledExtension {
            id: project_id.to_string(),
            project_id: project_id.to_string(),
            version_id: version_id.map(ToString::to_string),
        }
    }

    fn resolver(registry: MockRegistry) -> CompatibilityResolver {
        CompatibilityResolver::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn installed_compatible_version_is_up_to_date() {
        let registry = MockRegistry::default()
            .with_project("sodium", vec![version("s2", "sodium", &["1.21.8"], 2)]);
        let verdicts = resolver(registry)
            .resolve(Loader::Fabric, &[installed("sodium", Some("s2"))], "1.21.8")
            .await;

        let Some(verdict) = verdicts.get("sodium") else {
            panic!("verdict missing");
        };
        assert_eq!(verdict.status, UpdateStatus::UpToDate);
        assert_eq!(verdict.confidence, Confidence::Exact);
        assert!(verdict.candidate_ids.is_empty());
    }

    #[tokio::test]
    async fn candidates_are_sorted_most_recent_first() {
        let registry = MockRegistry::default().with_project(
            "lithium",
            vec![
                version("old", "lithium", &["1.21.8"], 1),
                version("new", "lithium", &["1.21.8", "1.21.9"], 9),
                version("mid", "lithium", &["1.21.8"], 5),
            ],
        );
        let verdicts = resolver(registry)
            .resolve(Loader::Fabric, &[installed("lithium", Some("ancient"))], "1.21.8")
            .await;

        let Some(verdict) = verdicts.get("lithium") else {
            panic!("verdict missing");
        };
        assert_eq!(verdict.status, UpdateStatus::UpdateAvailable);
        assert_eq!(verdict.candidate_ids, ["new", "mid", "old"]);
        assert_eq!(
            verdict.game_versions.first().map(Vec::len),
            Some(2),
            "game versions stay aligned with candidates"
        );
    }

    #[tokio::test]
    async fn zero_versions_means_no_compatible_versions() {
        let registry = MockRegistry::default().with_project("abandoned", Vec::new());
        let verdicts = resolver(registry)
            .resolve(Loader::Fabric, &[installed("abandoned", None)], "1.21.8")
            .await;

        let Some(verdict) = verdicts.get("abandoned") else {
            panic!("verdict missing");
        };
        assert_eq!(verdict.status, UpdateStatus::NoCompatibleVersions);
        assert!(verdict.is_blocking());
    }

    #[tokio::test]
    async fn broadened_search_matches_equivalent_versions() {
        let registry = MockRegistry::default()
            .with_project("carpet", vec![version("c1", "carpet", &["1.21"], 3)]);
        let verdicts = resolver(registry)
            .resolve(Loader::Fabric, &[installed("carpet", None)], "1.21.0")
            .await;

        let Some(verdict) = verdicts.get("carpet") else {
            panic!("verdict missing");
        };
        assert_eq!(verdict.status, UpdateStatus::UpdateAvailable);
        assert_eq!(verdict.confidence, Confidence::Degraded);
        assert_eq!(verdict.candidate_ids, ["c1"]);
    }

    #[tokio::test]
    async fn loader_mismatch_is_not_compatible() {
        let registry = MockRegistry::default()
            .with_project("sodium", vec![version("s2", "sodium", &["1.21.8"], 2)]);
        let verdicts = resolver(registry)
            .resolve(Loader::Forge, &[installed("sodium", Some("s1"))], "1.21.8")
            .await;
        assert_eq!(
            verdicts.get("sodium").map(|v| v.status),
            Some(UpdateStatus::NoCompatibleVersions)
        );
    }

    #[tokio::test]
    async fn lookup_failure_only_affects_its_extension() {
        let registry = MockRegistry::default()
            .with_project("sodium", vec![version("s2", "sodium", &["1.21.8"], 2)])
            .with_failing("flaky");
        let verdicts = resolver(registry)
            .resolve(
                Loader::Fabric,
                &[installed("sodium", Some("s2")), installed("flaky", Some("f1"))],
                "1.21.8",
            )
            .await;

        assert_eq!(verdicts.len(), 2);
        assert_eq!(
            verdicts.get("sodium").map(|v| v.status),
            Some(UpdateStatus::UpToDate)
        );
        let Some(flaky) = verdicts.get("flaky") else {
            panic!("verdict missing");
        };
        assert_eq!(flaky.status, UpdateStatus::Error);
        assert!(flaky.error.as_deref().is_some_and(|e| e.contains("503")));
    }

    #[test]
    fn gate_lists_blocking_extensions() {
        let ok = CompatibilityVerdict::without_candidates(UpdateStatus::UpToDate, Confidence::Exact);
        let none = CompatibilityVerdict::without_candidates(
            UpdateStatus::NoCompatibleVersions,
            Confidence::Degraded,
        );
        let failed = CompatibilityVerdict::failed(&RegistryError::Unavailable("down".into()));

        let mut verdicts = BTreeMap::new();
        verdicts.insert("a".to_string(), ok);
        assert_eq!(gate(&verdicts), UpgradeGate::Safe);

        verdicts.insert("z".to_string(), failed);
        verdicts.insert("m".to_string(), none);
        assert_eq!(
            gate(&verdicts),
            UpgradeGate::Blocked {
                blocking: vec!["m".to_string(), "z".to_string()]
            }
        );
        assert_eq!(gate(&BTreeMap::new()), UpgradeGate::Safe);
    }

    #[tokio::test]
    async fn plan_rejects_incomparable_versions() {
        let registry = MockRegistry::default();
        let result = resolver(registry)
            .plan_upgrade(Loader::Fabric, "23w45a", "1.21.8", &[])
            .await;
        assert!(matches!(result, Err(ResolveError::Incomparable { .. })));
    }

    #[tokio::test]
    async fn plan_uses_catalog_dates_for_snapshots() {
        let registry = MockRegistry {
            catalog: Some(vec![
                GameVersion {
                    version: "23w45a".to_string(),
                    date: day(1),
                },
                GameVersion {
                    version: "1.20.4".to_string(),
                    date: day(20),
                },
            ]),
            ..MockRegistry::default()
        };
        let Ok(plan) = resolver(registry)
            .plan_upgrade(Loader::Fabric, "23w45a", "1.20.4", &[])
            .await
        else {
            panic!("plan should succeed with dates");
        };
        assert_eq!(plan.direction, UpgradeDirection::Upgrade);
        assert!(plan.is_safe());
    }

    #[tokio::test]
    async fn downgrade_is_never_safe() {
        let registry = MockRegistry::default()
            .with_project("sodium", vec![version("s1", "sodium", &["1.20.1"], 1)]);
        let Ok(plan) = resolver(registry)
            .plan_upgrade(
                Loader::Fabric,
                "1.21.8",
                "1.20.1",
                &[installed("sodium", Some("s1"))],
            )
            .await
        else {
            panic!("versions are comparable");
        };
        assert_eq!(plan.direction, UpgradeDirection::Downgrade);
        assert_eq!(plan.gate, UpgradeGate::Safe);
        assert!(!plan.is_safe());
    }
}

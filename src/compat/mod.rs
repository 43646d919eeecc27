//! Game version ordering and extension compatibility checks.
//!
//! [`version::compare`] orders game versions across both numbering
//! schemes. [`CompatibilityResolver`] uses it, together with an injected
//! [`ExtensionRegistry`], to decide whether an instance's extensions allow
//! a move to another game version.

pub mod registry;
pub mod resolver;
pub mod version;

pub use registry::{
    ExtensionRegistry, GameVersion, GameVersionCatalog, RegistryError, RegistryVersion,
    VersionQuery,
};
pub use resolver::{
    CompatibilityResolver, CompatibilityVerdict, Confidence, InstalledExtension, ResolveError,
    UpdateStatus, UpgradeDirection, UpgradeGate, UpgradePlan, gate,
};
pub use version::{NoPublishDates, ParsedVersion, PublishDates, VersionKind, compare};

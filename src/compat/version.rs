//! Game version parsing and ordering.
//!
//! Two numbering schemes are in use. Legacy versions have major `1`
//! (`1.21`, `1.20.1`, `1.20.1-pre2`, `1.21-rc1`) and weekly snapshots named
//! `23w45a`. Modern versions use a year-based major of `2` or more
//! (`26.1`, `26.1.2`, `26.1-pre-1`, `26.1-rc-2`, `26.1-snapshot-3`).
//!
//! Weekly snapshots carry no base version, so they can only be ordered
//! against anything else by publication date.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

#[allow(clippy::expect_used)]
static WEEKLY_SNAPSHOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})w(\d{2})([a-z])$").expect("weekly snapshot regex is valid")
});

#[allow(clippy::expect_used)]
static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?(?:-(?:(pre|rc)-?(\d*)|(snapshot)-(\d+)))?$")
        .expect("numbered version regex is valid")
});

/// Numbering scheme of a numbered version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Numbering {
    /// `1.x` versions.
    Legacy,
    /// Year-based versions (`26.1` and later).
    Modern,
}

/// Prerelease channel; pre-releases sort before release candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrereleaseChannel {
    /// `-pre`
    Pre,
    /// `-rc`
    Rc,
}

/// Release kind of a numbered version, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionKind {
    /// Modern `-snapshot-N`.
    Snapshot,
    /// `-preN` / `-rcN`.
    Prerelease(PrereleaseChannel),
    /// Plain release.
    Release,
}

/// A version with an explicit `major.minor[.patch]` base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumberedVersion {
    /// Numbering scheme.
    pub numbering: Numbering,
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component; `0` when absent.
    pub patch: u32,
    /// Release kind.
    pub kind: VersionKind,
    /// Prerelease or snapshot number; `0` for releases.
    pub ordinal: u32,
}

impl NumberedVersion {
    fn sort_key(&self) -> (u32, u32, u32, VersionKind, u32) {
        (self.major, self.minor, self.patch, self.kind, self.ordinal)
    }
}

/// A parsed game version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParsedVersion {
    /// Legacy weekly snapshot, e.g. `23w45a`.
    WeeklySnapshot {
        /// Two-digit year.
        year: u8,
        /// Week of the year.
        week: u8,
        /// Revision letter within the week.
        revision: char,
    },
    /// Any version with a numeric base.
    Numbered(NumberedVersion),
}

impl ParsedVersion {
    /// Returns `true` for releases.
    #[must_use]
    pub fn is_release(&self) -> bool {
        matches!(
            self,
            Self::Numbered(NumberedVersion {
                kind: VersionKind::Release,
                ..
            })
        )
    }
}

/// A string that is not a game version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized game version: {0}")]
pub struct InvalidVersion(pub String);

impl FromStr for ParsedVersion {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidVersion(s.to_string());

        if let Some(caps) = WEEKLY_SNAPSHOT_RE.captures(s) {
            let year = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let week = caps.get(2).and_then(|m| m.as_str().parse().ok());
            let revision = caps.get(3).and_then(|m| m.as_str().chars().next());
            return match (year, week, revision) {
                (Some(year), Some(week), Some(revision)) => Ok(Self::WeeklySnapshot {
                    year,
                    week,
                    revision,
                }),
                _ => Err(invalid()),
            };
        }

        let caps = NUMBERED_RE.captures(s).ok_or_else(invalid)?;
        let number = |i: usize| -> Result<u32, InvalidVersion> {
            match caps.get(i).map(|m| m.as_str()) {
                None | Some("") => Ok(0),
                Some(digits) => digits.parse().map_err(|_| invalid()),
            }
        };

        let major = number(1)?;
        let minor = number(2)?;
        let patch = number(3)?;
        let numbering = match major {
            0 => return Err(invalid()),
            1 => Numbering::Legacy,
            _ => Numbering::Modern,
        };

        let (kind, ordinal) = if let Some(channel) = caps.get(4) {
            let channel = match channel.as_str() {
                "pre" => PrereleaseChannel::Pre,
                _ => PrereleaseChannel::Rc,
            };
            (VersionKind::Prerelease(channel), number(5)?)
        } else if caps.get(6).is_some() {
            if numbering == Numbering::Legacy {
                return Err(invalid());
            }
            (VersionKind::Snapshot, number(7)?)
        } else {
            (VersionKind::Release, 0)
        };

        Ok(Self::Numbered(NumberedVersion {
            numbering,
            major,
            minor,
            patch,
            kind,
            ordinal,
        }))
    }
}

/// Source of publication dates for versions that cannot be ordered
/// structurally.
pub trait PublishDates {
    /// Returns when `version` was published, if known.
    fn published(&self, version: &str) -> Option<DateTime<Utc>>;
}

impl PublishDates for HashMap<String, DateTime<Utc>> {
    fn published(&self, version: &str) -> Option<DateTime<Utc>> {
        self.get(version).copied()
    }
}

/// A [`PublishDates`] that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPublishDates;

impl PublishDates for NoPublishDates {
    fn published(&self, _version: &str) -> Option<DateTime<Utc>> {
        None
    }
}

/// Orders two game versions.
///
/// Returns `None` when the versions are incomparable: either string is
/// not a game version, or a weekly snapshot is involved and a publication
/// date is missing. Identical strings are always `Equal`.
pub fn compare<D>(a: &str, b: &str, dates: &D) -> Option<Ordering>
where
    D: PublishDates + ?Sized,
{
    if a == b {
        return Some(Ordering::Equal);
    }
    let left: ParsedVersion = a.parse().ok()?;
    let right: ParsedVersion = b.parse().ok()?;

    match (left, right) {
        (ParsedVersion::Numbered(l), ParsedVersion::Numbered(r)) => {
            Some(l.sort_key().cmp(&r.sort_key()))
        }
        _ => {
            let published_a = dates.published(a)?;
            let published_b = dates.published(b)?;
            Some(published_a.cmp(&published_b))
        }
    }
}

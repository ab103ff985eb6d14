//! Semantic versions and the update-eligibility decision.

use crate::error::{Result, UpdateError};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A semantic version (`major.minor.patch[-pre][+build]`).
///
/// Accepts an optional leading `v` and missing minor/patch components
/// (`v1.2` is `1.2.0`). Ordering and equality follow semver precedence, so
/// build metadata is ignored: `1.0.0+a == 1.0.0+b`.
#[derive(Debug, Clone)]
pub struct Version(semver::Version);

impl Version {
    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidVersion`] if the string is not a
    /// semantic version.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = normalize(input);
        semver::Version::parse(&normalized)
            .map(Self)
            .map_err(|e| UpdateError::InvalidVersion {
                input: input.to_owned(),
                reason: e.to_string(),
            })
    }

    /// Major component.
    pub fn major(&self) -> u64 {
        self.0.major
    }

    /// Minor component.
    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    /// Patch component.
    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Returns `true` if the version carries a pre-release tag.
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// The underlying [`semver::Version`].
    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }
}

/// Strip a leading `v` and pad `1` / `1.2` to three numeric components.
fn normalize(input: &str) -> String {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split);
    let parts = core.split('.').count();
    if core.is_empty() || parts >= 3 {
        return trimmed.to_owned();
    }
    let padding = ".0".repeat(3 - parts);
    format!("{core}{padding}{rest}")
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.0.major, self.0.minor, self.0.patch, &self.0.pre).cmp(&(
            other.0.major,
            other.0.minor,
            other.0.patch,
            &other.0.pre,
        ))
    }
}

impl FromStr for Version {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decide whether `current` should be updated to `latest`.
///
/// Only equality is checked: a `current` newer than `latest` still reports
/// `Ok(true)` so that a rollback-capable caller can downgrade.
///
/// # Errors
///
/// Returns [`UpdateError::AtLatestVersion`] when both versions are equal.
pub fn can_update(current: &Version, latest: &Version) -> Result<bool> {
    if current == latest {
        return Err(UpdateError::AtLatestVersion {
            version: latest.to_string(),
        });
    }
    Ok(true)
}

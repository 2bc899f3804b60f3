//! Version restriction matching for the installed build.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

lazy_static! {
    static ref VERSION_PATTERN: Regex = Regex::new(
        r"^(\d+)\.(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-([A-Za-z][A-Za-z0-9_-]*))?$"
    )
    .unwrap();
}

/// Version of the installed build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersion {
    /// Major version component
    pub major: u32,
    /// Minor version component
    pub minor: u32,
    /// Patch version component (0 if absent from the version string)
    pub patch: u32,
    /// Build number, if the build reports one
    pub build: Option<u32>,
    /// Edition the build reports, if any
    pub edition: Option<String>,
}

impl AppVersion {
    /// Parse a version string such as `3.5.1`, `3.5.1.2468` or `3.5.1-alliance`.
    pub fn parse(input: &str) -> Result<Self> {
        let captures = VERSION_PATTERN
            .captures(input.trim())
            .ok_or_else(|| Error::InvalidVersion(input.to_string()))?;

        let component = |idx: usize| -> Option<u32> {
            captures.get(idx).and_then(|m| m.as_str().parse().ok())
        };

        Ok(Self {
            major: component(1).ok_or_else(|| Error::InvalidVersion(input.to_string()))?,
            minor: component(2).ok_or_else(|| Error::InvalidVersion(input.to_string()))?,
            patch: component(3).unwrap_or(0),
            build: component(4),
            edition: captures.get(5).map(|m| m.as_str().to_string()),
        })
    }
}

impl std::fmt::Display for AppVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
        }
        if let Some(edition) = &self.edition {
            write!(f, "-{edition}")?;
        }
        Ok(())
    }
}

/// A single version restriction from the settings tree.
///
/// A restriction is either an exact match (major, minor and optionally
/// patch/build must equal) or a minimum bound (each component must be >= the
/// restriction's, short-circuiting at the first unequal, more-significant
/// component).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionRestriction {
    /// Required major component
    pub major: u32,
    /// Required minor component
    pub minor: u32,
    /// Required patch component (None = any)
    pub patch: Option<u32>,
    /// Required build number (None = any)
    pub build: Option<u32>,
    /// Interpret the restriction as a minimum bound instead of an exact match
    pub is_minimum: bool,
    /// Edition the build must additionally report
    pub required_edition: Option<String>,
}

impl Default for VersionRestriction {
    fn default() -> Self {
        Self {
            major: 0,
            minor: 0,
            patch: None,
            build: None,
            is_minimum: false,
            required_edition: None,
        }
    }
}

impl VersionRestriction {
    /// Create a minimum-bound restriction on `major.minor.patch`.
    pub fn minimum(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch: Some(patch),
            is_minimum: true,
            ..Self::default()
        }
    }

    /// Create an exact-match restriction on `major.minor`.
    pub fn exact(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            ..Self::default()
        }
    }

    /// Whether the installed version satisfies this restriction.
    pub fn is_satisfied_by(&self, version: &AppVersion) -> bool {
        if let Some(edition) = &self.required_edition {
            if version.edition.as_deref() != Some(edition.as_str()) {
                return false;
            }
        }

        if self.is_minimum {
            self.matches_minimum(version)
        } else {
            self.matches_exactly(version)
        }
    }

    fn matches_exactly(&self, version: &AppVersion) -> bool {
        if version.major != self.major || version.minor != self.minor {
            return false;
        }
        if let Some(patch) = self.patch {
            if version.patch != patch {
                return false;
            }
        }
        if let Some(build) = self.build {
            if version.build != Some(build) {
                return false;
            }
        }
        true
    }

    fn matches_minimum(&self, version: &AppVersion) -> bool {
        if version.major != self.major {
            return version.major > self.major;
        }
        if version.minor != self.minor {
            return version.minor > self.minor;
        }
        if let Some(patch) = self.patch {
            if version.patch != patch {
                return version.patch > patch;
            }
        }
        if let Some(build) = self.build {
            let installed = version.build.unwrap_or(0);
            if installed != build {
                return installed > build;
            }
        }
        true
    }
}

/// Whether the installed version satisfies at least one restriction.
///
/// An empty restriction list places no constraint on the build.
pub fn satisfies_any(restrictions: &[VersionRestriction], version: &AppVersion) -> bool {
    restrictions.is_empty() || restrictions.iter().any(|r| r.is_satisfied_by(version))
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// A minimum bound on major.minor.patch behaves exactly like
        /// lexicographic tuple ordering.
        #[test]
        fn minimum_bound_matches_tuple_ordering(
            v in (0u32..20, 0u32..20, 0u32..20),
            r in (0u32..20, 0u32..20, 0u32..20),
        ) {
            let restriction = VersionRestriction::minimum(r.0, r.1, r.2);
            let version = AppVersion {
                major: v.0,
                minor: v.1,
                patch: v.2,
                build: None,
                edition: None,
            };
            prop_assert_eq!(restriction.is_satisfied_by(&version), v >= r);
        }

        /// Parsing never panics on arbitrary input.
        #[test]
        fn parse_never_panics(input in "\\PC*") {
            let _ = AppVersion::parse(&input);
        }

        /// Display output of a parsed version parses back to the same value.
        #[test]
        fn display_round_trips(
            major in 0u32..100,
            minor in 0u32..100,
            patch in 0u32..100,
        ) {
            let version = AppVersion { major, minor, patch, build: None, edition: None };
            let back = AppVersion::parse(&version.to_string()).unwrap();
            prop_assert_eq!(back, version);
        }
    }
}

//! Base versions, release numbers, and the ordered build identifier.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("base version must not be empty")]
    EmptyBase,
    #[error("invalid base version '{0}': allowed characters are [A-Za-z0-9._+~]")]
    InvalidBase(String),
    #[error("invalid release number '{0}': expected an integer >= 1")]
    InvalidRelease(String),
    #[error("invalid build identifier '{0}': expected '<base>-<release>'")]
    InvalidIdentifier(String),
}

/// Fixed upstream version of the package, e.g. `1.0`.
///
/// Never contains `-`, which separates base and release in artifact file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseVersion(String);

impl BaseVersion {
    pub fn new(s: impl Into<String>) -> Result<Self, VersionError> {
        let s = s.into();
        if s.is_empty() {
            return Err(VersionError::EmptyBase);
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'+' | b'~'))
        {
            return Err(VersionError::InvalidBase(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for BaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.0.split('.');
        let mut right = other.0.split('.');
        loop {
            match (left.next(), right.next()) {
                (None, None) => return self.0.cmp(&other.0),
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => {
                    let ord = match (a.parse::<u64>(), b.parse::<u64>()) {
                        (Ok(x), Ok(y)) => x.cmp(&y),
                        _ => a.cmp(b),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }
    }
}

impl PartialOrd for BaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BaseVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for BaseVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BaseVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// One immutable build: `(base version, release)`, ordered by base then release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildIdentifier {
    pub base: BaseVersion,
    pub release: u32,
}

impl BuildIdentifier {
    pub fn new(base: BaseVersion, release: u32) -> Result<Self, VersionError> {
        if release == 0 {
            return Err(VersionError::InvalidRelease(release.to_string()));
        }
        Ok(Self { base, release })
    }

    /// First release of a base version.
    pub fn first(base: BaseVersion) -> Self {
        Self { base, release: 1 }
    }

    /// The identifier directly after this one in the same base sequence.
    pub fn successor(&self) -> Self {
        Self {
            base: self.base.clone(),
            release: self.release.saturating_add(1),
        }
    }
}

impl fmt::Display for BuildIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.release)
    }
}

impl FromStr for BuildIdentifier {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((base, release)) = s.rsplit_once('-') else {
            return Err(VersionError::InvalidIdentifier(s.to_owned()));
        };
        let base = BaseVersion::new(base)?;
        // u32::from_str accepts a leading '+', which would break name round-trips.
        if release.is_empty() || !release.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VersionError::InvalidRelease(release.to_owned()));
        }
        let release: u32 = release
            .parse()
            .map_err(|_| VersionError::InvalidRelease(release.to_owned()))?;
        Self::new(base, release)
    }
}

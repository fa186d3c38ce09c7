//! NuGet package versions.
//!
//! NuGet versions are semver 2.0 with an optional fourth numeric part
//! (`Major.Minor.Patch.Revision`). Install folders and lock files use the
//! normalized form, which drops build metadata and a zero revision.

use super::error::PkgError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A parsed NuGet version.
///
/// Equality, hashing and ordering ignore build metadata and compare release
/// labels case-insensitively. The original label casing is kept so callers
/// can tell two spellings of the same version apart.
#[derive(Debug, Clone)]
pub struct NuGetVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    release_labels: Vec<String>,
    metadata: Option<String>,
    original: String,
}

impl NuGetVersion {
    /// Create a release version from its numeric parts.
    #[must_use]
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        let original = format!("{major}.{minor}.{patch}");
        Self {
            major,
            minor,
            patch,
            revision: 0,
            release_labels: Vec::new(),
            metadata: None,
            original,
        }
    }

    /// Parse a version string.
    ///
    /// Accepts one to four numeric parts, an optional `-` followed by
    /// dot-separated release labels, and optional `+` build metadata.
    ///
    /// # Errors
    /// Returns `PKG_VERSION_INVALID` if the string is not a valid version.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PkgError::version_invalid(input));
        }

        let (rest, metadata) = match trimmed.split_once('+') {
            Some((rest, meta)) => {
                if meta.is_empty() || !meta.split('.').all(is_valid_label) {
                    return Err(PkgError::version_invalid(input));
                }
                (rest, Some(meta.to_string()))
            }
            None => (trimmed, None),
        };

        let (numbers, labels) = match rest.split_once('-') {
            Some((numbers, labels)) => (numbers, Some(labels)),
            None => (rest, None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(PkgError::version_invalid(input));
        }
        let mut values = [0u64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PkgError::version_invalid(input));
            }
            *slot = part
                .parse()
                .map_err(|_| PkgError::version_invalid(input))?;
        }

        let release_labels = match labels {
            Some(labels) => {
                let split: Vec<String> = labels.split('.').map(str::to_string).collect();
                if !split.iter().all(|l| is_valid_label(l)) {
                    return Err(PkgError::version_invalid(input));
                }
                split
            }
            None => Vec::new(),
        };

        Ok(Self {
            major: values[0],
            minor: values[1],
            patch: values[2],
            revision: values[3],
            release_labels,
            metadata,
            original: trimmed.to_string(),
        })
    }

    #[must_use]
    pub fn major(&self) -> u64 {
        self.major
    }

    #[must_use]
    pub fn minor(&self) -> u64 {
        self.minor
    }

    #[must_use]
    pub fn patch(&self) -> u64 {
        self.patch
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Release labels with their original casing.
    #[must_use]
    pub fn release_labels(&self) -> &[String] {
        &self.release_labels
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// The string this version was parsed from.
    #[must_use]
    pub fn original_string(&self) -> &str {
        &self.original
    }

    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.release_labels.is_empty()
    }

    /// `Major.Minor.Patch[.Revision][-labels]`, with the revision only when non-zero.
    #[must_use]
    pub fn to_normalized_string(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if self.revision > 0 {
            out.push('.');
            out.push_str(&self.revision.to_string());
        }
        if self.is_prerelease() {
            out.push('-');
            out.push_str(&self.release_labels.join("."));
        }
        out
    }

    /// True when both versions are equal and their release labels are spelled
    /// with identical casing.
    #[must_use]
    pub fn same_casing(&self, other: &Self) -> bool {
        self == other && self.release_labels == other.release_labels
    }
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn compare_labels(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        // A release sorts after any of its prereleases.
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    for (x, y) in a.iter().zip(b) {
        let ord = compare_label(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_label(a: &str, b: &str) -> Ordering {
    let a_num = a.parse::<u64>().ok().filter(|_| a.bytes().all(|c| c.is_ascii_digit()));
    let b_num = b.parse::<u64>().ok().filter(|_| b.bytes().all(|c| c.is_ascii_digit()));
    match (a_num, b_num) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a
            .to_ascii_lowercase()
            .cmp(&b.to_ascii_lowercase()),
    }
}

impl PartialEq for NuGetVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NuGetVersion {}

impl PartialOrd for NuGetVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NuGetVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then(self.revision.cmp(&other.revision))
            .then_with(|| compare_labels(&self.release_labels, &other.release_labels))
    }
}

impl Hash for NuGetVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.revision.hash(state);
        for label in &self.release_labels {
            label.to_ascii_lowercase().hash(state);
        }
    }
}

impl fmt::Display for NuGetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_normalized_string())
    }
}

impl FromStr for NuGetVersion {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;

    fn v(s: &str) -> NuGetVersion {
        NuGetVersion::parse(s).unwrap()
    }

    #[test]
    fn test_parse_parts() {
        let ver = v("1.2.3.4-beta.1+abc");
        assert_eq!(
            (ver.major(), ver.minor(), ver.patch(), ver.revision()),
            (1, 2, 3, 4)
        );
        assert_eq!(ver.release_labels(), ["beta", "1"]);
        assert_eq!(ver.metadata(), Some("abc"));
        assert!(ver.is_prerelease());
    }

    #[test]
    fn test_parse_short_forms() {
        assert_eq!(v("1").to_normalized_string(), "1.0.0");
        assert_eq!(v("1.2").to_normalized_string(), "1.2.0");
        assert_eq!(v("01.02.03").to_normalized_string(), "1.2.3");
    }

    #[test]
    fn test_parse_invalid() {
        for input in ["", "a.b.c", "1.2.3.4.5", "1..2", "1.0.0-", "1.0.0-beta..1", "1.0.0+"] {
            let err = NuGetVersion::parse(input).unwrap_err();
            assert_eq!(err.code(), codes::PKG_VERSION_INVALID, "input {input:?}");
        }
    }

    #[test]
    fn test_normalized_string_drops_zero_revision_and_metadata() {
        assert_eq!(v("1.0.0.0").to_normalized_string(), "1.0.0");
        assert_eq!(v("1.0.0.5").to_normalized_string(), "1.0.0.5");
        assert_eq!(v("1.0.0-RC.1+sha.1").to_normalized_string(), "1.0.0-RC.1");
        assert_eq!(v("2.0.0+build").to_string(), "2.0.0");
    }

    #[test]
    fn test_equality_ignores_metadata_and_label_case() {
        assert_eq!(v("1.0.0+a"), v("1.0.0+b"));
        assert_eq!(v("1.0.0-Beta"), v("1.0.0-beta"));
        assert_eq!(v("1.0"), v("1.0.0.0"));
    }

    #[test]
    fn test_same_casing() {
        assert!(v("1.0.0-beta").same_casing(&v("1.0.0-beta")));
        assert!(!v("1.0.0-Beta").same_casing(&v("1.0.0-beta")));
        assert!(!v("1.0.0-beta").same_casing(&v("1.0.1-beta")));
    }

    #[test]
    fn test_ordering() {
        let mut versions = vec![
            v("1.0.0"),
            v("1.0.0-beta.11"),
            v("1.0.0-alpha"),
            v("1.0.0-beta.2"),
            v("1.0.0-1"),
            v("0.9.9.9"),
            v("1.0.0.1"),
        ];
        versions.sort();
        let rendered: Vec<String> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            [
                "0.9.9.9",
                "1.0.0-1",
                "1.0.0-alpha",
                "1.0.0-beta.2",
                "1.0.0-beta.11",
                "1.0.0",
                "1.0.0.1"
            ]
        );
    }

    #[test]
    fn test_longer_label_list_sorts_later() {
        assert!(v("1.0.0-beta") < v("1.0.0-beta.1"));
    }

    #[test]
    fn test_hash_consistent_with_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(v("1.0.0-RC"));
        assert!(set.contains(&v("1.0.0-rc+meta")));
    }

    #[test]
    fn test_from_str() {
        let ver: NuGetVersion = "3.1.4".parse().unwrap();
        assert_eq!(ver, NuGetVersion::new(3, 1, 4));
        assert_eq!(ver.original_string(), "3.1.4");
    }
}

//! `packages.lock.json` model.
//!
//! The lock file pins every resolved dependency per target framework (and
//! optionally runtime identifier) so that restores are repeatable.
//!
//! ## File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "dependencies": {
//!     "net8.0": {
//!       "Contoso.Utility": {
//!         "type": "Direct",
//!         "requested": "[1.0.0, )",
//!         "resolved": "1.0.0",
//!         "contentHash": "abc==",
//!         "dependencies": { "Newtonsoft.Json": "13.0.1" }
//!       }
//!     },
//!     "net8.0/win-x64": { }
//!   }
//! }
//! ```
//!
//! Nested dependencies are written as plain version strings. Reading also
//! accepts the `{ "version": "..." }` object form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Lock file format version written by this crate.
pub const PACKAGES_LOCK_FILE_VERSION: i32 = 1;

/// Version assigned to a lock file that could not be read.
pub const INVALID_LOCK_FILE_VERSION: i32 = i32::MIN;

/// Default lock file name.
pub const PACKAGES_LOCK_FILE_NAME: &str = "packages.lock.json";

/// Lock file error codes.
pub mod codes {
    /// Lock file not found at the expected path.
    pub const PKG_LOCK_NOT_FOUND: &str = "PKG_LOCK_NOT_FOUND";
    /// Lock file could not be read or has invalid JSON.
    pub const PKG_LOCK_INVALID_JSON: &str = "PKG_LOCK_INVALID_JSON";
    /// A dependency has an unknown `type`.
    pub const PKG_LOCK_INVALID_TYPE: &str = "PKG_LOCK_INVALID_TYPE";
    /// Lock file write failed.
    pub const PKG_LOCK_WRITE_FAILED: &str = "PKG_LOCK_WRITE_FAILED";
}

/// How a dependency entered the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackageDependencyType {
    /// Declared by the project.
    Direct,
    /// Pulled in by another package.
    Transitive,
    /// Another project in the same solution.
    Project,
    /// Transitive, but pinned by central package management.
    CentralTransitive,
}

impl PackageDependencyType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "Direct",
            Self::Transitive => "Transitive",
            Self::Project => "Project",
            Self::CentralTransitive => "CentralTransitive",
        }
    }
}

impl fmt::Display for PackageDependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageDependencyType {
    type Err = LockfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Direct" => Ok(Self::Direct),
            "Transitive" => Ok(Self::Transitive),
            "Project" => Ok(Self::Project),
            "CentralTransitive" => Ok(Self::CentralTransitive),
            other => Err(LockfileError::new(
                codes::PKG_LOCK_INVALID_TYPE,
                format!("Unknown dependency type '{other}'"),
            )),
        }
    }
}

/// A nested dependency reference: an id and the version range it asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageDependency {
    pub id: String,
    pub version_range: String,
}

impl PackageDependency {
    #[must_use]
    pub fn new(id: impl Into<String>, version_range: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version_range: version_range.into(),
        }
    }
}

/// One locked dependency of a target.
///
/// Equality compares ids case-insensitively and ignores the order of nested
/// dependencies.
#[derive(Debug, Clone)]
pub struct LockFileDependency {
    pub id: String,
    pub dependency_type: PackageDependencyType,
    pub requested_version: Option<String>,
    pub resolved_version: Option<String>,
    pub content_hash: Option<String>,
    pub dependencies: Vec<PackageDependency>,
}

impl LockFileDependency {
    #[must_use]
    pub fn new(id: impl Into<String>, dependency_type: PackageDependencyType) -> Self {
        Self {
            id: id.into(),
            dependency_type,
            requested_version: None,
            resolved_version: None,
            content_hash: None,
            dependencies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_requested(mut self, range: impl Into<String>) -> Self {
        self.requested_version = Some(range.into());
        self
    }

    #[must_use]
    pub fn with_resolved(mut self, version: impl Into<String>) -> Self {
        self.resolved_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, id: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependencies.push(PackageDependency::new(id, range));
        self
    }

    /// Equality that ignores `content_hash`.
    #[must_use]
    pub fn eq_ignoring_content_hash(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id)
            && self.dependency_type == other.dependency_type
            && self.requested_version == other.requested_version
            && self.resolved_version == other.resolved_version
            && sorted_dependencies(&self.dependencies) == sorted_dependencies(&other.dependencies)
    }
}

fn sorted_dependencies(deps: &[PackageDependency]) -> Vec<(String, &str)> {
    let mut keyed: Vec<(String, &str)> = deps
        .iter()
        .map(|d| (d.id.to_ascii_lowercase(), d.version_range.as_str()))
        .collect();
    keyed.sort_unstable();
    keyed
}

impl PartialEq for LockFileDependency {
    fn eq(&self, other: &Self) -> bool {
        self.content_hash == other.content_hash && self.eq_ignoring_content_hash(other)
    }
}

impl Eq for LockFileDependency {}

/// The locked dependencies of one framework or framework/RID pair.
#[derive(Debug, Clone, Default)]
pub struct PackagesLockFileTarget {
    /// Short framework name, e.g. `net8.0`.
    pub target_framework: String,
    pub runtime_identifier: Option<String>,
    pub dependencies: Vec<LockFileDependency>,
}

impl PackagesLockFileTarget {
    #[must_use]
    pub fn new(target_framework: impl Into<String>) -> Self {
        Self {
            target_framework: target_framework.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_runtime_identifier(mut self, rid: impl Into<String>) -> Self {
        self.runtime_identifier = Some(rid.into());
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, dependency: LockFileDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// `<framework>` or `<framework>/<rid>`.
    #[must_use]
    pub fn name(&self) -> String {
        match self.runtime_identifier.as_deref() {
            Some(rid) if !rid.is_empty() => format!("{}/{rid}", self.target_framework),
            _ => self.target_framework.clone(),
        }
    }

    fn from_name(name: &str) -> Self {
        match name.split_once('/') {
            Some((framework, rid)) => Self::new(framework).with_runtime_identifier(rid),
            None => Self::new(name),
        }
    }

    fn sorted_dependencies(&self) -> Vec<&LockFileDependency> {
        let mut deps: Vec<&LockFileDependency> = self.dependencies.iter().collect();
        deps.sort_by(|a, b| {
            a.id.to_ascii_lowercase()
                .cmp(&b.id.to_ascii_lowercase())
                .then(a.resolved_version.cmp(&b.resolved_version))
        });
        deps
    }
}

impl PartialEq for PackagesLockFileTarget {
    fn eq(&self, other: &Self) -> bool {
        self.target_framework == other.target_framework
            && self.runtime_identifier == other.runtime_identifier
            && self.sorted_dependencies() == other.sorted_dependencies()
    }
}

impl Eq for PackagesLockFileTarget {}

/// A whole `packages.lock.json`.
///
/// Equality ignores target order.
#[derive(Debug, Clone)]
pub struct PackagesLockFile {
    pub version: i32,
    pub targets: Vec<PackagesLockFileTarget>,
}

impl Default for PackagesLockFile {
    fn default() -> Self {
        Self {
            version: PACKAGES_LOCK_FILE_VERSION,
            targets: Vec::new(),
        }
    }
}

impl PartialEq for PackagesLockFile {
    fn eq(&self, other: &Self) -> bool {
        if self.version != other.version || self.targets.len() != other.targets.len() {
            return false;
        }
        let mut mine: Vec<&PackagesLockFileTarget> = self.targets.iter().collect();
        let mut theirs: Vec<&PackagesLockFileTarget> = other.targets.iter().collect();
        mine.sort_by_key(|t| t.name());
        theirs.sort_by_key(|t| t.name());
        mine == theirs
    }
}

impl Eq for PackagesLockFile {}

#[derive(Serialize, Deserialize)]
struct LockFileJson {
    version: i32,
    #[serde(default)]
    dependencies: BTreeMap<String, BTreeMap<String, DependencyJson>>,
}

#[derive(Serialize, Deserialize)]
struct DependencyJson {
    #[serde(rename = "type")]
    dependency_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    requested: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    resolved: Option<String>,
    #[serde(rename = "contentHash", skip_serializing_if = "Option::is_none", default)]
    content_hash: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    dependencies: BTreeMap<String, NestedDependencyJson>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum NestedDependencyJson {
    Range(String),
    Object { version: String },
}

impl NestedDependencyJson {
    fn into_range(self) -> String {
        match self {
            Self::Range(range) | Self::Object { version: range } => range,
        }
    }
}

impl PackagesLockFile {
    #[must_use]
    pub fn new(version: i32) -> Self {
        Self {
            version,
            targets: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: PackagesLockFileTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// True for the placeholder returned when reading failed.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.version == INVALID_LOCK_FILE_VERSION
    }

    /// Find a target by framework and RID.
    #[must_use]
    pub fn target(&self, framework: &str, rid: Option<&str>) -> Option<&PackagesLockFileTarget> {
        self.targets
            .iter()
            .find(|t| t.target_framework == framework && t.runtime_identifier.as_deref() == rid)
    }

    /// Read a lock file, logging and returning an invalid placeholder on
    /// failure so callers can treat the file as out of date.
    #[must_use]
    pub fn read(path: &Path) -> Self {
        match Self::read_from(path) {
            Ok(lock_file) => lock_file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read lock file");
                Self::new(INVALID_LOCK_FILE_VERSION)
            }
        }
    }

    /// Read a lock file from a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read_from(path: &Path) -> Result<Self, LockfileError> {
        let content = nuget_util::fs::read_to_string_lossy(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                LockfileError::new(
                    codes::PKG_LOCK_NOT_FOUND,
                    format!("Lock file not found: {}", path.display()),
                )
            } else {
                LockfileError::new(
                    codes::PKG_LOCK_INVALID_JSON,
                    format!("Failed to read lock file: {e}"),
                )
            }
        })?;
        Self::from_json(&content)
    }

    /// Write the lock file to a path atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), LockfileError> {
        let content = self.to_json()?;
        nuget_util::fs::atomic_write(path, content.as_bytes()).map_err(|e| {
            LockfileError::new(
                codes::PKG_LOCK_WRITE_FAILED,
                format!("Failed to write lock file: {e}"),
            )
        })
    }

    /// Serialize to indented JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, LockfileError> {
        let mut dependencies = BTreeMap::new();
        for target in &self.targets {
            let entries: &mut BTreeMap<String, DependencyJson> =
                dependencies.entry(target.name()).or_default();
            for dep in &target.dependencies {
                entries.insert(
                    dep.id.clone(),
                    DependencyJson {
                        dependency_type: dep.dependency_type.as_str().to_string(),
                        requested: dep.requested_version.clone(),
                        resolved: dep.resolved_version.clone(),
                        content_hash: dep.content_hash.clone(),
                        dependencies: dep
                            .dependencies
                            .iter()
                            .map(|d| (d.id.clone(), NestedDependencyJson::Range(d.version_range.clone())))
                            .collect(),
                    },
                );
            }
        }

        let json = LockFileJson {
            version: self.version,
            dependencies,
        };
        serde_json::to_string_pretty(&json).map_err(|e| {
            LockfileError::new(
                codes::PKG_LOCK_WRITE_FAILED,
                format!("Failed to serialize lock file: {e}"),
            )
        })
    }

    /// Deserialize from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or a dependency type is unknown.
    pub fn from_json(json: &str) -> Result<Self, LockfileError> {
        let parsed: LockFileJson = serde_json::from_str(json).map_err(|e| {
            LockfileError::new(
                codes::PKG_LOCK_INVALID_JSON,
                format!("Invalid lock file JSON: {e}"),
            )
        })?;

        let mut targets = Vec::with_capacity(parsed.dependencies.len());
        for (name, entries) in parsed.dependencies {
            let mut target = PackagesLockFileTarget::from_name(&name);
            for (id, entry) in entries {
                target.dependencies.push(LockFileDependency {
                    id,
                    dependency_type: entry.dependency_type.parse()?,
                    requested_version: entry.requested,
                    resolved_version: entry.resolved,
                    content_hash: entry.content_hash,
                    dependencies: entry
                        .dependencies
                        .into_iter()
                        .map(|(id, nested)| PackageDependency::new(id, nested.into_range()))
                        .collect(),
                });
            }
            targets.push(target);
        }

        Ok(Self {
            version: parsed.version,
            targets,
        })
    }
}

/// Path of the lock file for a project in `base_dir`.
///
/// Prefers `packages.<project name>.lock.json` (spaces replaced with `_`)
/// when that file exists, otherwise `packages.lock.json`.
#[must_use]
pub fn lock_file_path(base_dir: &Path, project_name: Option<&str>) -> PathBuf {
    if let Some(name) = project_name.filter(|n| !n.is_empty()) {
        let candidate = base_dir.join(format!("packages.{}.lock.json", name.replace(' ', "_")));
        if candidate.is_file() {
            return candidate;
        }
    }
    base_dir.join(PACKAGES_LOCK_FILE_NAME)
}

/// Outcome of comparing a freshly computed lock file with the one on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFileValidity {
    pub is_valid: bool,
    /// `(expected, actual)` pairs that matched, in expected order.
    pub matched_dependencies: Vec<(LockFileDependency, LockFileDependency)>,
}

impl LockFileValidity {
    fn invalid() -> Self {
        Self::default()
    }
}

/// Check that `actual` still locks exactly what `expected` resolves to.
///
/// Content hashes are ignored. Every target must exist once in both files
/// and every dependency must pair up one to one.
#[must_use]
pub fn is_lock_file_still_valid(
    expected: &PackagesLockFile,
    actual: &PackagesLockFile,
) -> LockFileValidity {
    if expected.version != actual.version || expected.targets.len() != actual.targets.len() {
        return LockFileValidity::invalid();
    }

    let mut matched = Vec::new();
    for expected_target in &expected.targets {
        let name = expected_target.name();
        let mut candidates = actual.targets.iter().filter(|t| t.name() == name);
        let (Some(actual_target), None) = (candidates.next(), candidates.next()) else {
            return LockFileValidity::invalid();
        };
        if actual_target.dependencies.len() != expected_target.dependencies.len() {
            return LockFileValidity::invalid();
        }

        let mut remaining: Vec<&LockFileDependency> = actual_target.dependencies.iter().collect();
        for expected_dep in &expected_target.dependencies {
            let Some(pos) = remaining
                .iter()
                .position(|d| d.eq_ignoring_content_hash(expected_dep))
            else {
                return LockFileValidity::invalid();
            };
            let actual_dep = remaining.swap_remove(pos);
            matched.push((expected_dep.clone(), actual_dep.clone()));
        }
    }

    LockFileValidity {
        is_valid: true,
        matched_dependencies: matched,
    }
}

/// Lock file error.
#[derive(Debug)]
pub struct LockfileError {
    code: &'static str,
    message: String,
}

impl LockfileError {
    /// Create a new error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LockfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for LockfileError {}

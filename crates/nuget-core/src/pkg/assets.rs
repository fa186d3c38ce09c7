//! `project.assets.json` model.
//!
//! Only the parts needed to rebuild dependency paths are kept: the resolved
//! libraries per target, the project's top-level references and its name.

use super::error::PkgError;
use super::framework::{frameworks_match, short_folder_name, split_target_key};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Version assigned to an assets file that could not be read.
pub const INVALID_ASSETS_FILE_VERSION: i32 = i32::MIN;

/// Default assets file name.
pub const ASSETS_FILE_NAME: &str = "project.assets.json";

/// A resolved library in a target, from a `"<name>/<version>"` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetsLibrary {
    pub name: String,
    pub version: String,
    /// `package` or `project`.
    pub library_type: String,
    /// Dependency id -> version range.
    pub dependencies: BTreeMap<String, String>,
}

/// Libraries resolved for one framework or framework/RID pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetsTarget {
    /// Framework as written in the assets file.
    pub framework: String,
    pub runtime_identifier: Option<String>,
    pub libraries: Vec<AssetsLibrary>,
}

impl AssetsTarget {
    /// Short folder name of the target framework.
    #[must_use]
    pub fn short_framework(&self) -> String {
        short_folder_name(&self.framework)
    }

    /// Find a library by id, case-insensitively.
    #[must_use]
    pub fn library(&self, id: &str) -> Option<&AssetsLibrary> {
        self.libraries
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(id))
    }
}

/// A project framework from `project.frameworks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFramework {
    pub name: String,
    /// Directly referenced package ids.
    pub dependencies: Vec<String>,
}

/// Parsed `project.assets.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetsFile {
    pub version: i32,
    pub targets: Vec<AssetsTarget>,
    /// Framework -> `"<id> >= <version>"` style entries.
    pub project_file_dependency_groups: BTreeMap<String, Vec<String>>,
    pub project_name: Option<String>,
    pub project_path: Option<String>,
    pub frameworks: Vec<ProjectFramework>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetsJson {
    #[serde(default)]
    version: i32,
    #[serde(default)]
    targets: BTreeMap<String, BTreeMap<String, LibraryJson>>,
    #[serde(default)]
    project_file_dependency_groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    project: Option<ProjectJson>,
}

#[derive(Deserialize)]
struct LibraryJson {
    #[serde(rename = "type", default)]
    library_type: String,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct ProjectJson {
    #[serde(default)]
    restore: Option<RestoreJson>,
    #[serde(default)]
    frameworks: BTreeMap<String, FrameworkJson>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestoreJson {
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    project_path: Option<String>,
}

#[derive(Deserialize)]
struct FrameworkJson {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
}

impl AssetsFile {
    /// Read an assets file, logging and returning a placeholder with
    /// version [`INVALID_ASSETS_FILE_VERSION`] on failure.
    #[must_use]
    pub fn read(path: &Path) -> Self {
        match Self::read_from(path) {
            Ok(assets) => assets,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read assets file");
                Self::invalid()
            }
        }
    }

    /// Read an assets file.
    ///
    /// # Errors
    /// Returns `PKG_ASSETS_INVALID` if the file cannot be read or parsed.
    pub fn read_from(path: &Path) -> Result<Self, PkgError> {
        let content = nuget_util::fs::read_to_string_lossy(path)
            .map_err(|e| PkgError::assets_invalid(path, e))?;
        Self::from_json(&content).map_err(|e| PkgError::assets_invalid(path, e))
    }

    /// Parse assets JSON.
    ///
    /// # Errors
    /// Returns the JSON error on malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let parsed: AssetsJson = serde_json::from_str(json)?;

        let targets = parsed
            .targets
            .into_iter()
            .map(|(key, libraries)| {
                let (framework, rid) = split_target_key(&key);
                AssetsTarget {
                    framework: framework.to_string(),
                    runtime_identifier: rid.map(str::to_string),
                    libraries: libraries
                        .into_iter()
                        .map(|(name_version, library)| {
                            let (name, version) = name_version
                                .split_once('/')
                                .unwrap_or((name_version.as_str(), ""));
                            AssetsLibrary {
                                name: name.to_string(),
                                version: version.to_string(),
                                library_type: library.library_type,
                                dependencies: library.dependencies,
                            }
                        })
                        .collect(),
                }
            })
            .collect();

        let (project_name, project_path, frameworks) = match parsed.project {
            Some(project) => {
                let (name, path) = project
                    .restore
                    .map(|r| (r.project_name, r.project_path))
                    .unwrap_or_default();
                let frameworks = project
                    .frameworks
                    .into_iter()
                    .map(|(name, fw)| ProjectFramework {
                        name,
                        dependencies: fw.dependencies.into_keys().collect(),
                    })
                    .collect();
                (name, path, frameworks)
            }
            None => (None, None, Vec::new()),
        };

        Ok(Self {
            version: parsed.version,
            targets,
            project_file_dependency_groups: parsed.project_file_dependency_groups,
            project_name,
            project_path,
            frameworks,
        })
    }

    fn invalid() -> Self {
        Self {
            version: INVALID_ASSETS_FILE_VERSION,
            targets: Vec::new(),
            project_file_dependency_groups: BTreeMap::new(),
            project_name: None,
            project_path: None,
            frameworks: Vec::new(),
        }
    }

    /// True for the placeholder returned when reading failed.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.version == INVALID_ASSETS_FILE_VERSION
    }

    /// Targets without a runtime identifier.
    pub fn framework_targets(&self) -> impl Iterator<Item = &AssetsTarget> {
        self.targets
            .iter()
            .filter(|t| t.runtime_identifier.is_none())
    }

    /// Ids the project references directly for `framework`.
    ///
    /// Taken from `projectFileDependencyGroups` (the id is the first token of
    /// each entry), falling back to `project.frameworks[..].dependencies`.
    #[must_use]
    pub fn top_level_dependencies(&self, framework: &str) -> Vec<String> {
        let from_groups = self
            .project_file_dependency_groups
            .iter()
            .find(|(fw, _)| frameworks_match(fw, framework));
        if let Some((_, entries)) = from_groups {
            return entries
                .iter()
                .filter_map(|entry| entry.split_whitespace().next())
                .map(str::to_string)
                .collect();
        }

        self.frameworks
            .iter()
            .find(|fw| frameworks_match(&fw.name, framework))
            .map(|fw| fw.dependencies.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;

    const ASSETS: &str = r#"{
      "version": 3,
      "targets": {
        ".NETCoreApp,Version=v8.0": {
          "A/1.0.0": { "type": "package", "dependencies": { "B": "2.0.0" } },
          "B/2.0.0": { "type": "package", "compile": { "lib/net8.0/B.dll": {} } }
        },
        ".NETCoreApp,Version=v8.0/win-x64": {
          "A/1.0.0": { "type": "package" }
        }
      },
      "projectFileDependencyGroups": {
        ".NETCoreApp,Version=v8.0": [ "A >= 1.0.0" ]
      },
      "project": {
        "restore": { "projectName": "App", "projectPath": "/src/App/App.csproj" },
        "frameworks": {
          "net8.0": { "dependencies": { "A": { "target": "Package", "version": "[1.0.0, )" } } },
          "net472": { "dependencies": { "C": { "target": "Package", "version": "[1.0.0, )" } } }
        }
      }
    }"#;

    #[test]
    fn test_parse_assets() {
        let assets = AssetsFile::from_json(ASSETS).unwrap();
        assert_eq!(assets.version, 3);
        assert_eq!(assets.project_name.as_deref(), Some("App"));
        assert_eq!(assets.targets.len(), 2);

        let net8: Vec<_> = assets.framework_targets().collect();
        assert_eq!(net8.len(), 1);
        assert_eq!(net8[0].short_framework(), "net8.0");

        let a = net8[0].library("a").unwrap();
        assert_eq!(a.version, "1.0.0");
        assert_eq!(a.library_type, "package");
        assert_eq!(a.dependencies["B"], "2.0.0");
    }

    #[test]
    fn test_top_level_dependencies() {
        let assets = AssetsFile::from_json(ASSETS).unwrap();
        assert_eq!(assets.top_level_dependencies(".NETCoreApp,Version=v8.0"), ["A"]);
        // No dependency group for net472, so project.frameworks is used.
        assert_eq!(assets.top_level_dependencies(".NETFramework,Version=v4.7.2"), ["C"]);
        assert!(assets.top_level_dependencies("net6.0").is_empty());
    }

    #[test]
    fn test_read_failure_returns_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ASSETS_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        assert!(AssetsFile::read(&path).is_invalid());
        let err = AssetsFile::read_from(&path).unwrap_err();
        assert_eq!(err.code(), codes::PKG_ASSETS_INVALID);
    }
}

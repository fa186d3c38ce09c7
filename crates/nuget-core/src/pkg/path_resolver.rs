//! Install-path convention for the global packages folder.
//!
//! ```text
//! <root>/<id>/<version>/<id>.<version>.nupkg
//! <root>/<id>/<version>/<id>.<version>.nupkg.sha512
//! <root>/<id>/<version>/<id>.nuspec
//! <root>/<id>/<version>/.nupkg.metadata
//! ```

use super::version::NuGetVersion;
use std::path::{Path, PathBuf};

/// Name of the completion marker written after a successful extraction.
pub const NUPKG_METADATA_FILE_NAME: &str = ".nupkg.metadata";

/// Resolves package ids and versions to paths under a packages root.
#[derive(Debug, Clone)]
pub struct VersionFolderPathResolver {
    root: PathBuf,
    lowercase: bool,
}

impl VersionFolderPathResolver {
    /// Create a resolver that lower-cases ids and versions, as the global
    /// packages folder does.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lowercase: true,
        }
    }

    /// Keep id and version casing as given.
    #[must_use]
    pub fn preserve_case(mut self) -> Self {
        self.lowercase = false;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<id>/<version>`
    #[must_use]
    pub fn install_path(&self, id: &str, version: &NuGetVersion) -> PathBuf {
        self.version_list_path(id).join(self.version_name(version))
    }

    /// `<root>/<id>`
    #[must_use]
    pub fn version_list_path(&self, id: &str) -> PathBuf {
        self.root.join(self.id_name(id))
    }

    /// `<id>.<version>.nupkg`
    #[must_use]
    pub fn package_file_name(&self, id: &str, version: &NuGetVersion) -> String {
        format!("{}.{}.nupkg", self.id_name(id), self.version_name(version))
    }

    /// `<id>.<version>.nupkg.sha512`
    #[must_use]
    pub fn hash_file_name(&self, id: &str, version: &NuGetVersion) -> String {
        format!("{}.sha512", self.package_file_name(id, version))
    }

    /// `<id>.nuspec`
    #[must_use]
    pub fn manifest_file_name(&self, id: &str) -> String {
        format!("{}.nuspec", self.id_name(id))
    }

    #[must_use]
    pub fn package_file_path(&self, id: &str, version: &NuGetVersion) -> PathBuf {
        self.install_path(id, version)
            .join(self.package_file_name(id, version))
    }

    #[must_use]
    pub fn hash_path(&self, id: &str, version: &NuGetVersion) -> PathBuf {
        self.install_path(id, version)
            .join(self.hash_file_name(id, version))
    }

    #[must_use]
    pub fn manifest_file_path(&self, id: &str, version: &NuGetVersion) -> PathBuf {
        self.install_path(id, version)
            .join(self.manifest_file_name(id))
    }

    #[must_use]
    pub fn nupkg_metadata_path(&self, id: &str, version: &NuGetVersion) -> PathBuf {
        self.install_path(id, version).join(NUPKG_METADATA_FILE_NAME)
    }

    fn id_name(&self, id: &str) -> String {
        if self.lowercase {
            id.to_lowercase()
        } else {
            id.to_string()
        }
    }

    fn version_name(&self, version: &NuGetVersion) -> String {
        let normalized = version.to_normalized_string();
        if self.lowercase {
            normalized.to_lowercase()
        } else {
            normalized
        }
    }
}

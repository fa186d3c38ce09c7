//! Read-through cache over a global packages folder or fallback folder.
//!
//! Packages are looked up by `(id, version)` through the install-path
//! convention and cached by install path. Version lists are cached per id
//! and only dropped by [`LocalRepository::clear_cache_for_ids`].
//!
//! ## Locking
//!
//! - Exact lookups serialize on the install path, so two lookups of the
//!   same package version never race to synthesize its metadata file.
//! - Version enumeration and cache clearing serialize on the lower-cased id.
//!
//! Lookups of different packages never contend.

use super::error::PkgError;
use super::file_cache::LocalPackageFileCache;
use super::locks::KeyedLocks;
use super::memo::Memo;
use super::metadata::NupkgMetadataFile;
use super::nuspec::Nuspec;
use super::path_resolver::VersionFolderPathResolver;
use super::runtime_graph::RuntimeGraph;
use super::version::NuGetVersion;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// An installed package and its lazily read contents.
#[derive(Debug, Clone)]
pub struct LocalPackageInfo {
    id: String,
    version: NuGetVersion,
    expanded_path: PathBuf,
    manifest_path: PathBuf,
    zip_path: PathBuf,
    sha512_path: PathBuf,
    nuspec: Memo<Nuspec>,
    files: Memo<Vec<String>>,
    sha512: Memo<String>,
    runtime_graph: Memo<Option<RuntimeGraph>>,
}

impl LocalPackageInfo {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn version(&self) -> &NuGetVersion {
        &self.version
    }

    /// The install folder, `<root>/<id>/<version>`.
    #[must_use]
    pub fn expanded_path(&self) -> &Path {
        &self.expanded_path
    }

    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    #[must_use]
    pub fn zip_path(&self) -> &Path {
        &self.zip_path
    }

    /// Path of the `.nupkg.metadata` file the content hash is read from.
    #[must_use]
    pub fn sha512_path(&self) -> &Path {
        &self.sha512_path
    }

    /// Parsed manifest.
    ///
    /// # Errors
    /// `PKG_NUSPEC_MISSING` if the install folder has no nuspec, or the
    /// error from parsing it.
    pub fn nuspec(&self) -> Result<Arc<Nuspec>, PkgError> {
        self.nuspec.get()
    }

    /// Package files as sorted `/`-separated relative paths.
    pub fn files(&self) -> Result<Arc<Vec<String>>, PkgError> {
        self.files.get()
    }

    /// Content hash from the metadata file.
    pub fn sha512(&self) -> Result<Arc<String>, PkgError> {
        self.sha512.get()
    }

    /// Parsed `runtime.json`, if the package ships one.
    pub fn runtime_graph(&self) -> Result<Arc<Option<RuntimeGraph>>, PkgError> {
        self.runtime_graph.get()
    }

    /// A view of this package under a differently-cased identity.
    ///
    /// The view shares every lazily read value with `self`.
    #[must_use]
    pub fn with_identity(&self, id: &str, version: &NuGetVersion) -> Self {
        Self {
            id: id.to_string(),
            version: version.clone(),
            ..self.clone()
        }
    }

    /// True if both share the same cached reads.
    #[must_use]
    pub fn shares_contents_with(&self, other: &Self) -> bool {
        self.nuspec.shares_cell(&other.nuspec)
            && self.files.shares_cell(&other.files)
            && self.sha512.shares_cell(&other.sha512)
            && self.runtime_graph.shares_cell(&other.runtime_graph)
    }
}

/// A package folder laid out as `<root>/<id>/<version>/`.
#[derive(Debug)]
pub struct LocalRepository {
    resolver: VersionFolderPathResolver,
    file_cache: Arc<LocalPackageFileCache>,
    is_fallback_folder: bool,
    packages: DashMap<String, Arc<LocalPackageInfo>>,
    package_lists: DashMap<String, Arc<Vec<Arc<LocalPackageInfo>>>>,
    id_locks: KeyedLocks,
    path_locks: KeyedLocks,
}

impl LocalRepository {
    /// A writable repository with its own file cache.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_file_cache(root, Arc::new(LocalPackageFileCache::new()))
    }

    /// A writable repository sharing `file_cache` with other repositories.
    #[must_use]
    pub fn with_file_cache(root: impl Into<PathBuf>, file_cache: Arc<LocalPackageFileCache>) -> Self {
        Self {
            resolver: VersionFolderPathResolver::new(root),
            file_cache,
            is_fallback_folder: false,
            packages: DashMap::new(),
            package_lists: DashMap::new(),
            id_locks: KeyedLocks::new(),
            path_locks: KeyedLocks::new(),
        }
    }

    /// Mark this repository as a read-only fallback folder.
    #[must_use]
    pub fn as_fallback(mut self) -> Self {
        self.is_fallback_folder = true;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    #[must_use]
    pub fn is_fallback_folder(&self) -> bool {
        self.is_fallback_folder
    }

    #[must_use]
    pub fn path_resolver(&self) -> &VersionFolderPathResolver {
        &self.resolver
    }

    #[must_use]
    pub fn file_cache(&self) -> &Arc<LocalPackageFileCache> {
        &self.file_cache
    }

    /// True if a complete install of the package exists.
    #[must_use]
    pub fn exists(&self, id: &str, version: &NuGetVersion) -> bool {
        self.find_package(id, version).is_some()
    }

    /// Find an installed package.
    ///
    /// The returned identity carries the casing of `id` and `version` as
    /// given, even when an earlier lookup cached the package under another
    /// spelling.
    #[must_use]
    pub fn find_package(&self, id: &str, version: &NuGetVersion) -> Option<Arc<LocalPackageInfo>> {
        let package = self.find_package_impl(id, version)?;

        if package.id == id && package.version.same_casing(version) {
            Some(package)
        } else {
            Some(Arc::new(package.with_identity(id, version)))
        }
    }

    /// Every complete install of `id`, sorted by version.
    ///
    /// Folders whose names are not versions are skipped. The result is
    /// cached until [`clear_cache_for_ids`](Self::clear_cache_for_ids).
    #[must_use]
    pub fn find_packages_by_id(&self, id: &str) -> Arc<Vec<Arc<LocalPackageInfo>>> {
        let key = id.to_lowercase();
        self.id_locks.with_lock(&key, || {
            if let Some(list) = self.package_lists.get(&key) {
                return Arc::clone(&list);
            }
            let list = Arc::new(self.scan_versions(id));
            self.package_lists.insert(key.clone(), Arc::clone(&list));
            list
        })
    }

    /// Forget cached version lists for `ids` so newly installed versions
    /// become visible. Cached packages themselves are kept.
    pub fn clear_cache_for_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let key = id.as_ref().to_lowercase();
            self.id_locks.with_lock(&key, || {
                self.package_lists.remove(&key);
            });
        }
    }

    fn scan_versions(&self, id: &str) -> Vec<Arc<LocalPackageInfo>> {
        let dir = self.resolver.version_list_path(id);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut packages = Vec::new();
        for entry in entries.filter_map(Result::ok) {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            match NuGetVersion::parse(&name) {
                Ok(version) => {
                    if let Some(package) = self.find_package_impl(id, &version) {
                        packages.push(package);
                    }
                }
                Err(_) => {
                    debug!(folder = %entry.path().display(), "Skipping non-version folder");
                }
            }
        }
        packages.sort_by(|a, b| a.version.cmp(&b.version));
        packages
    }

    fn find_package_impl(&self, id: &str, version: &NuGetVersion) -> Option<Arc<LocalPackageInfo>> {
        let expanded = self.resolver.install_path(id, version);
        let key = self.file_cache.comparer().key(&expanded);

        if let Some(found) = self.packages.get(&key) {
            return Some(Arc::clone(&found));
        }

        self.path_locks.with_lock(&key, || {
            if let Some(found) = self.packages.get(&key) {
                return Some(Arc::clone(&found));
            }

            let metadata_path = self.resolver.nupkg_metadata_path(id, version);
            let hash_path = self.resolver.hash_path(id, version);

            if !self.is_fallback_folder
                && !metadata_path.is_file()
                && self.file_cache.sha512_exists(&hash_path)
            {
                self.synthesize_metadata(&hash_path, &metadata_path);
            }

            if !self.file_cache.sha512_exists(&metadata_path) {
                return None;
            }

            let manifest_path = self.resolver.manifest_file_path(id, version);
            let package = Arc::new(LocalPackageInfo {
                id: id.to_string(),
                version: version.clone(),
                nuspec: self.file_cache.get_or_add_nuspec(&manifest_path, &expanded),
                files: self.file_cache.get_or_add_files(&expanded),
                sha512: self.file_cache.get_or_add_sha512(&metadata_path),
                runtime_graph: self.file_cache.get_or_add_runtime_graph(&expanded),
                zip_path: self.resolver.package_file_path(id, version),
                manifest_path,
                sha512_path: metadata_path,
                expanded_path: expanded.clone(),
            });
            self.packages.insert(key.clone(), Arc::clone(&package));
            Some(package)
        })
    }

    /// Write `.nupkg.metadata` for an install that only has the legacy hash file.
    fn synthesize_metadata(&self, hash_path: &Path, metadata_path: &Path) {
        let result = self
            .file_cache
            .get_or_add_sha512(hash_path)
            .get()
            .and_then(|hash| NupkgMetadataFile::new(hash.as_str()).write(metadata_path));

        match result {
            Ok(()) => debug!(
                path = %metadata_path.display(),
                "Generated package metadata file from legacy hash file"
            ),
            Err(e) => warn!(
                path = %metadata_path.display(),
                error = %e,
                "Failed to generate package metadata file"
            ),
        }
    }
}

/// A package together with the repository it was found in.
#[derive(Debug, Clone)]
pub struct LocalPackageSourceInfo {
    pub repository: Arc<LocalRepository>,
    pub package: Arc<LocalPackageInfo>,
}

/// First match for `(id, version)` across `repositories`, in order.
#[must_use]
pub fn get_package(
    repositories: &[Arc<LocalRepository>],
    id: &str,
    version: &NuGetVersion,
) -> Option<LocalPackageSourceInfo> {
    repositories.iter().find_map(|repository| {
        repository
            .find_package(id, version)
            .map(|package| LocalPackageSourceInfo {
                repository: Arc::clone(repository),
                package,
            })
    })
}

/// Installed versions of `id` from the first repository that has any.
#[must_use]
pub fn get_packages_by_id(
    repositories: &[Arc<LocalRepository>],
    id: &str,
) -> Option<(Arc<LocalRepository>, Arc<Vec<Arc<LocalPackageInfo>>>)> {
    repositories.iter().find_map(|repository| {
        let packages = repository.find_packages_by_id(id);
        (!packages.is_empty()).then(|| (Arc::clone(repository), packages))
    })
}

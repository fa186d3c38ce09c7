//! Shared, per-path memoization of package folder reads.
//!
//! One `LocalPackageFileCache` can back several repositories pointing at the
//! same folder, so a nuspec or hash file is read at most once per process.

use super::error::PkgError;
use super::memo::Memo;
use super::metadata::NupkgMetadataFile;
use super::nuspec::Nuspec;
use super::path_resolver::NUPKG_METADATA_FILE_NAME;
use super::runtime_graph::{RuntimeGraph, RUNTIME_GRAPH_FILE_NAME};
use dashmap::{DashMap, DashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// Maps filesystem paths to cache keys.
///
/// Case-insensitive on Windows so that differently-cased spellings of the
/// same install folder hit the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathComparer {
    case_insensitive: bool,
}

impl PathComparer {
    /// The comparer matching the host filesystem's usual case rules.
    #[must_use]
    pub fn platform() -> Self {
        Self {
            case_insensitive: cfg!(windows),
        }
    }

    #[must_use]
    pub fn case_insensitive() -> Self {
        Self {
            case_insensitive: true,
        }
    }

    #[must_use]
    pub fn case_sensitive() -> Self {
        Self {
            case_insensitive: false,
        }
    }

    #[must_use]
    pub fn is_case_insensitive(self) -> bool {
        self.case_insensitive
    }

    /// Cache key for `path`.
    #[must_use]
    pub fn key(self, path: &Path) -> String {
        let text = path.to_string_lossy();
        if self.case_insensitive {
            text.to_lowercase()
        } else {
            text.into_owned()
        }
    }
}

impl Default for PathComparer {
    fn default() -> Self {
        Self::platform()
    }
}

#[derive(Debug, Default)]
struct Counters {
    nuspec_reads: AtomicUsize,
    file_listings: AtomicUsize,
    sha512_reads: AtomicUsize,
    exists_checks: AtomicUsize,
    runtime_graph_reads: AtomicUsize,
}

/// Disk access counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileCacheStats {
    pub nuspec_reads: usize,
    pub file_listings: usize,
    pub sha512_reads: usize,
    pub exists_checks: usize,
    pub runtime_graph_reads: usize,
}

/// Memoized readers for nuspec files, file listings, content hashes and
/// runtime graphs, keyed by path.
#[derive(Debug, Default)]
pub struct LocalPackageFileCache {
    comparer: PathComparer,
    nuspecs: DashMap<String, Memo<Nuspec>>,
    files: DashMap<String, Memo<Vec<String>>>,
    sha512s: DashMap<String, Memo<String>>,
    sha512_present: DashSet<String>,
    runtime_graphs: DashMap<String, Memo<Option<RuntimeGraph>>>,
    counters: Arc<Counters>,
}

impl LocalPackageFileCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific path comparer instead of the platform default.
    #[must_use]
    pub fn with_comparer(mut self, comparer: PathComparer) -> Self {
        self.comparer = comparer;
        self
    }

    #[must_use]
    pub fn comparer(&self) -> PathComparer {
        self.comparer
    }

    /// Lazily parsed manifest for a package.
    ///
    /// Reads `manifest_path` if it exists, otherwise the first `.nuspec` file
    /// directly under `expanded_path`. A package with neither fails with
    /// `PKG_NUSPEC_MISSING`.
    pub fn get_or_add_nuspec(&self, manifest_path: &Path, expanded_path: &Path) -> Memo<Nuspec> {
        let key = self.comparer.key(manifest_path);
        self.nuspecs
            .entry(key)
            .or_insert_with(|| {
                let counters = Arc::clone(&self.counters);
                let manifest = manifest_path.to_path_buf();
                let expanded = expanded_path.to_path_buf();
                Memo::new(move || {
                    counters.nuspec_reads.fetch_add(1, Ordering::Relaxed);
                    read_nuspec(&manifest, &expanded)
                })
            })
            .clone()
    }

    /// Lazily computed list of package files under `expanded_path`, as
    /// sorted `/`-separated relative paths.
    pub fn get_or_add_files(&self, expanded_path: &Path) -> Memo<Vec<String>> {
        let key = self.comparer.key(expanded_path);
        self.files
            .entry(key)
            .or_insert_with(|| {
                let counters = Arc::clone(&self.counters);
                let expanded = expanded_path.to_path_buf();
                Memo::new(move || {
                    counters.file_listings.fetch_add(1, Ordering::Relaxed);
                    list_package_files(&expanded)
                })
            })
            .clone()
    }

    /// Lazily read content hash.
    ///
    /// `path` is either a `.nupkg.metadata` file, whose `contentHash` is
    /// returned, or a legacy `.nupkg.sha512` file holding the hash as text.
    pub fn get_or_add_sha512(&self, path: &Path) -> Memo<String> {
        let key = self.comparer.key(path);
        self.sha512s
            .entry(key)
            .or_insert_with(|| {
                let counters = Arc::clone(&self.counters);
                let path = path.to_path_buf();
                Memo::new(move || {
                    counters.sha512_reads.fetch_add(1, Ordering::Relaxed);
                    read_sha512(&path)
                })
            })
            .clone()
    }

    /// True if the hash file exists.
    ///
    /// Only positive answers are cached; a missing file is checked again on
    /// the next call since an install may complete in the meantime.
    pub fn sha512_exists(&self, path: &Path) -> bool {
        let key = self.comparer.key(path);
        if self.sha512_present.contains(&key) {
            return true;
        }
        self.counters.exists_checks.fetch_add(1, Ordering::Relaxed);
        if path.is_file() {
            self.sha512_present.insert(key);
            true
        } else {
            false
        }
    }

    /// Lazily parsed `runtime.json`, or `None` when the package has none.
    pub fn get_or_add_runtime_graph(&self, expanded_path: &Path) -> Memo<Option<RuntimeGraph>> {
        let key = self.comparer.key(expanded_path);
        self.runtime_graphs
            .entry(key)
            .or_insert_with(|| {
                let counters = Arc::clone(&self.counters);
                let expanded = expanded_path.to_path_buf();
                Memo::new(move || {
                    let path = expanded.join(RUNTIME_GRAPH_FILE_NAME);
                    if !path.is_file() {
                        return Ok(None);
                    }
                    counters.runtime_graph_reads.fetch_add(1, Ordering::Relaxed);
                    RuntimeGraph::read(&path).map(Some)
                })
            })
            .clone()
    }

    /// Get disk access counters.
    #[must_use]
    pub fn stats(&self) -> FileCacheStats {
        FileCacheStats {
            nuspec_reads: self.counters.nuspec_reads.load(Ordering::Relaxed),
            file_listings: self.counters.file_listings.load(Ordering::Relaxed),
            sha512_reads: self.counters.sha512_reads.load(Ordering::Relaxed),
            exists_checks: self.counters.exists_checks.load(Ordering::Relaxed),
            runtime_graph_reads: self.counters.runtime_graph_reads.load(Ordering::Relaxed),
        }
    }
}

fn read_nuspec(manifest_path: &Path, expanded_path: &Path) -> Result<Nuspec, PkgError> {
    if manifest_path.is_file() {
        return Nuspec::read(manifest_path);
    }

    match find_nuspec(expanded_path) {
        Some(found) => {
            debug!(
                expected = %manifest_path.display(),
                found = %found.display(),
                "Manifest not at expected path, using nuspec found in package folder"
            );
            Nuspec::read(&found)
        }
        None => Err(PkgError::nuspec_missing(expanded_path)),
    }
}

fn find_nuspec(expanded_path: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(expanded_path).ok()?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("nuspec"))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn read_sha512(path: &Path) -> Result<String, PkgError> {
    let is_metadata = path
        .file_name()
        .is_some_and(|n| n.eq_ignore_ascii_case(NUPKG_METADATA_FILE_NAME));
    if is_metadata {
        return NupkgMetadataFile::read(path).map(|m| m.content_hash);
    }

    let text =
        nuget_util::fs::read_to_string_lossy(path).map_err(|e| PkgError::hash_read_failed(path, e))?;
    Ok(text.trim().to_string())
}

fn list_package_files(expanded_path: &Path) -> Result<Vec<String>, PkgError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(expanded_path).min_depth(1) {
        let entry = entry.map_err(|e| PkgError::files_read_failed(expanded_path, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = nuget_util::fs::relative_unix_path(expanded_path, entry.path())
        else {
            continue;
        };
        if is_package_file(&relative) {
            files.push(relative);
        }
    }
    files.sort();
    Ok(files)
}

/// False for packaging artifacts that are not part of the package content:
/// OPC relationship and content-type parts, core-properties `.psmdcp`, the
/// signature, and the install markers written next to the extracted files.
pub fn is_package_file(relative: &str) -> bool {
    if relative.ends_with('/') {
        return false;
    }
    let lower = relative.to_ascii_lowercase();

    if lower == "[content_types].xml" || lower == ".signature.p7s" {
        return false;
    }
    if lower.starts_with("_rels/") && lower.ends_with(".rels") {
        return false;
    }
    if lower.starts_with("package/") && lower.ends_with(".psmdcp") {
        return false;
    }

    let at_root = !lower.contains('/');
    if at_root
        && (lower.ends_with(".nupkg")
            || lower.ends_with(".nupkg.sha512")
            || lower == NUPKG_METADATA_FILE_NAME)
    {
        return false;
    }
    true
}

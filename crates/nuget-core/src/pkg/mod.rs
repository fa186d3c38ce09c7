//! Package functionality.
//!
//! Provides utilities for:
//! - Parsing and normalizing NuGet versions
//! - Locating packages in the global packages folder and fallback folders
//! - Reading nuspec, `.nupkg.metadata` and `runtime.json` files, cached per path
//! - Reading and writing `packages.lock.json`
//! - Reading `project.assets.json`
//! - Building dependency graphs for a package and printing why it is referenced

pub mod assets;
pub mod error;
pub mod file_cache;
pub mod framework;
pub mod graph;
pub mod local_repo;
pub mod lockfile;
pub mod locks;
pub mod memo;
pub mod metadata;
pub mod nuspec;
pub mod path_resolver;
pub mod runtime_graph;
pub mod version;
pub mod why;

pub use assets::{AssetsFile, AssetsLibrary, AssetsTarget, ASSETS_FILE_NAME};
pub use error::{codes as pkg_codes, PkgError};
pub use file_cache::{FileCacheStats, LocalPackageFileCache, PathComparer};
pub use framework::{frameworks_match, short_folder_name};
pub use graph::{find_dependency_graphs, DependencyGraph, DependencyNode, FrameworkGraph, NodeId};
pub use local_repo::{
    get_package, get_packages_by_id, LocalPackageInfo, LocalPackageSourceInfo, LocalRepository,
};
pub use lockfile::{
    codes as lockfile_codes, is_lock_file_still_valid, lock_file_path, LockFileDependency,
    LockFileValidity, LockfileError, PackageDependency, PackageDependencyType, PackagesLockFile,
    PackagesLockFileTarget, PACKAGES_LOCK_FILE_NAME, PACKAGES_LOCK_FILE_VERSION,
};
pub use locks::KeyedLocks;
pub use memo::Memo;
pub use metadata::{NupkgMetadataFile, NUPKG_METADATA_FORMAT_VERSION};
pub use nuspec::{Nuspec, NuspecDependency, NuspecDependencyGroup};
pub use path_resolver::{VersionFolderPathResolver, NUPKG_METADATA_FILE_NAME};
pub use runtime_graph::{RuntimeGraph, RUNTIME_GRAPH_FILE_NAME};
pub use version::NuGetVersion;
pub use why::{
    deduplicated_frameworks, render_graph, why_codes, why_for_project, FrameworkGroup,
    ProjectWhyResult, TreeLine, WhyError, WhyGroup, PKG_WHY_SCHEMA_VERSION,
};

use crate::error::Error;
use std::path::{Path, PathBuf};

/// Environment variable overriding the global packages folder.
pub const PACKAGES_ENV: &str = "NUGET_PACKAGES";

/// Environment variable listing fallback package folders, separated by `;`.
pub const FALLBACK_PACKAGES_ENV: &str = "NUGET_FALLBACK_PACKAGES";

/// Get the global packages folder.
///
/// Resolution order:
/// - `NUGET_PACKAGES` when set to a non-empty value
/// - `~/.nuget/packages`
///
/// # Errors
/// Returns an error if the override is relative or the home directory is unknown.
pub fn global_packages_folder() -> Result<PathBuf, Error> {
    if let Some(value) = std::env::var_os(PACKAGES_ENV).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(value);
        if !path.is_absolute() {
            return Err(Error::RelativePackagesFolder { path });
        }
        return Ok(path);
    }

    dirs_next::home_dir()
        .map(|home| home.join(".nuget").join("packages"))
        .ok_or(Error::HomeDirNotFound)
}

/// Get the fallback package folders from `NUGET_FALLBACK_PACKAGES`.
///
/// Entries keep their order; empty entries are dropped.
#[must_use]
pub fn fallback_folders() -> Vec<PathBuf> {
    std::env::var(FALLBACK_PACKAGES_ENV)
        .map(|value| split_folder_list(&value))
        .unwrap_or_default()
}

/// Split a `;`-separated folder list.
#[must_use]
pub fn split_folder_list(value: &str) -> Vec<PathBuf> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Resolve `path` against `base` when it is relative.
#[must_use]
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

//! Package error types.

use std::fmt;
use std::io;
use std::path::Path;

/// Package error codes.
pub mod codes {
    pub const PKG_VERSION_INVALID: &str = "PKG_VERSION_INVALID";
    pub const PKG_NUSPEC_MISSING: &str = "PKG_NUSPEC_MISSING";
    pub const PKG_NUSPEC_INVALID: &str = "PKG_NUSPEC_INVALID";
    pub const PKG_METADATA_INVALID: &str = "PKG_METADATA_INVALID";
    pub const PKG_METADATA_WRITE_FAILED: &str = "PKG_METADATA_WRITE_FAILED";
    pub const PKG_HASH_READ_FAILED: &str = "PKG_HASH_READ_FAILED";
    pub const PKG_RUNTIME_GRAPH_INVALID: &str = "PKG_RUNTIME_GRAPH_INVALID";
    pub const PKG_FILES_READ_FAILED: &str = "PKG_FILES_READ_FAILED";
    pub const PKG_ASSETS_INVALID: &str = "PKG_ASSETS_INVALID";
    pub const PKG_CACHE_ERROR: &str = "PKG_CACHE_ERROR";
}

/// Package error.
///
/// Cloneable so that a failure captured by a compute-once cell can be handed
/// to every caller that observes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgError {
    code: &'static str,
    message: String,
}

impl PkgError {
    /// Create a new error with the given code and message.
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

    /// Create a version invalid error.
    #[must_use]
    pub fn version_invalid(input: &str) -> Self {
        Self::new(
            codes::PKG_VERSION_INVALID,
            format!("'{input}' is not a valid version string"),
        )
    }

    /// Create a missing nuspec error.
    ///
    /// Callers treat this as a corrupt or incomplete install.
    #[must_use]
    pub fn nuspec_missing(expanded_path: &Path) -> Self {
        Self::new(
            codes::PKG_NUSPEC_MISSING,
            format!(
                "The package is missing the required nuspec file. Path: {}",
                expanded_path.display()
            ),
        )
    }

    /// Create a nuspec invalid error.
    #[must_use]
    pub fn nuspec_invalid(path: &Path, detail: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_NUSPEC_INVALID,
            format!("Invalid nuspec {}: {detail}", path.display()),
        )
    }

    /// Create a metadata file invalid error.
    #[must_use]
    pub fn metadata_invalid(path: &Path, detail: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_METADATA_INVALID,
            format!("Invalid package metadata file {}: {detail}", path.display()),
        )
    }

    /// Create a metadata write failed error.
    #[must_use]
    pub fn metadata_write_failed(path: &Path, detail: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_METADATA_WRITE_FAILED,
            format!(
                "Failed to write package metadata file {}: {detail}",
                path.display()
            ),
        )
    }

    /// Create a hash read failed error.
    #[must_use]
    pub fn hash_read_failed(path: &Path, detail: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_HASH_READ_FAILED,
            format!("Failed to read content hash {}: {detail}", path.display()),
        )
    }

    /// Create a runtime graph invalid error.
    #[must_use]
    pub fn runtime_graph_invalid(path: &Path, detail: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_RUNTIME_GRAPH_INVALID,
            format!("Invalid runtime graph {}: {detail}", path.display()),
        )
    }

    /// Create a files read failed error.
    #[must_use]
    pub fn files_read_failed(path: &Path, detail: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_FILES_READ_FAILED,
            format!(
                "Failed to list package files under {}: {detail}",
                path.display()
            ),
        )
    }

    /// Create an assets file invalid error.
    #[must_use]
    pub fn assets_invalid(path: &Path, detail: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_ASSETS_INVALID,
            format!("Unable to read the assets file {}: {detail}", path.display()),
        )
    }

    /// Create a cache error.
    pub fn cache_error(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, msg)
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

impl From<io::Error> for PkgError {
    fn from(e: io::Error) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, e.to_string())
    }
}

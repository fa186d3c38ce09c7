//! The `.nupkg.metadata` completion marker.
//!
//! Written into an install folder once extraction has finished. Its presence
//! is what marks an install as complete.

use super::error::PkgError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Format version written into new metadata files.
pub const NUPKG_METADATA_FORMAT_VERSION: i32 = 2;

/// Contents of a `.nupkg.metadata` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NupkgMetadataFile {
    pub version: i32,
    pub content_hash: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl NupkgMetadataFile {
    #[must_use]
    pub fn new(content_hash: impl Into<String>) -> Self {
        Self {
            version: NUPKG_METADATA_FORMAT_VERSION,
            content_hash: content_hash.into(),
            source: None,
        }
    }

    /// Read a metadata file.
    ///
    /// # Errors
    /// Returns `PKG_METADATA_INVALID` if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self, PkgError> {
        let content = nuget_util::fs::read_to_string_lossy(path)
            .map_err(|e| PkgError::metadata_invalid(path, e))?;
        serde_json::from_str(&content).map_err(|e| PkgError::metadata_invalid(path, e))
    }

    /// Write the metadata file atomically.
    ///
    /// # Errors
    /// Returns `PKG_METADATA_WRITE_FAILED` if serialization or the write fails.
    pub fn write(&self, path: &Path) -> Result<(), PkgError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PkgError::metadata_write_failed(path, e))?;
        nuget_util::fs::atomic_write(path, content.as_bytes())
            .map_err(|e| PkgError::metadata_write_failed(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(NupkgMetadataFile::new("abc==")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "version": 2, "contentHash": "abc==", "source": null })
        );
    }

    #[test]
    fn test_source_is_optional_on_read() {
        let parsed: NupkgMetadataFile =
            serde_json::from_str(r#"{"version":1,"contentHash":"h"}"#).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.content_hash, "h");
        assert_eq!(parsed.source, None);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".nupkg.metadata");

        let mut original = NupkgMetadataFile::new("hash");
        original.source = Some("https://api.nuget.org/v3/index.json".to_string());
        original.write(&path).unwrap();

        assert_eq!(NupkgMetadataFile::read(&path).unwrap(), original);
    }

    #[test]
    fn test_read_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".nupkg.metadata");
        std::fs::write(&path, "{").unwrap();

        let err = NupkgMetadataFile::read(&path).unwrap_err();
        assert_eq!(err.code(), codes::PKG_METADATA_INVALID);
    }
}

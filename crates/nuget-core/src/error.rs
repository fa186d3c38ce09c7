use std::path::PathBuf;
use thiserror::Error;

/// Core error type for configuration and environment discovery.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine the home directory to locate the global packages folder")]
    HomeDirNotFound,

    #[error("Global packages folder must be an absolute path: {path}")]
    RelativePackagesFolder { path: PathBuf },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

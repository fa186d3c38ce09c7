use crate::error::Error;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration for the nuget CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Explicit global packages folder; `None` falls back to the environment.
    pub packages_folder: Option<PathBuf>,

    /// Explicit fallback folders; empty falls back to the environment.
    pub fallback_folders: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            packages_folder: None,
            fallback_folders: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Override the global packages folder.
    #[must_use]
    pub fn with_packages_folder(mut self, folder: Option<PathBuf>) -> Self {
        self.packages_folder = folder;
        self
    }

    /// Override the fallback folders.
    #[must_use]
    pub fn with_fallback_folders(mut self, folders: Vec<PathBuf>) -> Self {
        self.fallback_folders = folders;
        self
    }

    /// The global packages folder to read from.
    ///
    /// Relative overrides are resolved against `cwd`.
    ///
    /// # Errors
    /// Returns an error if no override is given and the environment does not
    /// yield a usable folder.
    pub fn resolve_packages_folder(&self) -> Result<PathBuf, Error> {
        match &self.packages_folder {
            Some(folder) => Ok(paths::absolutize(&self.cwd, folder)),
            None => paths::global_packages_folder(),
        }
    }

    /// The fallback folders to consult after the global packages folder, in priority order.
    #[must_use]
    pub fn resolve_fallback_folders(&self) -> Vec<PathBuf> {
        if self.fallback_folders.is_empty() {
            paths::fallback_folders()
        } else {
            self.fallback_folders
                .iter()
                .map(|f| paths::absolutize(&self.cwd, f))
                .collect()
        }
    }
}

//! Path management for the coordinator's configuration and data files.

use std::path::PathBuf;

const APP_DIR: &str = "physio";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform config or data directory could not be determined.
    BaseDirNotFound(&'static str),
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::BaseDirNotFound(kind) => write!(f, "Cannot find the {} directory", kind),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for physio_core::PhysioError {
    fn from(err: PathError) -> Self {
        physio_core::PhysioError::storage(err.to_string())
    }
}

/// Platform directories, resolved with `dirs`.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/physio/            # Config directory
/// └── config.toml
///
/// ~/.local/share/physio/       # Default data directory (toml backend)
/// ├── roster.toml
/// ├── patients.toml
/// ├── sessions.toml
/// ├── transfer_requests.toml
/// └── transfer_history.toml
/// ```
pub struct PhysioPaths;

impl PhysioPaths {
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::BaseDirNotFound("config"))
    }

    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::BaseDirNotFound("data"))
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }
}

//! Loads `ClinicConfig` from disk.

use crate::paths::PhysioPaths;
use physio_core::config::ClinicConfig;
use physio_core::error::{PhysioError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Loads the configuration from `path`, or from the platform config file when
/// `path` is `None`.
///
/// A missing file yields the defaults; an explicit path that does not exist
/// is an error.
pub fn load_config(path: Option<&Path>) -> Result<ClinicConfig> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PhysioPaths::config_file()?, false),
    };

    if !path.exists() {
        if explicit {
            return Err(PhysioError::validation(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        tracing::debug!(path = %path.display(), "No config file; using defaults");
        return Ok(ClinicConfig::default());
    }

    let raw = fs::read_to_string(&path)?;
    let config = ClinicConfig::from_toml_str(&raw)?;
    tracing::debug!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Data directory for the `toml` backend: the configured one, else the
/// platform data directory.
pub fn resolve_data_dir(config: &ClinicConfig) -> Result<PathBuf> {
    match &config.storage.data_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(PhysioPaths::data_dir()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use physio_core::config::StorageBackend;
    use tempfile::TempDir;

    #[test]
    fn test_loads_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[storage]\nbackend = \"toml\"\n\n[transfers]\npending_queue_limit = 5\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Toml);
        assert_eq!(config.transfers.pending_queue_limit, 5);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_config(Some(&temp_dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_configured_data_dir_wins() {
        let mut config = ClinicConfig::default();
        config.storage.data_dir = Some(PathBuf::from("/srv/physio"));
        assert_eq!(resolve_data_dir(&config).unwrap(), PathBuf::from("/srv/physio"));
    }
}

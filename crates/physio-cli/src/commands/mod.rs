pub mod config;
pub mod request;
pub mod slots;

use anyhow::{Context as _, Result};
use physio_application::{ClinicApi, build_api};
use physio_core::audit::AuditSink;
use physio_core::clock::SystemClock;
use physio_core::config::ClinicConfig;
use physio_infrastructure::config_loader::{load_config, resolve_data_dir};
use physio_infrastructure::{Roster, TracingAuditSink};
use std::path::Path;
use std::sync::Arc;

/// Configuration and roster shared by every command.
pub struct Context {
    pub config: ClinicConfig,
    pub roster: Roster,
}

impl Context {
    pub fn load(config_path: Option<&Path>, roster_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path).context("Failed to load configuration")?;
        let roster = match roster_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read roster {}", path.display()))?;
                Roster::from_toml_str(&raw)
                    .with_context(|| format!("Invalid roster {}", path.display()))?
            }
            None => {
                let data_dir = resolve_data_dir(&config)?;
                Roster::load(&data_dir).context("Failed to load roster")?
            }
        };
        Ok(Self { config, roster })
    }

    pub async fn api(&self) -> Result<ClinicApi> {
        self.api_with_audit(Arc::new(TracingAuditSink)).await
    }

    pub async fn api_with_audit(&self, audit: Arc<dyn AuditSink>) -> Result<ClinicApi> {
        build_api(&self.config, &self.roster, Arc::new(SystemClock), audit).await
    }
}

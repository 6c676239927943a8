//! Coordinator configuration model.
//!
//! Every field has a default so a missing or partial `config.toml` is valid.

use crate::error::{PhysioError, Result};
use crate::timeslot;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ClinicConfig {
    pub scheduling: SchedulingSettings,
    pub transfers: TransferSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

impl ClinicConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| PhysioError::validation(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduling.validate()?;
        if self.transfers.pending_queue_limit == 0 {
            return Err(PhysioError::validation(
                "transfers.pending_queue_limit must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SchedulingSettings {
    /// Bookable session lengths, in minutes.
    pub allowed_durations: Vec<u32>,
    /// Opening time, `HH:MM`.
    pub day_start: String,
    /// Closing time, `HH:MM`.
    pub day_end: String,
    /// Width of the slots offered by availability views.
    pub slot_minutes: u32,
    pub lock_timeout_ms: u64,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            allowed_durations: vec![30, 50, 60, 90],
            day_start: "07:00".to_string(),
            day_end: "19:00".to_string(),
            slot_minutes: 50,
            lock_timeout_ms: 5_000,
        }
    }
}

impl SchedulingSettings {
    pub fn day_bounds(&self) -> Result<(NaiveTime, NaiveTime)> {
        let start = timeslot::parse_time(&self.day_start)?;
        let end = timeslot::parse_time(&self.day_end)?;
        Ok((start, end))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.allowed_durations.is_empty() || self.allowed_durations.contains(&0) {
            return Err(PhysioError::validation(
                "scheduling.allowed_durations must list positive durations",
            ));
        }
        if self.slot_minutes == 0 {
            return Err(PhysioError::validation(
                "scheduling.slot_minutes must be positive",
            ));
        }
        let (start, end) = self.day_bounds()?;
        if start >= end {
            return Err(PhysioError::validation(format!(
                "scheduling.day_start ({}) must precede day_end ({})",
                self.day_start, self.day_end
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TransferSettings {
    /// Lets managers file transfer requests instead of transferring directly.
    pub allow_manager_requests: bool,
    pub pending_queue_limit: usize,
    pub recent_history_limit: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            allow_manager_requests: false,
            pending_queue_limit: 50,
            recent_history_limit: 10,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Toml,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

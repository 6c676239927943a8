//! Wires storage, roster and services together from a `ClinicConfig`.

use crate::api::ClinicApi;
use anyhow::{Context, Result};
use physio_core::audit::AuditSink;
use physio_core::clock::Clock;
use physio_core::config::{ClinicConfig, StorageBackend};
use physio_core::patient::PatientStore;
use physio_core::session::{SessionRepository, SessionScheduler};
use physio_core::transfer::{TransferCoordinator, TransferHistory, TransferRepository};
use physio_infrastructure::config_loader::resolve_data_dir;
use physio_infrastructure::{
    MemoryPatientStore, MemorySessionRepository, MemoryTransferHistory, MemoryTransferRepository,
    Roster, RosterDirectory, TomlPatientStore, TomlSessionRepository, TomlTransferHistory,
    TomlTransferRepository,
};
use std::sync::Arc;

struct Stores {
    sessions: Arc<dyn SessionRepository>,
    requests: Arc<dyn TransferRepository>,
    history: Arc<dyn TransferHistory>,
    patients: Arc<dyn PatientStore>,
}

/// Builds a ready-to-serve [`ClinicApi`].
///
/// With the `toml` backend the patient file is seeded from `roster.patients`
/// the first time only; afterwards the store owns assignments.
pub async fn build_api(
    config: &ClinicConfig,
    roster: &Roster,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
) -> Result<ClinicApi> {
    config.validate().context("Invalid configuration")?;

    let stores = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!(patients = roster.patients.len(), "Using in-memory storage");
            Stores {
                sessions: Arc::new(MemorySessionRepository::new()),
                requests: Arc::new(MemoryTransferRepository::new()),
                history: Arc::new(MemoryTransferHistory::new()),
                patients: Arc::new(MemoryPatientStore::new(roster.patients.clone())),
            }
        }
        StorageBackend::Toml => {
            let data_dir = resolve_data_dir(config).context("Failed to resolve data directory")?;
            std::fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create data directory {}", data_dir.display())
            })?;

            let patients = TomlPatientStore::new(&data_dir);
            let seeded = patients
                .seed(roster.patients.clone())
                .await
                .context("Failed to seed patient store")?;
            tracing::info!(data_dir = %data_dir.display(), seeded, "Using TOML storage");

            Stores {
                sessions: Arc::new(TomlSessionRepository::new(&data_dir)),
                requests: Arc::new(TomlTransferRepository::new(&data_dir)),
                history: Arc::new(TomlTransferHistory::new(&data_dir)),
                patients: Arc::new(patients),
            }
        }
    };

    let directory = Arc::new(RosterDirectory::new(roster));

    let scheduler = Arc::new(SessionScheduler::new(
        stores.sessions,
        stores.patients.clone(),
        directory.clone(),
        audit.clone(),
        clock.clone(),
        config.scheduling.clone(),
    ));
    let coordinator = Arc::new(TransferCoordinator::new(
        stores.requests,
        stores.history,
        stores.patients,
        directory.clone(),
        audit,
        clock.clone(),
        config.transfers.clone(),
        config.scheduling.lock_timeout(),
    ));

    Ok(ClinicApi::new(
        scheduler,
        coordinator,
        directory.clone(),
        directory,
        clock,
    ))
}

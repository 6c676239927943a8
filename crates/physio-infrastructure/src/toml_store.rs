//! TOML-file backed stores.
//!
//! Each store owns one document under the data directory:
//!
//! ```text
//! <data_dir>/
//! ├── sessions.toml
//! ├── transfer_requests.toml
//! ├── transfer_history.toml
//! └── patients.toml
//! ```
//!
//! Writes go through [`AtomicTomlFile::modify`], so a document is never seen
//! half-written. Checked inserts (booking a slot, filing a pending request,
//! resolving one) run their check inside the same closure, under the file
//! lock, so they hold across processes sharing the data directory.

use crate::storage::AtomicTomlFile;
use async_trait::async_trait;
use chrono::NaiveDate;
use physio_core::error::{PhysioError, Result};
use physio_core::patient::{Patient, PatientStore};
use physio_core::session::{Session, SessionRepository, admit_booking};
use physio_core::transfer::{
    TransferFilter, TransferHistory, TransferRecord, TransferRepository, TransferRequest,
    admit_pending, ensure_still_pending,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SESSIONS_FILE: &str = "sessions.toml";
pub const REQUESTS_FILE: &str = "transfer_requests.toml";
pub const HISTORY_FILE: &str = "transfer_history.toml";
pub const PATIENTS_FILE: &str = "patients.toml";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsDocument {
    pub sessions: Vec<Session>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestsDocument {
    pub requests: Vec<TransferRequest>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryDocument {
    pub records: Vec<TransferRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientsDocument {
    pub patients: Vec<Patient>,
}

/// Replaces the element with the same key or appends it.
fn upsert<T: Clone>(items: &mut Vec<T>, item: &T, same: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = item.clone(),
        None => items.push(item.clone()),
    }
}

pub struct TomlSessionRepository {
    file: AtomicTomlFile<SessionsDocument>,
}

impl TomlSessionRepository {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            file: AtomicTomlFile::new(data_dir.join(SESSIONS_FILE)),
        }
    }

    async fn select(&self, keep: impl Fn(&Session) -> bool) -> Result<Vec<Session>> {
        Ok(self
            .file
            .read()
            .await?
            .sessions
            .into_iter()
            .filter(|s| keep(s))
            .collect())
    }
}

#[async_trait]
impl SessionRepository for TomlSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.select(|s| s.id == session_id).await?.into_iter().next())
    }

    async fn insert_booking(&self, mut session: Session) -> Result<Session> {
        self.file
            .modify(move |doc| {
                admit_booking(&doc.sessions, &mut session)?;
                doc.sessions.push(session.clone());
                Ok(session)
            })
            .await
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let session = session.clone();
        self.file
            .modify(move |doc| {
                upsert(&mut doc.sessions, &session, |s| s.id == session.id);
                Ok(())
            })
            .await
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Session>> {
        self.select(|s| s.scheduled_date == date).await
    }

    async fn list_for_therapist_on(
        &self,
        therapist_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Session>> {
        self.select(|s| s.scheduled_date == date && s.therapist_id == therapist_id)
            .await
    }

    async fn list_by_patient(&self, patient_id: &str) -> Result<Vec<Session>> {
        self.select(|s| s.patient_id == patient_id).await
    }
}

pub struct TomlTransferRepository {
    file: AtomicTomlFile<RequestsDocument>,
}

impl TomlTransferRepository {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            file: AtomicTomlFile::new(data_dir.join(REQUESTS_FILE)),
        }
    }
}

#[async_trait]
impl TransferRepository for TomlTransferRepository {
    async fn find_by_id(&self, request_id: &str) -> Result<Option<TransferRequest>> {
        Ok(self
            .file
            .read()
            .await?
            .requests
            .into_iter()
            .find(|r| r.id == request_id))
    }

    async fn insert_pending(&self, request: &TransferRequest) -> Result<()> {
        let request = request.clone();
        self.file
            .modify(move |doc| {
                admit_pending(&doc.requests, &request)?;
                doc.requests.push(request);
                Ok(())
            })
            .await
    }

    async fn resolve_pending(&self, resolved: &TransferRequest) -> Result<()> {
        let resolved = resolved.clone();
        self.file
            .modify(move |doc| {
                let stored = doc.requests.iter_mut().find(|r| r.id == resolved.id);
                ensure_still_pending(stored.as_deref(), &resolved)?;
                if let Some(stored) = stored {
                    *stored = resolved;
                }
                Ok(())
            })
            .await
    }

    async fn save(&self, request: &TransferRequest) -> Result<()> {
        let request = request.clone();
        self.file
            .modify(move |doc| {
                upsert(&mut doc.requests, &request, |r| r.id == request.id);
                Ok(())
            })
            .await
    }

    async fn list(&self, filter: &TransferFilter) -> Result<Vec<TransferRequest>> {
        Ok(self
            .file
            .read()
            .await?
            .requests
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    async fn find_pending_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Option<TransferRequest>> {
        Ok(self
            .file
            .read()
            .await?
            .requests
            .into_iter()
            .find(|r| r.patient_id == patient_id && r.is_pending()))
    }
}

pub struct TomlTransferHistory {
    file: AtomicTomlFile<HistoryDocument>,
}

impl TomlTransferHistory {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            file: AtomicTomlFile::new(data_dir.join(HISTORY_FILE)),
        }
    }
}

#[async_trait]
impl TransferHistory for TomlTransferHistory {
    async fn append(&self, record: &TransferRecord) -> Result<()> {
        let record = record.clone();
        self.file
            .modify(move |doc| {
                if doc.records.iter().any(|r| r.id == record.id) {
                    return Err(PhysioError::storage(format!(
                        "transfer record '{}' already logged",
                        record.id
                    )));
                }
                doc.records.push(record);
                Ok(())
            })
            .await
    }

    async fn list_for_patient(&self, patient_id: &str) -> Result<Vec<TransferRecord>> {
        Ok(self
            .file
            .read()
            .await?
            .records
            .into_iter()
            .filter(|r| r.patient_id == patient_id)
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<TransferRecord>> {
        Ok(self.file.read().await?.records)
    }
}

pub struct TomlPatientStore {
    file: AtomicTomlFile<PatientsDocument>,
}

impl TomlPatientStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            file: AtomicTomlFile::new(data_dir.join(PATIENTS_FILE)),
        }
    }

    /// Writes `patients` only if the document is empty. Returns whether it did.
    pub async fn seed(&self, patients: Vec<Patient>) -> Result<bool> {
        self.file
            .modify(move |doc| {
                if !doc.patients.is_empty() {
                    return Ok(false);
                }
                doc.patients = patients;
                Ok(true)
            })
            .await
    }
}

#[async_trait]
impl PatientStore for TomlPatientStore {
    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>> {
        Ok(self
            .file
            .read()
            .await?
            .patients
            .into_iter()
            .find(|p| p.id == patient_id))
    }

    async fn set_patient_assignment(
        &self,
        patient_id: &str,
        therapist_id: &str,
        branch_id: &str,
    ) -> Result<Patient> {
        let (patient_id, therapist_id, branch_id) = (
            patient_id.to_string(),
            therapist_id.to_string(),
            branch_id.to_string(),
        );
        self.file
            .modify(move |doc| {
                let patient = doc
                    .patients
                    .iter_mut()
                    .find(|p| p.id == patient_id)
                    .ok_or_else(|| PhysioError::not_found("patient", patient_id.as_str()))?;
                patient.assigned_therapist_id = therapist_id;
                patient.branch_id = branch_id;
                Ok(patient.clone())
            })
            .await
    }

    async fn list_patients(&self, branch_id: Option<&str>) -> Result<Vec<Patient>> {
        Ok(self
            .file
            .read()
            .await?
            .patients
            .into_iter()
            .filter(|p| branch_id.is_none_or(|b| p.branch_id == b))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use physio_core::error::ErrorKind;
    use physio_core::session::SessionStatus;
    use physio_core::transfer::TransferStatus;
    use tempfile::TempDir;

    fn session(id: &str, therapist: &str) -> Session {
        let date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let created = date.and_hms_opt(7, 0, 0).unwrap();
        Session {
            id: id.into(),
            patient_id: "p1".into(),
            therapist_id: therapist.into(),
            branch_id: "recife".into(),
            scheduled_date: date,
            scheduled_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 50,
            status: SessionStatus::Scheduled,
            session_number: Some(1),
            notes: String::new(),
            cancellation_reason: None,
            created_by: "rc".into(),
            created_at: created,
            updated_at: created,
        }
    }

    fn request(id: &str) -> TransferRequest {
        TransferRequest {
            id: id.into(),
            patient_id: "p1".into(),
            requested_by: "t7".into(),
            source_therapist_id: "t7".into(),
            source_branch_id: "recife".into(),
            target_therapist_id: "t9".into(),
            target_branch_id: "saopaulo".into(),
            reason: "relocation".into(),
            status: TransferStatus::Pending,
            is_inter_branch: true,
            response_note: None,
            reviewed_by: None,
            created_at: NaiveDate::from_ymd_opt(2025, 10, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            reviewed_at: None,
        }
    }

    #[tokio::test]
    async fn test_sessions_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let repo = TomlSessionRepository::new(temp_dir.path());
        repo.save(&session("s1", "t7")).await.unwrap();
        repo.save(&session("s2", "t8")).await.unwrap();

        let mut cancelled = session("s1", "t7");
        cancelled.status = SessionStatus::Cancelled;
        cancelled.cancellation_reason = Some("sick".into());
        repo.save(&cancelled).await.unwrap();

        let reopened = TomlSessionRepository::new(temp_dir.path());
        let s1 = reopened.find_by_id("s1").await.unwrap().unwrap();
        assert_eq!(s1.status, SessionStatus::Cancelled);
        assert_eq!(s1.cancellation_reason.as_deref(), Some("sick"));
        let date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(reopened.list_by_date(date).await.unwrap().len(), 2);
        assert_eq!(
            reopened.list_for_therapist_on("t8", date).await.unwrap().len(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_handles_on_one_directory_book_a_slot_once() {
        let temp_dir = TempDir::new().unwrap();
        let mut handles = Vec::new();
        for i in 0..8 {
            // One repository per task, each taking the file lock on its own.
            let repo = TomlSessionRepository::new(temp_dir.path());
            handles.push(tokio::spawn(async move {
                repo.insert_booking(session(&format!("s{i}"), "t7")).await
            }));
        }
        let mut booked = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(s) => {
                    booked += 1;
                    assert_eq!(s.session_number, Some(1));
                }
                Err(e) => assert_eq!(e.kind(), ErrorKind::SlotConflict),
            }
        }
        assert_eq!(booked, 1);

        let repo = TomlSessionRepository::new(temp_dir.path());
        let other = repo.insert_booking(session("s9", "t8")).await.unwrap();
        assert_eq!(other.session_number, Some(1));
        let date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(repo.list_by_date(date).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pending_insert_and_resolution_are_checked() {
        let temp_dir = TempDir::new().unwrap();
        let first = TomlTransferRepository::new(temp_dir.path());
        let second = TomlTransferRepository::new(temp_dir.path());

        first.insert_pending(&request("r1")).await.unwrap();
        let err = second.insert_pending(&request("r2")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicatePending);

        let mut approved = request("r1");
        approved.status = TransferStatus::Approved;
        let mut rejected = request("r1");
        rejected.status = TransferStatus::Rejected;
        first.resolve_pending(&approved).await.unwrap();
        let err = second.resolve_pending(&rejected).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(
            second.find_by_id("r1").await.unwrap().unwrap().status,
            TransferStatus::Approved
        );

        let err = second.resolve_pending(&request("ghost")).await.unwrap_err();
        assert!(err.is_not_found());
        second.insert_pending(&request("r3")).await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_lookup_and_history() {
        let temp_dir = TempDir::new().unwrap();
        let requests = TomlTransferRepository::new(temp_dir.path());
        let at = NaiveDate::from_ymd_opt(2025, 10, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        requests.save(&request("r1")).await.unwrap();
        assert!(requests.find_pending_for_patient("p1").await.unwrap().is_some());

        let history = TomlTransferHistory::new(temp_dir.path());
        let record = TransferRecord {
            id: "h1".into(),
            patient_id: "p1".into(),
            from_therapist_id: "t7".into(),
            from_branch_id: "recife".into(),
            to_therapist_id: "t9".into(),
            to_branch_id: "saopaulo".into(),
            reason: None,
            performed_by: "mb".into(),
            request_id: Some("r1".into()),
            inter_branch: true,
            transferred_at: at,
        };
        history.append(&record).await.unwrap();
        assert!(history.append(&record).await.is_err());
        assert_eq!(history.list_for_patient("p1").await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_patient_seed_and_assignment() {
        let temp_dir = TempDir::new().unwrap();
        let store = TomlPatientStore::new(temp_dir.path());
        let p1 = Patient {
            id: "p1".into(),
            full_name: "Ana".into(),
            assigned_therapist_id: "t7".into(),
            branch_id: "recife".into(),
            is_active: true,
        };
        assert!(store.seed(vec![p1.clone()]).await.unwrap());
        assert!(!store.seed(vec![]).await.unwrap());

        let moved = store
            .set_patient_assignment("p1", "t9", "saopaulo")
            .await
            .unwrap();
        assert_eq!(moved.assigned_therapist_id, "t9");
        assert!(
            store
                .set_patient_assignment("ghost", "t9", "saopaulo")
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert_eq!(store.list_patients(Some("saopaulo")).await.unwrap().len(), 1);
    }
}

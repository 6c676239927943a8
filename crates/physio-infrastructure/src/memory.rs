//! Process-local stores, used for the `memory` backend and in tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use physio_core::error::{PhysioError, Result};
use physio_core::patient::{Patient, PatientStore};
use physio_core::session::{Session, SessionRepository, admit_booking};
use physio_core::transfer::{
    TransferFilter, TransferHistory, TransferRecord, TransferRepository, TransferRequest,
    admit_pending, ensure_still_pending,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn insert_booking(&self, mut session: Session) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        admit_booking(sessions.values(), &mut session)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.scheduled_date == date)
            .cloned()
            .collect())
    }

    async fn list_for_therapist_on(
        &self,
        therapist_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.scheduled_date == date && s.therapist_id == therapist_id)
            .cloned()
            .collect())
    }

    async fn list_by_patient(&self, patient_id: &str) -> Result<Vec<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.patient_id == patient_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryTransferRepository {
    requests: RwLock<HashMap<String, TransferRequest>>,
}

impl MemoryTransferRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferRepository for MemoryTransferRepository {
    async fn find_by_id(&self, request_id: &str) -> Result<Option<TransferRequest>> {
        Ok(self.requests.read().await.get(request_id).cloned())
    }

    async fn insert_pending(&self, request: &TransferRequest) -> Result<()> {
        let mut requests = self.requests.write().await;
        admit_pending(requests.values(), request)?;
        requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn resolve_pending(&self, resolved: &TransferRequest) -> Result<()> {
        let mut requests = self.requests.write().await;
        ensure_still_pending(requests.get(&resolved.id), resolved)?;
        requests.insert(resolved.id.clone(), resolved.clone());
        Ok(())
    }

    async fn save(&self, request: &TransferRequest) -> Result<()> {
        self.requests
            .write()
            .await
            .insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn list(&self, filter: &TransferFilter) -> Result<Vec<TransferRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn find_pending_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Option<TransferRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .find(|r| r.patient_id == patient_id && r.is_pending())
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryTransferHistory {
    records: RwLock<Vec<TransferRecord>>,
}

impl MemoryTransferHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferHistory for MemoryTransferHistory {
    async fn append(&self, record: &TransferRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn list_for_patient(&self, patient_id: &str) -> Result<Vec<TransferRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<TransferRecord>> {
        Ok(self.records.read().await.clone())
    }
}

#[derive(Default)]
pub struct MemoryPatientStore {
    patients: RwLock<HashMap<String, Patient>>,
}

impl MemoryPatientStore {
    pub fn new(patients: impl IntoIterator<Item = Patient>) -> Self {
        Self {
            patients: RwLock::new(patients.into_iter().map(|p| (p.id.clone(), p)).collect()),
        }
    }
}

#[async_trait]
impl PatientStore for MemoryPatientStore {
    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>> {
        Ok(self.patients.read().await.get(patient_id).cloned())
    }

    async fn set_patient_assignment(
        &self,
        patient_id: &str,
        therapist_id: &str,
        branch_id: &str,
    ) -> Result<Patient> {
        let mut patients = self.patients.write().await;
        let patient = patients
            .get_mut(patient_id)
            .ok_or_else(|| PhysioError::not_found("patient", patient_id))?;
        patient.assigned_therapist_id = therapist_id.to_string();
        patient.branch_id = branch_id.to_string();
        Ok(patient.clone())
    }

    async fn list_patients(&self, branch_id: Option<&str>) -> Result<Vec<Patient>> {
        Ok(self
            .patients
            .read()
            .await
            .values()
            .filter(|p| branch_id.is_none_or(|b| p.branch_id == b))
            .cloned()
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

    fn session(id: &str, therapist: &str, hh: u32) -> Session {
        let date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let created = date.and_hms_opt(7, 0, 0).unwrap();
        Session {
            id: id.into(),
            patient_id: "p1".into(),
            therapist_id: therapist.into(),
            branch_id: "recife".into(),
            scheduled_date: date,
            scheduled_time: NaiveTime::from_hms_opt(hh, 0, 0).unwrap(),
            duration_minutes: 50,
            status: SessionStatus::Scheduled,
            session_number: None,
            notes: String::new(),
            cancellation_reason: None,
            created_by: "rc".into(),
            created_at: created,
            updated_at: created,
        }
    }

    fn patient(id: &str, branch: &str) -> Patient {
        Patient {
            id: id.into(),
            full_name: String::new(),
            assigned_therapist_id: "t7".into(),
            branch_id: branch.into(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_patient_assignment_and_branch_listing() {
        let store = MemoryPatientStore::new([patient("p1", "recife"), patient("p2", "natal")]);
        let moved = store
            .set_patient_assignment("p1", "t9", "saopaulo")
            .await
            .unwrap();
        assert_eq!(moved.branch_id, "saopaulo");
        assert_eq!(store.list_patients(Some("recife")).await.unwrap().len(), 0);
        assert_eq!(store.list_patients(None).await.unwrap().len(), 2);

        let err = store
            .set_patient_assignment("ghost", "t9", "saopaulo")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_booking_checks_slot_and_numbers_in_store() {
        let repo = MemorySessionRepository::new();
        let late = repo.insert_booking(session("s1", "t8", 11)).await.unwrap();
        assert_eq!(late.session_number, Some(1));
        let early = repo.insert_booking(session("s2", "t7", 9)).await.unwrap();
        assert_eq!(early.session_number, Some(1));

        let err = repo.insert_booking(session("s3", "t7", 9)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SlotConflict);
        assert!(repo.find_by_id("s3").await.unwrap().is_none());

        let after = repo.insert_booking(session("s4", "t7", 13)).await.unwrap();
        assert_eq!(after.session_number, Some(3));
    }

    #[tokio::test]
    async fn test_second_resolution_is_refused() {
        let repo = MemoryTransferRepository::new();
        let pending = TransferRequest {
            id: "r1".into(),
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
        };
        repo.insert_pending(&pending).await.unwrap();
        let duplicate = TransferRequest {
            id: "r2".into(),
            ..pending.clone()
        };
        assert_eq!(
            repo.insert_pending(&duplicate).await.unwrap_err().kind(),
            ErrorKind::DuplicatePending
        );

        let cancelled = TransferRequest {
            status: TransferStatus::Cancelled,
            ..pending.clone()
        };
        let approved = TransferRequest {
            status: TransferStatus::Approved,
            ..pending
        };
        repo.resolve_pending(&cancelled).await.unwrap();
        assert_eq!(
            repo.resolve_pending(&approved).await.unwrap_err().kind(),
            ErrorKind::InvalidTransition
        );
        repo.insert_pending(&duplicate).await.unwrap();
    }
}

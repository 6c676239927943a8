//! In-memory collaborators shared by the unit tests of this crate.

use crate::actor::{Actor, Role, Therapist, TherapistDirectory};
use crate::audit::{AuditEvent, AuditEventType, AuditSink};
use crate::clock::FixedClock;
use crate::config::{SchedulingSettings, TransferSettings};
use crate::error::{PhysioError, Result};
use crate::patient::{Patient, PatientStore};
use crate::session::{Session, SessionRepository, SessionScheduler, admit_booking};
use crate::transfer::{
    TransferCoordinator, TransferFilter, TransferHistory, TransferRecord, TransferRepository,
    TransferRequest, TransferStatus, admit_pending, ensure_still_pending,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// 2025-10-01 at `hh:mm`.
pub fn at(hh: u32, mm: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 1)
        .unwrap()
        .and_hms_opt(hh, mm, 0)
        .unwrap()
}

#[derive(Default)]
pub struct MemSessions(Mutex<HashMap<String, Session>>);

#[async_trait]
impl SessionRepository for MemSessions {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.0.lock().unwrap().get(session_id).cloned())
    }

    async fn insert_booking(&self, mut session: Session) -> Result<Session> {
        let mut sessions = self.0.lock().unwrap();
        admit_booking(sessions.values(), &mut session)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.0
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Session>> {
        Ok(self
            .0
            .lock()
            .unwrap()
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
            .list_by_date(date)
            .await?
            .into_iter()
            .filter(|s| s.therapist_id == therapist_id)
            .collect())
    }

    async fn list_by_patient(&self, patient_id: &str) -> Result<Vec<Session>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.patient_id == patient_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemPatients {
    patients: Mutex<HashMap<String, Patient>>,
    pub fail_assignment: AtomicBool,
}

impl MemPatients {
    pub fn insert(&self, patient: Patient) {
        self.patients
            .lock()
            .unwrap()
            .insert(patient.id.clone(), patient);
    }

    pub fn snapshot(&self, id: &str) -> Patient {
        self.patients.lock().unwrap()[id].clone()
    }
}

#[async_trait]
impl PatientStore for MemPatients {
    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>> {
        Ok(self.patients.lock().unwrap().get(patient_id).cloned())
    }

    async fn set_patient_assignment(
        &self,
        patient_id: &str,
        therapist_id: &str,
        branch_id: &str,
    ) -> Result<Patient> {
        if self.fail_assignment.load(Ordering::SeqCst) {
            return Err(PhysioError::storage("patient store offline"));
        }
        let mut patients = self.patients.lock().unwrap();
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
            .lock()
            .unwrap()
            .values()
            .filter(|p| branch_id.is_none_or(|b| p.branch_id == b))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemTherapists(Mutex<HashMap<String, Therapist>>);

impl MemTherapists {
    pub fn insert(&self, id: &str, branch: &str) {
        self.0.lock().unwrap().insert(
            id.to_string(),
            Therapist {
                id: id.to_string(),
                name: id.to_uppercase(),
                branch_id: branch.to_string(),
                active: true,
            },
        );
    }
}

#[async_trait]
impl TherapistDirectory for MemTherapists {
    async fn find_therapist(&self, therapist_id: &str) -> Result<Option<Therapist>> {
        Ok(self.0.lock().unwrap().get(therapist_id).cloned())
    }

    async fn list_therapists(&self, branch_id: Option<&str>) -> Result<Vec<Therapist>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .values()
            .filter(|t| branch_id.is_none_or(|b| t.branch_id == b))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemTransfers {
    requests: Mutex<HashMap<String, TransferRequest>>,
    /// Fails resolutions to `APPROVED` only.
    pub fail_approval_save: AtomicBool,
    /// Marks the stored request `REJECTED` just before the next resolution
    /// is checked.
    pub rejected_elsewhere: AtomicBool,
}

impl MemTransfers {
    pub fn snapshot(&self, id: &str) -> TransferRequest {
        self.requests.lock().unwrap()[id].clone()
    }
}

#[async_trait]
impl TransferRepository for MemTransfers {
    async fn find_by_id(&self, request_id: &str) -> Result<Option<TransferRequest>> {
        Ok(self.requests.lock().unwrap().get(request_id).cloned())
    }

    async fn insert_pending(&self, request: &TransferRequest) -> Result<()> {
        let mut requests = self.requests.lock().unwrap();
        admit_pending(requests.values(), request)?;
        requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn resolve_pending(&self, resolved: &TransferRequest) -> Result<()> {
        if resolved.status == TransferStatus::Approved
            && self.fail_approval_save.load(Ordering::SeqCst)
        {
            return Err(PhysioError::storage("request store offline"));
        }
        let mut requests = self.requests.lock().unwrap();
        if self.rejected_elsewhere.swap(false, Ordering::SeqCst) {
            if let Some(stored) = requests.get_mut(&resolved.id) {
                stored.status = TransferStatus::Rejected;
            }
        }
        ensure_still_pending(requests.get(&resolved.id), resolved)?;
        requests.insert(resolved.id.clone(), resolved.clone());
        Ok(())
    }

    async fn save(&self, request: &TransferRequest) -> Result<()> {
        self.requests
            .lock()
            .unwrap()
            .insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn list(&self, filter: &TransferFilter) -> Result<Vec<TransferRequest>> {
        Ok(self
            .requests
            .lock()
            .unwrap()
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
            .lock()
            .unwrap()
            .values()
            .find(|r| r.patient_id == patient_id && r.is_pending())
            .cloned())
    }
}

#[derive(Default)]
pub struct MemHistory {
    records: Mutex<Vec<TransferRecord>>,
    pub fail_append: AtomicBool,
}

#[async_trait]
impl TransferHistory for MemHistory {
    async fn append(&self, record: &TransferRecord) -> Result<()> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(PhysioError::storage("history log offline"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_for_patient(&self, patient_id: &str) -> Result<Vec<TransferRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<TransferRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<AuditEvent>>);

impl RecordingSink {
    pub fn count(&self, event_type: AuditEventType) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn emit(&self, event: AuditEvent) -> Result<()> {
        self.0.lock().unwrap().push(event);
        Ok(())
    }
}

/// Two branches: `recife` (t7, t8) and `saopaulo` (t9). Patient p1 is with
/// t7, p2 with t8. The clock reads 2025-10-01 08:00.
pub struct Fixture {
    pub clock: Arc<FixedClock>,
    pub sessions: Arc<MemSessions>,
    pub patients: Arc<MemPatients>,
    pub therapists: Arc<MemTherapists>,
    pub transfers: Arc<MemTransfers>,
    pub history: Arc<MemHistory>,
    pub audit: Arc<RecordingSink>,
    pub transfer_settings: TransferSettings,
}

impl Fixture {
    pub fn new() -> Self {
        let therapists = MemTherapists::default();
        therapists.insert("t7", "recife");
        therapists.insert("t8", "recife");
        therapists.insert("t9", "saopaulo");

        let patients = MemPatients::default();
        for (id, name, therapist) in [("p1", "Ana", "t7"), ("p2", "Bruno", "t8")] {
            patients.insert(Patient {
                id: id.into(),
                full_name: name.into(),
                assigned_therapist_id: therapist.into(),
                branch_id: "recife".into(),
                is_active: true,
            });
        }

        Self {
            clock: Arc::new(FixedClock::new(at(8, 0))),
            sessions: Arc::new(MemSessions::default()),
            patients: Arc::new(patients),
            therapists: Arc::new(therapists),
            transfers: Arc::new(MemTransfers::default()),
            history: Arc::new(MemHistory::default()),
            audit: Arc::new(RecordingSink::default()),
            transfer_settings: TransferSettings::default(),
        }
    }

    pub fn scheduler(&self) -> SessionScheduler {
        SessionScheduler::new(
            self.sessions.clone(),
            self.patients.clone(),
            self.therapists.clone(),
            self.audit.clone(),
            self.clock.clone(),
            SchedulingSettings::default(),
        )
    }

    pub fn coordinator(&self) -> TransferCoordinator {
        TransferCoordinator::new(
            self.transfers.clone(),
            self.history.clone(),
            self.patients.clone(),
            self.therapists.clone(),
            self.audit.clone(),
            self.clock.clone(),
            self.transfer_settings.clone(),
            std::time::Duration::from_secs(5),
        )
    }

    pub fn receptionist(&self) -> Actor {
        Actor::new("rc", Role::Receptionist, Some("recife"))
    }

    pub fn branch_manager(&self) -> Actor {
        Actor::new("mb", Role::ManagerBranch, Some("recife"))
    }

    pub fn general_manager(&self) -> Actor {
        Actor::new("mg", Role::ManagerGeneral, None)
    }

    pub fn therapist(&self, id: &str) -> Actor {
        Actor::new(id, Role::Therapist, Some("recife"))
    }
}

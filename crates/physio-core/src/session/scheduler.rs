//! Session scheduler: booking, lifecycle transitions and schedule reads.

use super::model::{DaySchedule, NewSession, Session, SessionStatus, SessionView};
use super::repository::SessionRepository;
use super::transition::{self, SessionTransition};
use crate::actor::{Action, Actor, Scope, Therapist, TherapistDirectory, authorize};
use crate::audit::{AuditEvent, AuditEventType, AuditSink, emit_quietly};
use crate::clock::Clock;
use crate::config::SchedulingSettings;
use crate::error::{PhysioError, Result};
use crate::lock::ScopeLocks;
use crate::patient::{Patient, PatientStore};
use crate::timeslot::{self, TimeSlot};
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Owns the session lifecycle.
///
/// Slot exclusivity is enforced by [`SessionRepository::insert_booking`],
/// which checks and inserts atomically in the store. Writes for a therapist
/// also run under that therapist's scope lock.
pub struct SessionScheduler {
    sessions: Arc<dyn SessionRepository>,
    patients: Arc<dyn PatientStore>,
    therapists: Arc<dyn TherapistDirectory>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    settings: SchedulingSettings,
    therapist_locks: ScopeLocks,
}

impl SessionScheduler {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        patients: Arc<dyn PatientStore>,
        therapists: Arc<dyn TherapistDirectory>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        settings: SchedulingSettings,
    ) -> Self {
        let therapist_locks = ScopeLocks::new("therapist", settings.lock_timeout());
        Self {
            sessions,
            patients,
            therapists,
            audit,
            clock,
            settings,
            therapist_locks,
        }
    }

    pub fn settings(&self) -> &SchedulingSettings {
        &self.settings
    }

    /// Books a new session in status `SCHEDULED`.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for an unsupported duration, a past start, a slot
    ///   crossing midnight or an inactive therapist/patient
    /// - `NotFound` if the therapist or patient does not exist
    /// - `Forbidden` if the actor may not book for this therapist
    /// - `SlotConflict` if a non-cancelled session of the therapist overlaps
    pub async fn create_session(&self, request: NewSession, actor: &Actor) -> Result<Session> {
        timeslot::validate_duration(request.duration_minutes, &self.settings.allowed_durations)?;
        let slot = TimeSlot::new(request.date, request.time, request.duration_minutes)?;

        let now = self.clock.now();
        if slot.starts_at() < now {
            tracing::debug!(
                therapist_id = %request.therapist_id,
                slot = %slot.label(),
                "Rejected booking in the past"
            );
            return Err(PhysioError::validation(format!(
                "cannot book a session in the past ({})",
                slot.label()
            )));
        }

        let therapist = self.load_therapist(&request.therapist_id).await?;
        let patient = self.load_patient(&request.patient_id).await?;
        if !therapist.active {
            return Err(PhysioError::validation(format!(
                "therapist '{}' is inactive",
                therapist.id
            )));
        }
        if !patient.is_active {
            return Err(PhysioError::validation(format!(
                "patient '{}' is inactive",
                patient.id
            )));
        }

        let owner = scope_owner(actor, &therapist.id, Some(&patient));
        authorize(
            actor,
            Action::CreateSession,
            &Scope::owned(&therapist.branch_id, owner),
        )?;

        // The store checks the slot and numbers the session atomically; the
        // lock only queues same-process callers ahead of the store.
        let guard = self.therapist_locks.acquire(&therapist.id).await?;
        let session = Session {
            id: Uuid::new_v4().to_string(),
            patient_id: patient.id.clone(),
            therapist_id: therapist.id.clone(),
            branch_id: therapist.branch_id.clone(),
            scheduled_date: slot.date,
            scheduled_time: slot.start,
            duration_minutes: slot.minutes,
            status: SessionStatus::Scheduled,
            session_number: None,
            notes: request.notes.unwrap_or_default(),
            cancellation_reason: None,
            created_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
        };
        let session = self
            .sessions
            .insert_booking(session)
            .await
            .inspect_err(|e| {
                if let PhysioError::SlotConflict { existing, .. } = e {
                    tracing::warn!(
                        therapist_id = %therapist.id,
                        requested = %slot.label(),
                        existing = %existing,
                        "Slot conflict"
                    );
                }
            })?;
        drop(guard);

        tracing::info!(
            session_id = %session.id,
            therapist_id = %session.therapist_id,
            patient_id = %session.patient_id,
            actor_id = %actor.id,
            slot = %slot.label(),
            "Session scheduled"
        );
        emit_quietly(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditEventType::SessionCreated,
                &session.id,
                &actor.id,
                now,
                json!({
                    "patient_id": session.patient_id,
                    "therapist_id": session.therapist_id,
                    "branch_id": session.branch_id,
                    "date": session.scheduled_date,
                    "time": session.scheduled_time,
                    "duration_minutes": session.duration_minutes,
                    "session_number": session.session_number,
                }),
            ),
        )
        .await;
        Ok(session)
    }

    pub async fn confirm(&self, session_id: &str, actor: &Actor) -> Result<Session> {
        self.transition(session_id, SessionTransition::Confirm, actor, None)
            .await
    }

    /// Cancels a `SCHEDULED` or `CONFIRMED` session, freeing its slot.
    pub async fn cancel(
        &self,
        session_id: &str,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Session> {
        self.transition(session_id, SessionTransition::Cancel, actor, reason)
            .await
    }

    /// Closes a due `CONFIRMED` session. `notes` are appended to the session notes.
    pub async fn complete(
        &self,
        session_id: &str,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<Session> {
        self.transition(session_id, SessionTransition::Complete, actor, notes)
            .await
    }

    pub async fn mark_no_show(&self, session_id: &str, actor: &Actor) -> Result<Session> {
        self.transition(session_id, SessionTransition::NoShow, actor, None)
            .await
    }

    async fn transition(
        &self,
        session_id: &str,
        transition: SessionTransition,
        actor: &Actor,
        text: Option<String>,
    ) -> Result<Session> {
        let current = self.load_session(session_id).await?;
        let patient = self.patients.get_patient(&current.patient_id).await?;
        let owner = scope_owner(actor, &current.therapist_id, patient.as_ref());
        authorize(
            actor,
            transition.action(),
            &Scope::owned(&current.branch_id, owner),
        )?;

        let guard = self.therapist_locks.acquire(&current.therapist_id).await?;
        // Re-read under the lock; a concurrent writer may have moved it.
        let mut session = self.load_session(session_id).await?;
        let now = self.clock.now();
        let from = session.status;
        let to = transition::apply(&session, transition, now).inspect_err(|e| {
            tracing::warn!(
                session_id,
                actor_id = %actor.id,
                transition = transition.as_str(),
                error = %e,
                "Session transition rejected"
            );
        })?;

        let text = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        match transition {
            SessionTransition::Cancel => session.cancellation_reason = text.clone(),
            SessionTransition::Complete => {
                if let Some(notes) = &text {
                    if session.notes.is_empty() {
                        session.notes = notes.clone();
                    } else {
                        session.notes = format!("{}\n{}", session.notes, notes);
                    }
                }
            }
            SessionTransition::Confirm | SessionTransition::NoShow => {}
        }
        session.status = to;
        session.updated_at = now;
        self.sessions.save(&session).await?;
        drop(guard);

        tracing::info!(
            session_id,
            therapist_id = %session.therapist_id,
            actor_id = %actor.id,
            from = %from,
            to = %to,
            "Session status changed"
        );
        emit_quietly(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditEventType::SessionStatusChanged,
                &session.id,
                &actor.id,
                now,
                json!({
                    "from": from,
                    "to": to,
                    "therapist_id": session.therapist_id,
                    "patient_id": session.patient_id,
                    "reason": session.cancellation_reason,
                }),
            ),
        )
        .await;
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str, actor: &Actor) -> Result<SessionView> {
        let session = self.load_session(session_id).await?;
        authorize(actor, Action::ViewSchedule, &Scope::branch(&session.branch_id))?;
        Ok(SessionView::new(session, self.clock.now()))
    }

    /// The day's sessions ordered by start time and grouped by time.
    ///
    /// Without a therapist filter, branch-scoped actors only see their own
    /// branch.
    pub async fn list_by_date(
        &self,
        date: NaiveDate,
        therapist_id: Option<&str>,
        actor: &Actor,
    ) -> Result<DaySchedule> {
        let sessions = match therapist_id {
            Some(id) => {
                let therapist = self.load_therapist(id).await?;
                authorize(actor, Action::ViewSchedule, &Scope::branch(&therapist.branch_id))?;
                self.sessions.list_for_therapist_on(id, date).await?
            }
            None => {
                let all = self.sessions.list_by_date(date).await?;
                if actor.role.is_network_wide() {
                    all
                } else {
                    all.into_iter()
                        .filter(|s| actor.belongs_to(&s.branch_id))
                        .collect()
                }
            }
        };

        let now = self.clock.now();
        let mut views: Vec<SessionView> = sessions
            .into_iter()
            .map(|s| SessionView::new(s, now))
            .collect();
        views.sort_by(|a, b| {
            a.session
                .scheduled_time
                .cmp(&b.session.scheduled_time)
                .then_with(|| a.session.therapist_id.cmp(&b.session.therapist_id))
        });
        Ok(DaySchedule::from_views(date, views))
    }

    /// Free fixed-width slots of a therapist on `date`.
    ///
    /// Slots overlapping a non-cancelled session, or starting before now, are
    /// left out.
    pub async fn available_slots(
        &self,
        therapist_id: &str,
        date: NaiveDate,
        actor: &Actor,
    ) -> Result<Vec<TimeSlot>> {
        let therapist = self.load_therapist(therapist_id).await?;
        authorize(actor, Action::ViewSchedule, &Scope::branch(&therapist.branch_id))?;

        let (day_start, day_end) = self.settings.day_bounds()?;
        let booked: Vec<TimeSlot> = self
            .sessions
            .list_for_therapist_on(therapist_id, date)
            .await?
            .iter()
            .filter(|s| s.occupies_slot())
            .map(Session::slot)
            .collect();
        let now = self.clock.now();

        Ok(
            timeslot::daily_slots(date, day_start, day_end, self.settings.slot_minutes)
                .into_iter()
                .filter(|slot| slot.starts_at() >= now)
                .filter(|slot| timeslot::first_overlap(slot, &booked).is_none())
                .collect(),
        )
    }

    async fn load_session(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| PhysioError::not_found("session", session_id))
    }

    async fn load_therapist(&self, therapist_id: &str) -> Result<Therapist> {
        self.therapists
            .find_therapist(therapist_id)
            .await?
            .ok_or_else(|| PhysioError::not_found("therapist", therapist_id))
    }

    async fn load_patient(&self, patient_id: &str) -> Result<Patient> {
        self.patients
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| PhysioError::not_found("patient", patient_id))
    }
}

/// Picks the owner a therapist actor is checked against: the booked
/// therapist, or the patient's assigned therapist when that is the actor.
fn scope_owner<'a>(
    actor: &Actor,
    booked_therapist: &'a str,
    patient: Option<&'a Patient>,
) -> &'a str {
    match patient {
        Some(p) if p.assigned_therapist_id == actor.id => &p.assigned_therapist_id,
        _ => booked_therapist,
    }
}

//! Transfer coordinator.
//!
//! Both ways of moving a patient (a manager's direct transfer and an approved
//! request) funnel into [`TransferCoordinator::reassign`], which updates the
//! patient, the request and the history log as one unit: if a later step
//! fails, the earlier ones are rolled back before the error is returned.
//!
//! Every write, and every read that must observe a consistent
//! patient/request pair, runs under the patient's scope lock. That lock is
//! in-process only; the one-pending-request rule and the `PENDING` guard on
//! resolution are enforced by the repository's atomic writes.

use super::model::{
    DirectTransfer, NewTransferRequest, TransferFilter, TransferRecord, TransferRequest,
    TransferStatus,
};
use super::repository::{TransferHistory, TransferRepository};
use super::transition::{self, TransferTransition};
use crate::actor::{Action, Actor, Scope, Therapist, TherapistDirectory, authorize, can};
use crate::audit::{AuditEvent, AuditEventType, AuditSink, emit_quietly};
use crate::clock::Clock;
use crate::config::TransferSettings;
use crate::error::{PhysioError, Result};
use crate::lock::ScopeLocks;
use crate::patient::{Patient, PatientStore};
use crate::reporting::{self, TransferStats};
use chrono::NaiveDateTime;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// How a reassignment was authorized.
enum Commit {
    Direct,
    /// `approved` is persisted with the reassignment; `pending` is its
    /// previous state, restored on rollback.
    Approval {
        approved: TransferRequest,
        pending: TransferRequest,
    },
}

pub struct TransferCoordinator {
    requests: Arc<dyn TransferRepository>,
    history: Arc<dyn TransferHistory>,
    patients: Arc<dyn PatientStore>,
    therapists: Arc<dyn TherapistDirectory>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    settings: TransferSettings,
    patient_locks: ScopeLocks,
}

impl TransferCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        requests: Arc<dyn TransferRepository>,
        history: Arc<dyn TransferHistory>,
        patients: Arc<dyn PatientStore>,
        therapists: Arc<dyn TherapistDirectory>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        settings: TransferSettings,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            requests,
            history,
            patients,
            therapists,
            audit,
            clock,
            settings,
            patient_locks: ScopeLocks::new("patient", lock_timeout),
        }
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    // ============================================================================
    // Requested transfers
    // ============================================================================

    /// Files a `PENDING` transfer request.
    ///
    /// # Errors
    ///
    /// - `MissingReason` if `reason` is blank
    /// - `NotFound` for an unknown patient or target therapist
    /// - `ValidationError` if the patient is inactive, or the target is
    ///   inactive or already assigned
    /// - `Forbidden` if the actor may not request for this patient (managers
    ///   too, unless `allow_manager_requests` is set)
    /// - `DuplicatePending` if the patient already has a pending request
    pub async fn create_request(
        &self,
        request: NewTransferRequest,
        actor: &Actor,
    ) -> Result<TransferRequest> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(PhysioError::missing_reason(
                "a transfer request must state why the patient is moving",
            ));
        }
        if actor.role.is_manager() && !self.settings.allow_manager_requests {
            tracing::warn!(
                actor_id = %actor.id,
                patient_id = %request.patient_id,
                "Manager attempted to file a transfer request"
            );
            return Err(PhysioError::forbidden(
                "managers transfer patients directly instead of filing requests",
            ));
        }

        let target = self.load_active_therapist(&request.target_therapist_id).await?;

        let _guard = self.patient_locks.acquire(&request.patient_id).await?;
        let patient = self.load_patient(&request.patient_id).await?;
        authorize(
            actor,
            Action::RequestTransfer,
            &Scope::owned(&patient.branch_id, &patient.assigned_therapist_id),
        )?;
        ensure_moves(&patient, &target)?;

        let now = self.clock.now();
        let created = TransferRequest {
            id: Uuid::new_v4().to_string(),
            patient_id: patient.id.clone(),
            requested_by: actor.id.clone(),
            source_therapist_id: patient.assigned_therapist_id.clone(),
            source_branch_id: patient.branch_id.clone(),
            target_therapist_id: target.id.clone(),
            target_branch_id: target.branch_id.clone(),
            reason: reason.to_string(),
            status: TransferStatus::Pending,
            is_inter_branch: patient.branch_id != target.branch_id,
            response_note: None,
            reviewed_by: None,
            created_at: now,
            reviewed_at: None,
        };
        self.requests
            .insert_pending(&created)
            .await
            .inspect_err(|e| {
                if let PhysioError::DuplicatePending { request_id, .. } = e {
                    tracing::warn!(
                        patient_id = %created.patient_id,
                        pending_request = %request_id,
                        actor_id = %actor.id,
                        "Duplicate pending transfer request"
                    );
                }
            })?;

        tracing::info!(
            request_id = %created.id,
            patient_id = %created.patient_id,
            actor_id = %actor.id,
            inter_branch = created.is_inter_branch,
            "Transfer requested"
        );
        emit_quietly(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditEventType::TransferRequested,
                &created.id,
                &actor.id,
                now,
                json!({
                    "patient_id": created.patient_id,
                    "source_branch_id": created.source_branch_id,
                    "target_therapist_id": created.target_therapist_id,
                    "target_branch_id": created.target_branch_id,
                    "is_inter_branch": created.is_inter_branch,
                }),
            ),
        )
        .await;
        Ok(created)
    }

    /// Approves a pending request and reassigns the patient in the same unit.
    pub async fn approve(
        &self,
        request_id: &str,
        actor: &Actor,
        response_note: Option<String>,
    ) -> Result<TransferRequest> {
        let patient_id = self.load_request(request_id).await?.patient_id;
        let _guard = self.patient_locks.acquire(&patient_id).await?;

        let pending = self.load_request(request_id).await?;
        self.authorize_resolution(&pending, actor)?;
        transition::apply(&pending, TransferTransition::Approve)?;

        let patient = self.load_patient(&pending.patient_id).await?;
        let now = self.clock.now();
        let mut approved = pending.clone();
        approved.status = TransferStatus::Approved;
        approved.response_note = normalize(response_note);
        approved.reviewed_by = Some(actor.id.clone());
        approved.reviewed_at = Some(now);

        let therapist_id = approved.target_therapist_id.clone();
        let branch_id = approved.target_branch_id.clone();
        let reason = Some(approved.reason.clone());
        self.reassign(
            &patient,
            &therapist_id,
            &branch_id,
            Commit::Approval {
                approved: approved.clone(),
                pending,
            },
            reason,
            actor,
            now,
        )
        .await?;

        self.emit_resolved(&approved, actor, now).await;
        Ok(approved)
    }

    /// Rejects a pending request. A non-empty `response_note` is required.
    pub async fn reject(
        &self,
        request_id: &str,
        actor: &Actor,
        response_note: Option<String>,
    ) -> Result<TransferRequest> {
        let patient_id = self.load_request(request_id).await?.patient_id;
        let _guard = self.patient_locks.acquire(&patient_id).await?;

        let mut request = self.load_request(request_id).await?;
        self.authorize_resolution(&request, actor)?;
        let note = normalize(response_note).ok_or_else(|| {
            PhysioError::missing_reason("a rejection must explain why the transfer was refused")
        })?;
        let to = transition::apply(&request, TransferTransition::Reject)?;

        let now = self.clock.now();
        request.status = to;
        request.response_note = Some(note);
        request.reviewed_by = Some(actor.id.clone());
        request.reviewed_at = Some(now);
        self.requests.resolve_pending(&request).await?;

        tracing::info!(
            request_id,
            patient_id = %request.patient_id,
            actor_id = %actor.id,
            "Transfer request rejected"
        );
        self.emit_resolved(&request, actor, now).await;
        Ok(request)
    }

    /// Withdraws a pending request. Only its requester may do this.
    pub async fn cancel(&self, request_id: &str, actor: &Actor) -> Result<TransferRequest> {
        let patient_id = self.load_request(request_id).await?.patient_id;
        let _guard = self.patient_locks.acquire(&patient_id).await?;

        let mut request = self.load_request(request_id).await?;
        if request.requested_by != actor.id {
            tracing::warn!(
                request_id,
                actor_id = %actor.id,
                requested_by = %request.requested_by,
                "Non-requester attempted to cancel transfer request"
            );
            return Err(PhysioError::forbidden(
                "only the requester may cancel a transfer request",
            ));
        }
        authorize(
            actor,
            Action::CancelTransferRequest,
            &Scope::owned(&request.source_branch_id, &request.requested_by),
        )?;
        let to = transition::apply(&request, TransferTransition::Cancel)?;

        let now = self.clock.now();
        request.status = to;
        request.reviewed_at = Some(now);
        self.requests.resolve_pending(&request).await?;

        tracing::info!(request_id, actor_id = %actor.id, "Transfer request cancelled");
        self.emit_resolved(&request, actor, now).await;
        Ok(request)
    }

    // ============================================================================
    // Direct transfers
    // ============================================================================

    /// Reassigns a patient immediately. Managers of the patient's current
    /// branch (or network-wide) only.
    ///
    /// # Errors
    ///
    /// Returns `DuplicatePending` while the patient has a pending request;
    /// that request must be resolved first.
    pub async fn direct_transfer(
        &self,
        patient_id: &str,
        transfer: DirectTransfer,
        actor: &Actor,
    ) -> Result<Patient> {
        let target = self.load_active_therapist(&transfer.target_therapist_id).await?;

        let _guard = self.patient_locks.acquire(patient_id).await?;
        let patient = self.load_patient(patient_id).await?;
        authorize(actor, Action::DirectTransfer, &Scope::branch(&patient.branch_id))?;
        ensure_moves(&patient, &target)?;

        if let Some(existing) = self.requests.find_pending_for_patient(patient_id).await? {
            return Err(PhysioError::DuplicatePending {
                patient_id: patient_id.to_string(),
                request_id: existing.id,
            });
        }

        let now = self.clock.now();
        self.reassign(
            &patient,
            &target.id,
            &target.branch_id,
            Commit::Direct,
            normalize(transfer.reason),
            actor,
            now,
        )
        .await
    }

    /// The single write path for a patient's therapist/branch assignment.
    ///
    /// Caller must hold the patient's scope lock.
    #[allow(clippy::too_many_arguments)]
    async fn reassign(
        &self,
        patient: &Patient,
        therapist_id: &str,
        branch_id: &str,
        commit: Commit,
        reason: Option<String>,
        actor: &Actor,
        now: NaiveDateTime,
    ) -> Result<Patient> {
        let updated = self
            .patients
            .set_patient_assignment(&patient.id, therapist_id, branch_id)
            .await?;

        let request_id = match &commit {
            Commit::Direct => None,
            Commit::Approval { approved, .. } => {
                if let Err(e) = self.requests.resolve_pending(approved).await {
                    self.restore_patient(patient).await;
                    return Err(e);
                }
                Some(approved.id.clone())
            }
        };

        let record = TransferRecord {
            id: Uuid::new_v4().to_string(),
            patient_id: patient.id.clone(),
            from_therapist_id: patient.assigned_therapist_id.clone(),
            from_branch_id: patient.branch_id.clone(),
            to_therapist_id: therapist_id.to_string(),
            to_branch_id: branch_id.to_string(),
            reason,
            performed_by: actor.id.clone(),
            request_id,
            inter_branch: patient.branch_id != branch_id,
            transferred_at: now,
        };
        if let Err(e) = self.history.append(&record).await {
            if let Commit::Approval { pending, .. } = &commit {
                if let Err(undo) = self.requests.save(pending).await {
                    tracing::error!(
                        request_id = %pending.id,
                        error = %undo,
                        "Failed to restore transfer request after aborted approval"
                    );
                }
            }
            self.restore_patient(patient).await;
            return Err(e);
        }

        tracing::info!(
            patient_id = %patient.id,
            actor_id = %actor.id,
            from_therapist = %record.from_therapist_id,
            to_therapist = %record.to_therapist_id,
            inter_branch = record.inter_branch,
            request_id = ?record.request_id,
            "Patient reassigned"
        );
        emit_quietly(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditEventType::PatientTransferred,
                &patient.id,
                &actor.id,
                now,
                serde_json::to_value(&record).unwrap_or_default(),
            ),
        )
        .await;
        Ok(updated)
    }

    async fn restore_patient(&self, patient: &Patient) {
        if let Err(undo) = self
            .patients
            .set_patient_assignment(&patient.id, &patient.assigned_therapist_id, &patient.branch_id)
            .await
        {
            tracing::error!(
                patient_id = %patient.id,
                error = %undo,
                "Failed to restore patient assignment after aborted transfer"
            );
        }
    }

    // ============================================================================
    // Reads
    // ============================================================================

    /// Requests matching `filter`, newest first.
    ///
    /// Branch-scoped actors only see requests touching their branch.
    pub async fn list(
        &self,
        filter: &TransferFilter,
        actor: &Actor,
    ) -> Result<Vec<TransferRequest>> {
        if let Some(branch) = &filter.branch_id {
            authorize(actor, Action::ViewTransfers, &Scope::branch(branch))?;
        }
        let mut requests: Vec<TransferRequest> = self
            .requests
            .list(filter)
            .await?
            .into_iter()
            .filter(|r| self.visible(r, actor))
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(requests)
    }

    /// Pending requests `actor` could resolve: oldest first, inter-branch
    /// ahead of intra-branch at equal age, capped at `pending_queue_limit`.
    pub async fn pending_queue(&self, actor: &Actor) -> Result<Vec<TransferRequest>> {
        let mut queue: Vec<TransferRequest> = self
            .requests
            .list(&TransferFilter::pending())
            .await?
            .into_iter()
            .filter(|r| {
                r.requested_by != actor.id
                    && can(actor, Action::ResolveTransfer, &Scope::branch(&r.source_branch_id))
            })
            .collect();
        queue.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| b.is_inter_branch.cmp(&a.is_inter_branch))
                .then_with(|| a.id.cmp(&b.id))
        });
        queue.truncate(self.settings.pending_queue_limit);
        Ok(queue)
    }

    pub async fn get_request(&self, request_id: &str, actor: &Actor) -> Result<TransferRequest> {
        let patient_id = self.load_request(request_id).await?.patient_id;
        let _guard = self.patient_locks.acquire(&patient_id).await?;
        let request = self.load_request(request_id).await?;
        if !self.visible(&request, actor) {
            return Err(PhysioError::forbidden(format!(
                "transfer request '{}' is outside your branch",
                request_id
            )));
        }
        Ok(request)
    }

    /// Reads the patient under its lock, so an in-flight approval is either
    /// fully visible or not at all.
    pub async fn get_patient(&self, patient_id: &str, actor: &Actor) -> Result<Patient> {
        let _guard = self.patient_locks.acquire(patient_id).await?;
        let patient = self.load_patient(patient_id).await?;
        authorize(actor, Action::ViewTransfers, &Scope::branch(&patient.branch_id))?;
        Ok(patient)
    }

    /// Committed reassignments of one patient, newest first.
    pub async fn transfer_history(
        &self,
        patient_id: &str,
        actor: &Actor,
    ) -> Result<Vec<TransferRecord>> {
        let patient = self.load_patient(patient_id).await?;
        let mut records = self.history.list_for_patient(patient_id).await?;
        let visible = actor.role.is_network_wide()
            || actor.belongs_to(&patient.branch_id)
            || records
                .iter()
                .any(|r| actor.belongs_to(&r.from_branch_id) || actor.belongs_to(&r.to_branch_id));
        if !visible {
            return Err(PhysioError::forbidden(format!(
                "transfer history of patient '{}' is outside your branch",
                patient_id
            )));
        }
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// All reassignments touching the actor's branch, newest first.
    pub async fn list_history(&self, actor: &Actor) -> Result<Vec<TransferRecord>> {
        let mut records: Vec<TransferRecord> = self
            .history
            .list_all()
            .await?
            .into_iter()
            .filter(|r| {
                actor.role.is_network_wide()
                    || actor.belongs_to(&r.from_branch_id)
                    || actor.belongs_to(&r.to_branch_id)
            })
            .collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Monthly transfer figures over the history visible to `actor`.
    pub async fn transfer_stats(
        &self,
        actor: &Actor,
        year: i32,
        month: u32,
    ) -> Result<TransferStats> {
        if !(1..=12).contains(&month) {
            return Err(PhysioError::validation(format!("invalid month {}", month)));
        }
        let records = self.list_history(actor).await?;
        Ok(reporting::transfer_stats(
            &records,
            year,
            month,
            self.settings.recent_history_limit,
        ))
    }

    /// Active patients `actor` could move now: no pending request, and the
    /// actor may either transfer them directly or file a request.
    pub async fn transferable_patients(&self, actor: &Actor) -> Result<Vec<Patient>> {
        let branch = if actor.role.is_network_wide() {
            None
        } else {
            match actor.branch_id.as_deref() {
                Some(b) => Some(b),
                None => return Ok(Vec::new()),
            }
        };

        let pending: std::collections::HashSet<String> = self
            .requests
            .list(&TransferFilter::pending())
            .await?
            .into_iter()
            .map(|r| r.patient_id)
            .collect();

        let mut patients: Vec<Patient> = self
            .patients
            .list_patients(branch)
            .await?
            .into_iter()
            .filter(|p| p.is_active && !pending.contains(&p.id))
            .filter(|p| {
                let scope = Scope::owned(&p.branch_id, &p.assigned_therapist_id);
                let may_request = (!actor.role.is_manager() || self.settings.allow_manager_requests)
                    && can(actor, Action::RequestTransfer, &scope);
                may_request || can(actor, Action::DirectTransfer, &scope)
            })
            .collect();
        patients.sort_by(|a, b| a.full_name.cmp(&b.full_name).then_with(|| a.id.cmp(&b.id)));
        Ok(patients)
    }

    // ============================================================================
    // Helpers
    // ============================================================================

    fn visible(&self, request: &TransferRequest, actor: &Actor) -> bool {
        actor.role.is_network_wide()
            || request.requested_by == actor.id
            || (can(actor, Action::ViewTransfers, &Scope::branch(&request.source_branch_id))
                || can(actor, Action::ViewTransfers, &Scope::branch(&request.target_branch_id)))
    }

    /// Manager authority over the source branch, and never one's own request.
    fn authorize_resolution(&self, request: &TransferRequest, actor: &Actor) -> Result<()> {
        authorize(
            actor,
            Action::ResolveTransfer,
            &Scope::branch(&request.source_branch_id),
        )?;
        if request.requested_by == actor.id {
            tracing::warn!(
                request_id = %request.id,
                actor_id = %actor.id,
                "Self-review of transfer request refused"
            );
            return Err(PhysioError::forbidden(
                "a transfer request cannot be reviewed by its requester",
            ));
        }
        Ok(())
    }

    async fn emit_resolved(&self, request: &TransferRequest, actor: &Actor, now: NaiveDateTime) {
        emit_quietly(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditEventType::TransferResolved,
                &request.id,
                &actor.id,
                now,
                json!({
                    "patient_id": request.patient_id,
                    "status": request.status,
                    "response_note": request.response_note,
                }),
            ),
        )
        .await;
    }

    async fn load_request(&self, request_id: &str) -> Result<TransferRequest> {
        self.requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| PhysioError::not_found("transfer request", request_id))
    }

    async fn load_patient(&self, patient_id: &str) -> Result<Patient> {
        self.patients
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| PhysioError::not_found("patient", patient_id))
    }

    async fn load_active_therapist(&self, therapist_id: &str) -> Result<Therapist> {
        let therapist = self
            .therapists
            .find_therapist(therapist_id)
            .await?
            .ok_or_else(|| PhysioError::not_found("therapist", therapist_id))?;
        if !therapist.active {
            return Err(PhysioError::validation(format!(
                "therapist '{}' is inactive",
                therapist_id
            )));
        }
        Ok(therapist)
    }
}

fn ensure_moves(patient: &Patient, target: &Therapist) -> Result<()> {
    if !patient.is_active {
        return Err(PhysioError::validation(format!(
            "patient '{}' is inactive",
            patient.id
        )));
    }
    if patient.assigned_therapist_id == target.id {
        return Err(PhysioError::validation(format!(
            "patient '{}' is already assigned to therapist '{}'",
            patient.id, target.id
        )));
    }
    Ok(())
}

fn normalize(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn sort_newest_first(records: &mut [TransferRecord]) {
    records.sort_by(|a, b| {
        b.transferred_at
            .cmp(&a.transferred_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

//! Transport-neutral request router.
//!
//! `ClinicApi` takes a session token and an [`ApiRequest`], resolves the
//! caller once through the identity provider, dispatches to the scheduler or
//! coordinator and wraps the outcome in an [`ApiResponse`] carrying an
//! HTTP-style status. Any HTTP or RPC front end only has to (de)serialize
//! these two types.

use chrono::Datelike;
use physio_core::actor::{Actor, IdentityProvider, TherapistDirectory};
use physio_core::clock::Clock;
use physio_core::error::{PhysioError, Result};
use physio_core::reporting;
use physio_core::session::{NewSession, SessionScheduler};
use physio_core::timeslot;
use physio_core::transfer::{
    DirectTransfer, NewTransferRequest, TransferCoordinator, TransferFilter, TransferStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One call against the API surface, tagged by `route`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum ApiRequest {
    /// `POST session`
    CreateSession {
        patient: String,
        therapist: String,
        date: String,
        time: String,
        duration: u32,
        #[serde(default)]
        notes: Option<String>,
    },
    /// `POST session/{id}/confirm`
    ConfirmSession { id: String },
    /// `POST session/{id}/cancel`
    CancelSession {
        id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    /// `POST session/{id}/complete`
    CompleteSession {
        id: String,
        #[serde(default)]
        notes: Option<String>,
    },
    /// `POST session/{id}/no_show`
    NoShowSession { id: String },
    /// `GET session/{id}`
    GetSession { id: String },
    /// `GET session?date=&therapist=`
    ListSessions {
        date: String,
        #[serde(default)]
        therapist: Option<String>,
    },
    /// `GET therapist/{id}/slots?date=`
    AvailableSlots { therapist: String, date: String },
    /// `GET session/summary?date=`
    DailySummary { date: String },

    /// `POST transfer-request`
    CreateTransferRequest {
        patient: String,
        target_therapist: String,
        reason: String,
    },
    /// `POST transfer-request/{id}/approve`
    ApproveTransferRequest {
        id: String,
        #[serde(default)]
        response_note: Option<String>,
    },
    /// `POST transfer-request/{id}/reject`
    RejectTransferRequest {
        id: String,
        #[serde(default)]
        response_note: Option<String>,
    },
    /// `POST transfer-request/{id}/cancel`
    CancelTransferRequest { id: String },
    /// `GET transfer-request/{id}`
    GetTransferRequest { id: String },
    /// `GET transfer-request?status=&patient=&requested_by=&branch=`
    ListTransferRequests {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        patient: Option<String>,
        #[serde(default)]
        requested_by: Option<String>,
        #[serde(default)]
        branch: Option<String>,
    },
    /// `GET transfer-request/pending`
    PendingQueue,

    /// `POST patient/{id}/transfer`
    DirectTransfer {
        patient: String,
        target_therapist: String,
        #[serde(default)]
        reason: Option<String>,
    },
    /// `GET patient/{id}`
    GetPatient { id: String },
    /// `GET patient/{id}/transfers`
    TransferHistory { patient: String },
    /// `GET transfer-history`
    ListTransferHistory,
    /// `GET transfer-history/stats?year=&month=`
    TransferStats {
        #[serde(default)]
        year: Option<i32>,
        #[serde(default)]
        month: Option<u32>,
    },
    /// `GET patient/transferable`
    TransferablePatients,
    /// `GET therapist?branch=`
    ListTherapists {
        #[serde(default)]
        branch: Option<String>,
    },
}

impl ApiRequest {
    pub fn route(&self) -> &'static str {
        match self {
            Self::CreateSession { .. } => "create_session",
            Self::ConfirmSession { .. } => "confirm_session",
            Self::CancelSession { .. } => "cancel_session",
            Self::CompleteSession { .. } => "complete_session",
            Self::NoShowSession { .. } => "no_show_session",
            Self::GetSession { .. } => "get_session",
            Self::ListSessions { .. } => "list_sessions",
            Self::AvailableSlots { .. } => "available_slots",
            Self::DailySummary { .. } => "daily_summary",
            Self::CreateTransferRequest { .. } => "create_transfer_request",
            Self::ApproveTransferRequest { .. } => "approve_transfer_request",
            Self::RejectTransferRequest { .. } => "reject_transfer_request",
            Self::CancelTransferRequest { .. } => "cancel_transfer_request",
            Self::GetTransferRequest { .. } => "get_transfer_request",
            Self::ListTransferRequests { .. } => "list_transfer_requests",
            Self::PendingQueue => "pending_queue",
            Self::DirectTransfer { .. } => "direct_transfer",
            Self::GetPatient { .. } => "get_patient",
            Self::TransferHistory { .. } => "transfer_history",
            Self::ListTransferHistory => "list_transfer_history",
            Self::TransferStats { .. } => "transfer_stats",
            Self::TransferablePatients => "transferable_patients",
            Self::ListTherapists { .. } => "list_therapists",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable `ErrorKind` string.
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
            error: None,
        }
    }

    pub fn created(body: Value) -> Self {
        Self {
            status: 201,
            body: Some(body),
            error: None,
        }
    }

    pub fn from_error(err: &PhysioError) -> Self {
        let kind = err.kind();
        Self {
            status: kind.http_status(),
            body: None,
            error: Some(ApiError {
                kind: kind.as_str().to_string(),
                message: err.to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Stable error kind, if this is an error response.
    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.kind.as_str())
    }
}

/// Router over the scheduler and coordinator.
pub struct ClinicApi {
    scheduler: Arc<SessionScheduler>,
    coordinator: Arc<TransferCoordinator>,
    identity: Arc<dyn IdentityProvider>,
    therapists: Arc<dyn TherapistDirectory>,
    clock: Arc<dyn Clock>,
}

impl ClinicApi {
    pub fn new(
        scheduler: Arc<SessionScheduler>,
        coordinator: Arc<TransferCoordinator>,
        identity: Arc<dyn IdentityProvider>,
        therapists: Arc<dyn TherapistDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scheduler,
            coordinator,
            identity,
            therapists,
            clock,
        }
    }

    pub fn scheduler(&self) -> &SessionScheduler {
        &self.scheduler
    }

    pub fn coordinator(&self) -> &TransferCoordinator {
        &self.coordinator
    }

    /// Handles one request on behalf of the holder of `session_token`.
    pub async fn handle(&self, session_token: &str, request: ApiRequest) -> ApiResponse {
        let route = request.route();
        let actor = match self.identity.resolve_actor(session_token).await {
            Ok(actor) => actor,
            Err(e) => return ApiResponse::from_error(&e),
        };

        match self.dispatch(&actor, request).await {
            Ok(response) => {
                tracing::debug!(
                    route,
                    actor_id = %actor.id,
                    status = response.status,
                    "Request handled"
                );
                response
            }
            Err(e) => {
                tracing::debug!(
                    route,
                    actor_id = %actor.id,
                    kind = %e.kind(),
                    error = %e,
                    "Request failed"
                );
                ApiResponse::from_error(&e)
            }
        }
    }

    async fn dispatch(&self, actor: &Actor, request: ApiRequest) -> Result<ApiResponse> {
        let response = match request {
            ApiRequest::CreateSession {
                patient,
                therapist,
                date,
                time,
                duration,
                notes,
            } => {
                let request = NewSession {
                    patient_id: patient,
                    therapist_id: therapist,
                    date: timeslot::parse_date(&date)?,
                    time: timeslot::parse_time(&time)?,
                    duration_minutes: duration,
                    notes,
                };
                let session = self.scheduler.create_session(request, actor).await?;
                ApiResponse::created(to_json(&session)?)
            }
            ApiRequest::ConfirmSession { id } => {
                ApiResponse::ok(to_json(&self.scheduler.confirm(&id, actor).await?)?)
            }
            ApiRequest::CancelSession { id, reason } => {
                ApiResponse::ok(to_json(&self.scheduler.cancel(&id, actor, reason).await?)?)
            }
            ApiRequest::CompleteSession { id, notes } => {
                ApiResponse::ok(to_json(&self.scheduler.complete(&id, actor, notes).await?)?)
            }
            ApiRequest::NoShowSession { id } => {
                ApiResponse::ok(to_json(&self.scheduler.mark_no_show(&id, actor).await?)?)
            }
            ApiRequest::GetSession { id } => {
                ApiResponse::ok(to_json(&self.scheduler.get_session(&id, actor).await?)?)
            }
            ApiRequest::ListSessions { date, therapist } => {
                let date = timeslot::parse_date(&date)?;
                let day = self
                    .scheduler
                    .list_by_date(date, therapist.as_deref(), actor)
                    .await?;
                ApiResponse::ok(to_json(&day)?)
            }
            ApiRequest::AvailableSlots { therapist, date } => {
                let date = timeslot::parse_date(&date)?;
                let slots: Vec<String> = self
                    .scheduler
                    .available_slots(&therapist, date, actor)
                    .await?
                    .iter()
                    .map(|s| s.label())
                    .collect();
                ApiResponse::ok(to_json(&slots)?)
            }
            ApiRequest::DailySummary { date } => {
                let date = timeslot::parse_date(&date)?;
                let day = self.scheduler.list_by_date(date, None, actor).await?;
                let sessions: Vec<_> = day.sessions().map(|v| v.session.clone()).collect();
                let summary = reporting::daily_summary(&sessions, date, self.clock.now());
                ApiResponse::ok(to_json(&summary)?)
            }

            ApiRequest::CreateTransferRequest {
                patient,
                target_therapist,
                reason,
            } => {
                let request = NewTransferRequest {
                    patient_id: patient,
                    target_therapist_id: target_therapist,
                    reason,
                };
                let created = self.coordinator.create_request(request, actor).await?;
                ApiResponse::created(to_json(&created)?)
            }
            ApiRequest::ApproveTransferRequest { id, response_note } => ApiResponse::ok(to_json(
                &self.coordinator.approve(&id, actor, response_note).await?,
            )?),
            ApiRequest::RejectTransferRequest { id, response_note } => ApiResponse::ok(to_json(
                &self.coordinator.reject(&id, actor, response_note).await?,
            )?),
            ApiRequest::CancelTransferRequest { id } => {
                ApiResponse::ok(to_json(&self.coordinator.cancel(&id, actor).await?)?)
            }
            ApiRequest::GetTransferRequest { id } => {
                ApiResponse::ok(to_json(&self.coordinator.get_request(&id, actor).await?)?)
            }
            ApiRequest::ListTransferRequests {
                status,
                patient,
                requested_by,
                branch,
            } => {
                let status = status
                    .map(|s| s.parse::<TransferStatus>())
                    .transpose()
                    .map_err(PhysioError::validation)?;
                let filter = TransferFilter {
                    patient_id: patient,
                    status,
                    requested_by,
                    branch_id: branch,
                };
                ApiResponse::ok(to_json(&self.coordinator.list(&filter, actor).await?)?)
            }
            ApiRequest::PendingQueue => {
                ApiResponse::ok(to_json(&self.coordinator.pending_queue(actor).await?)?)
            }

            ApiRequest::DirectTransfer {
                patient,
                target_therapist,
                reason,
            } => {
                let transfer = DirectTransfer {
                    target_therapist_id: target_therapist,
                    reason,
                };
                ApiResponse::ok(to_json(
                    &self.coordinator.direct_transfer(&patient, transfer, actor).await?,
                )?)
            }
            ApiRequest::GetPatient { id } => {
                ApiResponse::ok(to_json(&self.coordinator.get_patient(&id, actor).await?)?)
            }
            ApiRequest::TransferHistory { patient } => ApiResponse::ok(to_json(
                &self.coordinator.transfer_history(&patient, actor).await?,
            )?),
            ApiRequest::ListTransferHistory => {
                ApiResponse::ok(to_json(&self.coordinator.list_history(actor).await?)?)
            }
            ApiRequest::TransferStats { year, month } => {
                let today = self.clock.now().date();
                let stats = self
                    .coordinator
                    .transfer_stats(
                        actor,
                        year.unwrap_or_else(|| today.year()),
                        month.unwrap_or_else(|| today.month()),
                    )
                    .await?;
                ApiResponse::ok(to_json(&stats)?)
            }
            ApiRequest::TransferablePatients => ApiResponse::ok(to_json(
                &self.coordinator.transferable_patients(actor).await?,
            )?),
            ApiRequest::ListTherapists { branch } => {
                let branch = branch.or_else(|| {
                    if actor.role.is_network_wide() {
                        None
                    } else {
                        actor.branch_id.clone()
                    }
                });
                let therapists = self.therapists.list_therapists(branch.as_deref()).await?;
                ApiResponse::ok(to_json(&therapists)?)
            }
        };
        Ok(response)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

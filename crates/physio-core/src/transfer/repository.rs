use super::model::{TransferFilter, TransferRecord, TransferRequest, TransferStatus};
use crate::error::{PhysioError, Result};
use async_trait::async_trait;

/// An abstract repository for transfer requests.
///
/// `insert_pending` and `resolve_pending` must check and write in one atomic
/// step against everything the store holds, including other processes.
#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn find_by_id(&self, request_id: &str) -> Result<Option<TransferRequest>>;

    /// Stores a new `PENDING` request.
    ///
    /// # Errors
    ///
    /// `DuplicatePending` if the patient already has one.
    async fn insert_pending(&self, request: &TransferRequest) -> Result<()>;

    /// Replaces a request that is still `PENDING` with its resolved form.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the stored request was resolved meanwhile,
    /// `NotFound` if it is gone.
    async fn resolve_pending(&self, resolved: &TransferRequest) -> Result<()>;

    /// Inserts or replaces a request unconditionally. Used for rollbacks.
    async fn save(&self, request: &TransferRequest) -> Result<()>;

    /// Requests matching `filter`, in no particular order.
    async fn list(&self, filter: &TransferFilter) -> Result<Vec<TransferRequest>>;

    /// The patient's `PENDING` request, if any.
    async fn find_pending_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Option<TransferRequest>>;
}

/// Append-only log of committed reassignments.
#[async_trait]
pub trait TransferHistory: Send + Sync {
    async fn append(&self, record: &TransferRecord) -> Result<()>;

    async fn list_for_patient(&self, patient_id: &str) -> Result<Vec<TransferRecord>>;

    async fn list_all(&self) -> Result<Vec<TransferRecord>>;
}

/// Rejects `request` if the stored requests already hold a pending one for
/// the same patient.
pub fn admit_pending<'a>(
    stored: impl IntoIterator<Item = &'a TransferRequest>,
    request: &TransferRequest,
) -> Result<()> {
    match stored
        .into_iter()
        .find(|r| r.patient_id == request.patient_id && r.is_pending() && r.id != request.id)
    {
        Some(existing) => Err(PhysioError::DuplicatePending {
            patient_id: request.patient_id.clone(),
            request_id: existing.id.clone(),
        }),
        None => Ok(()),
    }
}

/// Checks that the stored copy of `resolved` is still `PENDING`.
pub fn ensure_still_pending(
    stored: Option<&TransferRequest>,
    resolved: &TransferRequest,
) -> Result<()> {
    let current = stored.ok_or_else(|| PhysioError::not_found("transfer request", &resolved.id))?;
    if current.is_pending() {
        return Ok(());
    }
    let action = match resolved.status {
        TransferStatus::Approved => "approve",
        TransferStatus::Rejected => "reject",
        TransferStatus::Cancelled => "cancel",
        TransferStatus::Pending => "resolve",
    };
    Err(PhysioError::invalid_transition(
        "transfer request",
        current.status,
        action,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;

    fn request(id: &str, patient: &str, status: TransferStatus) -> TransferRequest {
        TransferRequest {
            id: id.into(),
            patient_id: patient.into(),
            requested_by: "t7".into(),
            source_therapist_id: "t7".into(),
            source_branch_id: "recife".into(),
            target_therapist_id: "t9".into(),
            target_branch_id: "saopaulo".into(),
            reason: "relocation".into(),
            status,
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

    #[test]
    fn test_admit_pending_ignores_resolved_and_other_patients() {
        let stored = vec![
            request("r1", "p1", TransferStatus::Rejected),
            request("r2", "p2", TransferStatus::Pending),
        ];
        admit_pending(&stored, &request("r3", "p1", TransferStatus::Pending)).unwrap();

        let err = admit_pending(&stored, &request("r4", "p2", TransferStatus::Pending))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicatePending);
        assert!(err.to_string().contains("r2"));
    }

    #[test]
    fn test_resolution_requires_stored_pending() {
        let approved = request("r1", "p1", TransferStatus::Approved);

        let pending = request("r1", "p1", TransferStatus::Pending);
        ensure_still_pending(Some(&pending), &approved).unwrap();

        let rejected = request("r1", "p1", TransferStatus::Rejected);
        let err = ensure_still_pending(Some(&rejected), &approved).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let err = ensure_still_pending(None, &approved).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("unknown transfer status '{}'", other)),
        }
    }
}

/// A request to move a patient to another therapist, pending manager review.
///
/// Source fields capture the patient's assignment when the request was filed.
/// Once resolved the request is never modified again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: String,
    pub patient_id: String,
    pub requested_by: String,
    pub source_therapist_id: String,
    pub source_branch_id: String,
    pub target_therapist_id: String,
    pub target_branch_id: String,
    pub reason: String,
    pub status: TransferStatus,
    pub is_inter_branch: bool,
    #[serde(default)]
    pub response_note: Option<String>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub reviewed_at: Option<NaiveDateTime>,
}

impl TransferRequest {
    pub fn is_pending(&self) -> bool {
        self.status == TransferStatus::Pending
    }

    /// Whether either end of the transfer lies in `branch_id`.
    pub fn touches_branch(&self, branch_id: &str) -> bool {
        self.source_branch_id == branch_id || self.target_branch_id == branch_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransferRequest {
    pub patient_id: String,
    pub target_therapist_id: String,
    pub reason: String,
}

/// Manager-initiated reassignment that bypasses the request workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectTransfer {
    pub target_therapist_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Query over transfer requests. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferFilter {
    pub patient_id: Option<String>,
    pub status: Option<TransferStatus>,
    pub requested_by: Option<String>,
    /// Matches requests whose source or target branch is this one.
    pub branch_id: Option<String>,
}

impl TransferFilter {
    pub fn pending() -> Self {
        Self {
            status: Some(TransferStatus::Pending),
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &TransferRequest) -> bool {
        self.patient_id
            .as_deref()
            .is_none_or(|id| request.patient_id == id)
            && self.status.is_none_or(|s| request.status == s)
            && self
                .requested_by
                .as_deref()
                .is_none_or(|id| request.requested_by == id)
            && self
                .branch_id
                .as_deref()
                .is_none_or(|b| request.touches_branch(b))
    }
}

/// One committed reassignment, direct or through an approved request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: String,
    pub patient_id: String,
    pub from_therapist_id: String,
    pub from_branch_id: String,
    pub to_therapist_id: String,
    pub to_branch_id: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub performed_by: String,
    /// Set when the record stems from an approved request.
    #[serde(default)]
    pub request_id: Option<String>,
    pub inter_branch: bool,
    pub transferred_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(status: TransferStatus) -> TransferRequest {
        TransferRequest {
            id: "r1".into(),
            patient_id: "p1".into(),
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
    fn test_filter_matches_either_branch() {
        let r = request(TransferStatus::Pending);
        let by_target = TransferFilter {
            branch_id: Some("saopaulo".into()),
            ..TransferFilter::default()
        };
        assert!(by_target.matches(&r));
        let elsewhere = TransferFilter {
            branch_id: Some("natal".into()),
            ..TransferFilter::default()
        };
        assert!(!elsewhere.matches(&r));
    }

    #[test]
    fn test_filter_combines_fields() {
        let r = request(TransferStatus::Approved);
        assert!(!TransferFilter::pending().matches(&r));
        let f = TransferFilter {
            patient_id: Some("p1".into()),
            requested_by: Some("t7".into()),
            ..TransferFilter::default()
        };
        assert!(f.matches(&r));
    }

    #[test]
    fn test_status_parses_case_insensitively() {
        assert_eq!("pending".parse::<TransferStatus>(), Ok(TransferStatus::Pending));
        assert!("open".parse::<TransferStatus>().is_err());
    }
}

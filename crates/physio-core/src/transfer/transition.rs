//! Transfer-request state machine.
//!
//! ```text
//! PENDING --approve--> APPROVED   (atomic with patient reassignment)
//! PENDING --reject-->  REJECTED
//! PENDING --cancel-->  CANCELLED  (requester only)
//! ```

use super::model::{TransferRequest, TransferStatus};
use crate::error::{PhysioError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferTransition {
    Approve,
    Reject,
    Cancel,
}

const TRANSITIONS: &[(TransferStatus, TransferTransition, TransferStatus)] = &[
    (
        TransferStatus::Pending,
        TransferTransition::Approve,
        TransferStatus::Approved,
    ),
    (
        TransferStatus::Pending,
        TransferTransition::Reject,
        TransferStatus::Rejected,
    ),
    (
        TransferStatus::Pending,
        TransferTransition::Cancel,
        TransferStatus::Cancelled,
    ),
];

impl TransferTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
        }
    }

    pub fn target(&self, from: TransferStatus) -> Option<TransferStatus> {
        TRANSITIONS
            .iter()
            .find(|(src, t, _)| *src == from && t == self)
            .map(|(_, _, to)| *to)
    }
}

pub fn apply(request: &TransferRequest, transition: TransferTransition) -> Result<TransferStatus> {
    transition.target(request.status).ok_or_else(|| {
        PhysioError::invalid_transition("transfer request", request.status, transition.as_str())
    })
}

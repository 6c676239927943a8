//! Session state machine.
//!
//! ```text
//! SCHEDULED --confirm--> CONFIRMED
//! SCHEDULED --cancel-->  CANCELLED
//! CONFIRMED --cancel-->  CANCELLED
//! CONFIRMED --complete--> COMPLETED   (requires now >= scheduled time)
//! CONFIRMED --no_show-->  NO_SHOW     (requires now >= scheduled time)
//! ```

use super::model::{Session, SessionStatus};
use crate::actor::Action;
use crate::error::{PhysioError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTransition {
    Confirm,
    Cancel,
    Complete,
    NoShow,
}

/// `(from, transition, to)`. Anything not listed is illegal.
const TRANSITIONS: &[(SessionStatus, SessionTransition, SessionStatus)] = &[
    (
        SessionStatus::Scheduled,
        SessionTransition::Confirm,
        SessionStatus::Confirmed,
    ),
    (
        SessionStatus::Scheduled,
        SessionTransition::Cancel,
        SessionStatus::Cancelled,
    ),
    (
        SessionStatus::Confirmed,
        SessionTransition::Cancel,
        SessionStatus::Cancelled,
    ),
    (
        SessionStatus::Confirmed,
        SessionTransition::Complete,
        SessionStatus::Completed,
    ),
    (
        SessionStatus::Confirmed,
        SessionTransition::NoShow,
        SessionStatus::NoShow,
    ),
];

impl SessionTransition {
    pub const ALL: [SessionTransition; 4] = [
        SessionTransition::Confirm,
        SessionTransition::Cancel,
        SessionTransition::Complete,
        SessionTransition::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
            Self::Complete => "complete",
            Self::NoShow => "mark as no-show",
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Self::Confirm => Action::ConfirmSession,
            Self::Cancel => Action::CancelSession,
            Self::Complete => Action::CompleteSession,
            Self::NoShow => Action::MarkNoShow,
        }
    }

    /// Closing transitions may only fire once the session has started.
    pub fn requires_due(&self) -> bool {
        matches!(self, Self::Complete | Self::NoShow)
    }

    /// Target status from `from`, or `None` if the move is illegal.
    pub fn target(&self, from: SessionStatus) -> Option<SessionStatus> {
        TRANSITIONS
            .iter()
            .find(|(src, t, _)| *src == from && t == self)
            .map(|(_, _, to)| *to)
    }
}

/// Validates `transition` against `session` at `now` and returns the new status.
///
/// Legality is checked before the due-date rule, so completing a cancelled
/// future session reports `InvalidTransition` rather than `NotYetDue`.
pub fn apply(
    session: &Session,
    transition: SessionTransition,
    now: NaiveDateTime,
) -> Result<SessionStatus> {
    let to = transition.target(session.status).ok_or_else(|| {
        PhysioError::invalid_transition("session", session.status, transition.as_str())
    })?;

    if transition.requires_due() && now < session.starts_at() {
        return Err(PhysioError::NotYetDue {
            session_id: session.id.clone(),
            scheduled_at: session.starts_at().format("%Y-%m-%d %H:%M").to_string(),
        });
    }
    Ok(to)
}

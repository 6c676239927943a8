//! Error types for the physio coordinator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, caller-facing classification of a [`PhysioError`].
///
/// The string form returned by [`ErrorKind::as_str`] is part of the API
/// contract and must not change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    SlotConflict,
    InvalidTransition,
    NotYetDue,
    DuplicatePending,
    MissingReason,
    Forbidden,
    NotFound,
    ValidationError,
    /// A scope lock could not be acquired in time.
    LockTimeout,
    /// The backing store failed or is unavailable.
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlotConflict => "SlotConflict",
            Self::InvalidTransition => "InvalidTransition",
            Self::NotYetDue => "NotYetDue",
            Self::DuplicatePending => "DuplicatePending",
            Self::MissingReason => "MissingReason",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "NotFound",
            Self::ValidationError => "ValidationError",
            Self::LockTimeout => "LockTimeout",
            Self::Storage => "Storage",
        }
    }

    /// HTTP status code used by the API surface for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidTransition
            | Self::NotYetDue
            | Self::MissingReason
            | Self::ValidationError => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::SlotConflict | Self::DuplicatePending => 409,
            Self::LockTimeout | Self::Storage => 503,
        }
    }

    /// Only infrastructure faults may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout | Self::Storage)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared error type for the whole coordinator.
///
/// Every variant maps onto exactly one [`ErrorKind`]; messages are written for
/// display to the end user.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum PhysioError {
    /// The requested interval overlaps a booked session of the same therapist.
    #[error("This time slot is already booked for therapist '{therapist_id}' ({existing})")]
    SlotConflict {
        therapist_id: String,
        existing: String,
    },

    #[error("Cannot {action} a {entity} in status {from}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("Session '{session_id}' is scheduled for {scheduled_at} and cannot be closed yet")]
    NotYetDue {
        session_id: String,
        scheduled_at: String,
    },

    #[error("Patient '{patient_id}' already has a pending transfer request ({request_id})")]
    DuplicatePending {
        patient_id: String,
        request_id: String,
    },

    #[error("A reason is required: {0}")]
    MissingReason(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Timed out waiting for lock on {scope}")]
    LockTimeout { scope: String },

    /// Store or serialization failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PhysioError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn missing_reason(message: impl Into<String>) -> Self {
        Self::MissingReason(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        action: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            action,
        }
    }

    // ============================================================================
    // Classification
    // ============================================================================

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SlotConflict { .. } => ErrorKind::SlotConflict,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::NotYetDue { .. } => ErrorKind::NotYetDue,
            Self::DuplicatePending { .. } => ErrorKind::DuplicatePending,
            Self::MissingReason(_) => ErrorKind::MissingReason,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::LockTimeout { .. } => ErrorKind::LockTimeout,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for PhysioError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for PhysioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("JSON: {}", err))
    }
}

impl From<toml::de::Error> for PhysioError {
    fn from(err: toml::de::Error) -> Self {
        Self::Storage(format!("TOML: {}", err))
    }
}

impl From<toml::ser::Error> for PhysioError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Storage(format!("TOML: {}", err))
    }
}

/// A type alias for `Result<T, PhysioError>`.
pub type Result<T> = std::result::Result<T, PhysioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(ErrorKind::SlotConflict.as_str(), "SlotConflict");
        assert_eq!(ErrorKind::ValidationError.as_str(), "ValidationError");
        assert_eq!(
            PhysioError::validation("bad date").kind().as_str(),
            "ValidationError"
        );
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(PhysioError::missing_reason("x").kind().http_status(), 400);
        assert_eq!(PhysioError::forbidden("x").kind().http_status(), 403);
        assert_eq!(PhysioError::not_found("session", "s1").kind().http_status(), 404);
        let conflict = PhysioError::DuplicatePending {
            patient_id: "p1".into(),
            request_id: "r1".into(),
        };
        assert_eq!(conflict.kind().http_status(), 409);
        assert_eq!(PhysioError::storage("down").kind().http_status(), 503);
    }

    #[test]
    fn test_only_infrastructure_errors_are_retryable() {
        assert!(PhysioError::storage("down").is_retryable());
        assert!(
            PhysioError::LockTimeout {
                scope: "therapist:t1".into()
            }
            .is_retryable()
        );
        assert!(!PhysioError::forbidden("nope").is_retryable());
        assert!(!PhysioError::invalid_transition("session", "COMPLETED", "cancel").is_retryable());
    }
}

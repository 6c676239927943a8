//! Role gate: the single place where role-based permissions are decided.

use super::model::{Actor, Role};
use crate::error::{PhysioError, Result};
use serde::{Deserialize, Serialize};

/// Operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateSession,
    ConfirmSession,
    CancelSession,
    CompleteSession,
    MarkNoShow,
    ViewSchedule,
    RequestTransfer,
    CancelTransferRequest,
    ResolveTransfer,
    DirectTransfer,
    ViewTransfers,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSession => "create_session",
            Self::ConfirmSession => "confirm_session",
            Self::CancelSession => "cancel_session",
            Self::CompleteSession => "complete_session",
            Self::MarkNoShow => "mark_no_show",
            Self::ViewSchedule => "view_schedule",
            Self::RequestTransfer => "request_transfer",
            Self::CancelTransferRequest => "cancel_transfer_request",
            Self::ResolveTransfer => "resolve_transfer",
            Self::DirectTransfer => "direct_transfer",
            Self::ViewTransfers => "view_transfers",
        }
    }
}

/// What an action targets.
///
/// `owner_therapist_id` is the therapist the target belongs to: the patient's
/// assigned therapist for patient-level actions, the booked therapist for
/// session-level actions.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub branch_id: &'a str,
    pub owner_therapist_id: Option<&'a str>,
}

impl<'a> Scope<'a> {
    pub fn branch(branch_id: &'a str) -> Self {
        Self {
            branch_id,
            owner_therapist_id: None,
        }
    }

    pub fn owned(branch_id: &'a str, owner_therapist_id: &'a str) -> Self {
        Self {
            branch_id,
            owner_therapist_id: Some(owner_therapist_id),
        }
    }
}

/// Decides whether `actor` may perform `action` on `scope`.
pub fn can(actor: &Actor, action: Action, scope: &Scope<'_>) -> bool {
    use Action::*;

    let in_branch = actor.belongs_to(scope.branch_id);
    let owns = scope.owner_therapist_id == Some(actor.id.as_str());

    match actor.role {
        Role::ManagerGeneral => true,
        Role::ManagerBranch => in_branch,
        Role::Therapist => match action {
            CreateSession | ConfirmSession | CancelSession | CompleteSession
            | RequestTransfer | CancelTransferRequest => in_branch && owns,
            ViewSchedule | ViewTransfers => in_branch,
            MarkNoShow | ResolveTransfer | DirectTransfer => false,
        },
        Role::Receptionist => match action {
            CreateSession | ConfirmSession | CancelSession | RequestTransfer
            | CancelTransferRequest | ViewSchedule | ViewTransfers => in_branch,
            CompleteSession | MarkNoShow | ResolveTransfer | DirectTransfer => false,
        },
    }
}

/// [`can`] as a `Result`, producing a `Forbidden` error with context.
pub fn authorize(actor: &Actor, action: Action, scope: &Scope<'_>) -> Result<()> {
    if can(actor, action, scope) {
        Ok(())
    } else {
        tracing::warn!(
            actor_id = %actor.id,
            role = %actor.role,
            action = action.as_str(),
            branch_id = scope.branch_id,
            "Authorization denied"
        );
        Err(PhysioError::forbidden(format!(
            "{} '{}' may not {} in branch '{}'",
            actor.role,
            actor.id,
            action.as_str(),
            scope.branch_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn general() -> Actor {
        Actor::new("mg", Role::ManagerGeneral, None)
    }

    fn branch_manager(branch: &str) -> Actor {
        Actor::new("mb", Role::ManagerBranch, Some(branch))
    }

    fn therapist(id: &str, branch: &str) -> Actor {
        Actor::new(id, Role::Therapist, Some(branch))
    }

    fn receptionist(branch: &str) -> Actor {
        Actor::new("rc", Role::Receptionist, Some(branch))
    }

    #[test]
    fn test_manager_general_can_do_everything_everywhere() {
        let actor = general();
        for action in [
            Action::CreateSession,
            Action::MarkNoShow,
            Action::ResolveTransfer,
            Action::DirectTransfer,
        ] {
            assert!(can(&actor, action, &Scope::branch("recife")));
            assert!(can(&actor, action, &Scope::branch("olinda")));
        }
    }

    #[test]
    fn test_branch_manager_is_scoped_to_own_branch() {
        let actor = branch_manager("recife");
        assert!(can(&actor, Action::ResolveTransfer, &Scope::branch("recife")));
        assert!(!can(&actor, Action::ResolveTransfer, &Scope::branch("olinda")));
        assert!(can(&actor, Action::DirectTransfer, &Scope::branch("recife")));
    }

    #[test]
    fn test_therapist_limited_to_own_patients() {
        let actor = therapist("t1", "recife");
        assert!(can(&actor, Action::CreateSession, &Scope::owned("recife", "t1")));
        assert!(!can(&actor, Action::CreateSession, &Scope::owned("recife", "t2")));
        assert!(can(&actor, Action::RequestTransfer, &Scope::owned("recife", "t1")));
        assert!(!can(&actor, Action::MarkNoShow, &Scope::owned("recife", "t1")));
        assert!(!can(&actor, Action::ResolveTransfer, &Scope::owned("recife", "t1")));
        assert!(can(&actor, Action::ViewSchedule, &Scope::branch("recife")));
    }

    #[test]
    fn test_receptionist_branch_wide_but_not_clinical_closure() {
        let actor = receptionist("recife");
        assert!(can(&actor, Action::CreateSession, &Scope::owned("recife", "t2")));
        assert!(can(&actor, Action::CancelSession, &Scope::branch("recife")));
        assert!(!can(&actor, Action::CreateSession, &Scope::branch("olinda")));
        assert!(!can(&actor, Action::CompleteSession, &Scope::branch("recife")));
        assert!(!can(&actor, Action::DirectTransfer, &Scope::branch("recife")));
    }

    #[test]
    fn test_authorize_reports_forbidden() {
        let err = authorize(
            &receptionist("recife"),
            Action::ResolveTransfer,
            &Scope::branch("recife"),
        )
        .unwrap_err();
        assert!(err.is_forbidden());
    }
}

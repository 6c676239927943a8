//! Identity and staff-directory collaborator interfaces.

use super::model::{Actor, Therapist};
use crate::error::Result;
use async_trait::async_trait;

/// Resolves the caller behind a request.
///
/// Implementations should return `PhysioError::Forbidden` for unknown or
/// expired tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_actor(&self, session_token: &str) -> Result<Actor>;
}

/// Read access to the therapist roster.
#[async_trait]
pub trait TherapistDirectory: Send + Sync {
    /// Finds a therapist by ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Therapist))`: therapist found
    /// - `Ok(None)`: no therapist with that ID
    async fn find_therapist(&self, therapist_id: &str) -> Result<Option<Therapist>>;

    /// Lists therapists, optionally restricted to one branch.
    async fn list_therapists(&self, branch_id: Option<&str>) -> Result<Vec<Therapist>>;
}

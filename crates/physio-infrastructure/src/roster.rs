//! Staff roster: the identity provider and therapist directory.
//!
//! The roster is a static TOML document maintained by the clinic network:
//!
//! ```toml
//! [[staff]]
//! token = "tok-rc"
//! id = "rc"
//! name = "Recepção Recife"
//! role = "RECEPTIONIST"
//! branch_id = "recife"
//!
//! [[therapists]]
//! id = "t7"
//! branch_id = "recife"
//!
//! [[patients]]
//! id = "p1"
//! assigned_therapist_id = "t7"
//! branch_id = "recife"
//! ```
//!
//! `patients` only seeds the patient store; the store owns them afterwards.

use async_trait::async_trait;
use physio_core::actor::{Actor, IdentityProvider, Role, Therapist, TherapistDirectory};
use physio_core::error::{PhysioError, Result};
use physio_core::patient::Patient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const ROSTER_FILE: &str = "roster.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffEntry {
    pub token: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub branch_id: Option<String>,
}

impl StaffEntry {
    fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role,
            branch_id: self.branch_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roster {
    pub staff: Vec<StaffEntry>,
    pub therapists: Vec<Therapist>,
    pub patients: Vec<Patient>,
}

impl Roster {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let roster: Self = toml::from_str(raw)?;
        roster.validate()?;
        Ok(roster)
    }

    /// Loads `<data_dir>/roster.toml`; an absent file is an empty roster.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(ROSTER_FILE);
        if !path.exists() {
            tracing::warn!(path = %path.display(), "No roster file; nobody can sign in");
            return Ok(Self::default());
        }
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Branch-scoped roles must name a branch, and tokens must be unique.
    fn validate(&self) -> Result<()> {
        let mut tokens = HashMap::new();
        for entry in &self.staff {
            if entry.role != Role::ManagerGeneral && entry.branch_id.is_none() {
                return Err(PhysioError::validation(format!(
                    "roster: {} '{}' needs a branch_id",
                    entry.role, entry.id
                )));
            }
            if let Some(other) = tokens.insert(entry.token.as_str(), entry.id.as_str()) {
                return Err(PhysioError::validation(format!(
                    "roster: '{}' and '{}' share a token",
                    other, entry.id
                )));
            }
        }
        Ok(())
    }
}

/// Roster-backed implementation of both staff collaborator traits.
pub struct RosterDirectory {
    by_token: HashMap<String, Actor>,
    therapists: HashMap<String, Therapist>,
}

impl RosterDirectory {
    pub fn new(roster: &Roster) -> Self {
        Self {
            by_token: roster
                .staff
                .iter()
                .map(|e| (e.token.clone(), e.actor()))
                .collect(),
            therapists: roster
                .therapists
                .iter()
                .map(|t| (t.id.clone(), t.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for RosterDirectory {
    async fn resolve_actor(&self, session_token: &str) -> Result<Actor> {
        self.by_token.get(session_token).cloned().ok_or_else(|| {
            tracing::warn!("Unknown session token");
            PhysioError::forbidden("unknown or expired session token")
        })
    }
}

#[async_trait]
impl TherapistDirectory for RosterDirectory {
    async fn find_therapist(&self, therapist_id: &str) -> Result<Option<Therapist>> {
        Ok(self.therapists.get(therapist_id).cloned())
    }

    async fn list_therapists(&self, branch_id: Option<&str>) -> Result<Vec<Therapist>> {
        let mut therapists: Vec<Therapist> = self
            .therapists
            .values()
            .filter(|t| branch_id.is_none_or(|b| t.branch_id == b))
            .cloned()
            .collect();
        therapists.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(therapists)
    }
}

//! Actor and staff domain models.

use serde::{Deserialize, Serialize};

/// Organizational role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Network-wide administrator.
    ManagerGeneral,
    /// Administrator of a single branch.
    ManagerBranch,
    Therapist,
    Receptionist,
}

impl Role {
    pub fn is_manager(&self) -> bool {
        matches!(self, Self::ManagerGeneral | Self::ManagerBranch)
    }

    /// Authority that is not bound to a single branch.
    pub fn is_network_wide(&self) -> bool {
        matches!(self, Self::ManagerGeneral)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManagerGeneral => "MANAGER_GENERAL",
            Self::ManagerBranch => "MANAGER_BRANCH",
            Self::Therapist => "THERAPIST",
            Self::Receptionist => "RECEPTIONIST",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of a coordinator operation, resolved once per request.
///
/// `branch_id` is `None` only for [`Role::ManagerGeneral`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub branch_id: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role, branch_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            role,
            branch_id: branch_id.map(str::to_string),
        }
    }

    pub fn belongs_to(&self, branch_id: &str) -> bool {
        self.branch_id.as_deref() == Some(branch_id)
    }
}

/// Clinical staff member who can be booked and assigned patients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Therapist {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub branch_id: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

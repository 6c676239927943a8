use serde::{Deserialize, Serialize};

/// A patient reference with its current therapist and branch assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    pub assigned_therapist_id: String,
    pub branch_id: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

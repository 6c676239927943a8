//! Actor domain module.
//!
//! # Module Structure
//!
//! - `model`: `Actor`, `Role` and `Therapist`
//! - `gate`: the role gate (`can`, `authorize`)
//! - `provider`: identity and therapist-directory collaborator traits

pub mod gate;
mod model;
mod provider;

pub use gate::{Action, Scope, authorize, can};
pub use model::{Actor, Role, Therapist};
pub use provider::{IdentityProvider, TherapistDirectory};

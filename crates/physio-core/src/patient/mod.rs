//! Patient assignment, as seen by the coordinator.
//!
//! Patients are owned by an external store; this module only defines the
//! attributes the coordinator reads and the single mutation it performs.

mod model;
mod store;

pub use model::Patient;
pub use store::PatientStore;

//! Domain core of the physiotherapy clinic coordinator: session scheduling,
//! transfer approval and the role gate that guards both.

pub mod actor;
pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod lock;
pub mod patient;
pub mod reporting;
pub mod session;
pub mod timeslot;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export common error type
pub use error::{ErrorKind, PhysioError, Result};

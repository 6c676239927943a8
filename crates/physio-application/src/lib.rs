//! Application layer for the clinic coordinator.
//!
//! This crate exposes the request router that front ends talk to and the
//! bootstrap that assembles it from configuration.

pub mod api;
pub mod bootstrap;

pub use api::{ApiError, ApiRequest, ApiResponse, ClinicApi};
pub use bootstrap::build_api;

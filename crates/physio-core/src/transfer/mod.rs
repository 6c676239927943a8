//! Patient transfers between therapists and branches.
//!
//! # Module Structure
//!
//! - `model`: `TransferRequest`, `TransferRecord`, filters and inputs
//! - `transition`: the request state machine
//! - `repository`: request repository and history log traits
//! - `coordinator`: `TransferCoordinator`, the only writer of patient assignments

mod coordinator;
mod model;
mod repository;
pub mod transition;

pub use coordinator::TransferCoordinator;
pub use model::{
    DirectTransfer, NewTransferRequest, TransferFilter, TransferRecord, TransferRequest,
    TransferStatus,
};
pub use repository::{TransferHistory, TransferRepository, admit_pending, ensure_still_pending};
pub use transition::TransferTransition;

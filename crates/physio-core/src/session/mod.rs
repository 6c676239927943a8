//! Treatment sessions.
//!
//! # Module Structure
//!
//! - `model`: `Session`, statuses and read views
//! - `transition`: the session state machine
//! - `repository`: persistence trait
//! - `scheduler`: `SessionScheduler`, the only writer of sessions

mod model;
mod repository;
mod scheduler;
pub mod transition;

pub use model::{
    DaySchedule, DisplayStatus, NewSession, Session, SessionStatus, SessionView, TimeGroup,
};
pub use repository::{SessionRepository, admit_booking};
pub use scheduler::SessionScheduler;
pub use transition::SessionTransition;

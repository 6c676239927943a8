pub mod audit;
pub mod config_loader;
pub mod memory;
pub mod paths;
pub mod roster;
pub mod storage;
pub mod toml_store;

pub use crate::audit::{ChannelAuditSink, FanoutAuditSink, TracingAuditSink};
pub use crate::memory::{
    MemoryPatientStore, MemorySessionRepository, MemoryTransferHistory, MemoryTransferRepository,
};
pub use crate::paths::PhysioPaths;
pub use crate::roster::{Roster, RosterDirectory};
pub use crate::toml_store::{
    TomlPatientStore, TomlSessionRepository, TomlTransferHistory, TomlTransferRepository,
};

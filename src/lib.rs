//! signlink — register synchronization and write-and-pulse engine for a
//! PLC-driven LED sign farm.
//!
//! The crate keeps a local view of named control values in sync with
//! word-addressed registers on a remote controller and commits configuration
//! changes with a read-modify-write followed by a handshake-bit pulse. The
//! presentation layer (a GUI, a TUI, a test harness) is an external
//! collaborator: it feeds display selections in and receives decoded values,
//! status samples and connection-state changes back over channels.

pub mod adapters;
pub mod core;
pub mod error;
pub mod usecase;

pub use crate::adapters::driver::{
    ControllerLink, DriverError, MockDriver, ModbusTcpDriver, SessionDriver,
};
pub use crate::core::codec;
pub use crate::core::model::{
    AuxRead, AuxValue, ControllerProfile, FlagAddress, RegisterTag, SessionState, StatusSample,
    TagValue, ValueDomain,
};
pub use crate::core::schema::RegisterSchema;
pub use crate::error::{CommitError, CommitStep, ConnectError, ConnectionError, InputError, IoError};
pub use crate::usecase::commit::RegisterEdit;
pub use crate::usecase::engine::{CommitOutcome, EngineChannels, SignEngine};
pub use crate::usecase::gateway::SessionGateway;
pub use crate::usecase::poller::StatusPoller;

//! Error taxonomy of the synchronization engine.
//!
//! Four families, matching how failures propagate: bad caller input, a
//! failed connect, a failed read/write against an established session, and
//! a failed write-and-pulse sequence. There is no retry logic anywhere in
//! this crate; recovery is always a fresh user-initiated connect or commit.

use std::fmt;

use thiserror::Error;

use crate::adapters::driver::DriverError;
use crate::core::codec::CodecError;

/// Caller input rejected before any I/O happens. Session state is untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("controller address must not be empty")]
    EmptyAddress,

    #[error("unknown register tag '{label}'")]
    UnknownTag { label: String },

    #[error(transparent)]
    Value(#[from] CodecError),
}

/// Establishing the session failed. State remains `Disconnected`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to connect to controller: {0}")]
pub struct ConnectionError(#[from] pub DriverError);

/// Outcome of a connect attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// A read or write against an established session failed. The gateway drops
/// the session before surfacing this.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IoError {
    #[error("session is not connected")]
    NotConnected,

    #[error("controller i/o failed: {0}")]
    Driver(#[from] DriverError),
}

/// The six I/O operations of the write-and-pulse sequence, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitStep {
    BlockRead,
    BlockWrite,
    PulseReadHigh,
    PulseWriteHigh,
    PulseReadLow,
    PulseWriteLow,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommitStep::BlockRead => "block read",
            CommitStep::BlockWrite => "block write",
            CommitStep::PulseReadHigh => "handshake read before raise",
            CommitStep::PulseWriteHigh => "handshake raise",
            CommitStep::PulseReadLow => "handshake read before clear",
            CommitStep::PulseWriteLow => "handshake clear",
        };
        f.write_str(name)
    }
}

/// The write-and-pulse sequence did not run to completion. Steps already
/// executed are not rolled back; in particular the handshake bit stays in
/// whatever state the last successful write left it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitError {
    #[error("cannot commit while disconnected")]
    NotConnected,

    #[error("commit failed during {step}: {source}")]
    Io {
        step: CommitStep,
        #[source]
        source: IoError,
    },
}

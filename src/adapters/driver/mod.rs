//! Controller session drivers.
//!
//! The controller's wire protocol is opaque to the engine: everything above
//! this seam talks to [`ControllerLink`], a connected session exposing block
//! and flag reads/writes, and obtains one through a [`SessionDriver`]. The
//! real transport is Modbus TCP; [`mock::MockDriver`] is an in-memory
//! controller for demos and tests.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::core::model::ControllerProfile;

pub mod mock;
pub mod modbus_tcp;

pub use mock::MockDriver;
pub use modbus_tcp::ModbusTcpDriver;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("timeout")]
    Timeout,

    #[error("comm error: {message}")]
    Comm { message: String },
}

pub type LinkFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, DriverError>> + Send + 'a>>;

pub type ConnectFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Box<dyn ControllerLink>, DriverError>> + Send + 'a>>;

/// A connected controller session.
///
/// Implementations are not required to be thread-safe; the session gateway
/// serializes every call behind one lock.
pub trait ControllerLink: Send {
    /// Read `len` bytes from a numbered data block at a byte offset.
    fn read_block<'a>(&'a mut self, block: u16, offset: u16, len: u16) -> LinkFuture<'a, Vec<u8>>;

    /// Write bytes to a numbered data block at a byte offset.
    fn write_block<'a>(
        &'a mut self,
        block: u16,
        offset: u16,
        bytes: &'a [u8],
    ) -> LinkFuture<'a, ()>;

    /// Read one flag from marker memory.
    fn read_bit<'a>(&'a mut self, byte_base: u16, bit: u8) -> LinkFuture<'a, bool>;

    /// Write one flag in marker memory.
    fn write_bit<'a>(&'a mut self, byte_base: u16, bit: u8, value: bool) -> LinkFuture<'a, ()>;
}

/// Opens controller sessions for a profile.
pub trait SessionDriver: Send + Sync {
    fn connect<'a>(&'a self, profile: &'a ControllerProfile) -> ConnectFuture<'a>;
}

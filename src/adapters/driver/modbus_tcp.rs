//! Modbus TCP transport for the controller session.
//!
//! The controller's numbered data blocks and marker flags are projected onto
//! the Modbus address space the way the site's protocol gateway exposes
//! them: data block `b` at byte offset `o` is holding register
//! `b * 256 + o / 2` (registers are big-endian 16-bit words), and marker
//! flag `(base, bit)` is coil `base * 8 + bit`.

use tokio_modbus::client::tcp;
use tokio_modbus::prelude::*;

use super::{ConnectFuture, ControllerLink, DriverError, LinkFuture, SessionDriver};
use crate::core::model::ControllerProfile;

/// Holding registers reserved per data block.
const BLOCK_REGISTER_SPAN: u16 = 256;

#[derive(Clone, Debug, Default)]
pub struct ModbusTcpDriver;

impl ModbusTcpDriver {
    pub fn new() -> Self {
        Self
    }
}

impl SessionDriver for ModbusTcpDriver {
    fn connect<'a>(&'a self, profile: &'a ControllerProfile) -> ConnectFuture<'a> {
        Box::pin(async move {
            let socket_addr = format!("{}:{}", profile.address, profile.port)
                .parse()
                .map_err(|e| DriverError::Comm {
                    message: format!("invalid socket addr: {e}"),
                })?;

            let ctx = tcp::connect_slave(socket_addr, Slave(profile.unit_id))
                .await
                .map_err(|e| DriverError::Comm {
                    message: e.to_string(),
                })?;

            Ok(Box::new(ModbusLink { ctx }) as Box<dyn ControllerLink>)
        })
    }
}

struct ModbusLink {
    ctx: tokio_modbus::client::Context,
}

fn register_addr(block: u16, offset: u16) -> Result<u16, DriverError> {
    if offset % 2 != 0 {
        return Err(DriverError::Comm {
            message: format!("byte offset {offset} is not word-aligned"),
        });
    }
    block
        .checked_mul(BLOCK_REGISTER_SPAN)
        .and_then(|base| base.checked_add(offset / 2))
        .ok_or_else(|| DriverError::Comm {
            message: format!("block {block} offset {offset} outside register space"),
        })
}

fn coil_addr(byte_base: u16, bit: u8) -> Result<u16, DriverError> {
    if bit > 7 {
        return Err(DriverError::Comm {
            message: format!("bit index {bit} out of range"),
        });
    }
    byte_base
        .checked_mul(8)
        .and_then(|base| base.checked_add(u16::from(bit)))
        .ok_or_else(|| DriverError::Comm {
            message: format!("marker byte {byte_base} outside coil space"),
        })
}

fn comm_err(e: impl std::fmt::Display) -> DriverError {
    DriverError::Comm {
        message: e.to_string(),
    }
}

impl ControllerLink for ModbusLink {
    fn read_block<'a>(&'a mut self, block: u16, offset: u16, len: u16) -> LinkFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let addr = register_addr(block, offset)?;
            let words = len.div_ceil(2);
            let registers = self
                .ctx
                .read_holding_registers(addr, words)
                .await
                .map_err(comm_err)?;

            let mut bytes = Vec::with_capacity(registers.len() * 2);
            for word in registers {
                bytes.extend_from_slice(&word.to_be_bytes());
            }
            bytes.truncate(len as usize);
            Ok(bytes)
        })
    }

    fn write_block<'a>(
        &'a mut self,
        block: u16,
        offset: u16,
        bytes: &'a [u8],
    ) -> LinkFuture<'a, ()> {
        Box::pin(async move {
            let addr = register_addr(block, offset)?;
            if bytes.len() % 2 != 0 {
                return Err(DriverError::Comm {
                    message: format!("write length {} is not word-aligned", bytes.len()),
                });
            }

            let words: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            self.ctx
                .write_multiple_registers(addr, &words)
                .await
                .map_err(comm_err)
        })
    }

    fn read_bit<'a>(&'a mut self, byte_base: u16, bit: u8) -> LinkFuture<'a, bool> {
        Box::pin(async move {
            let addr = coil_addr(byte_base, bit)?;
            let coils = self.ctx.read_coils(addr, 1).await.map_err(comm_err)?;
            coils.first().copied().ok_or_else(|| DriverError::Comm {
                message: "empty coil response".to_string(),
            })
        })
    }

    fn write_bit<'a>(&'a mut self, byte_base: u16, bit: u8, value: bool) -> LinkFuture<'a, ()> {
        Box::pin(async move {
            let addr = coil_addr(byte_base, bit)?;
            self.ctx
                .write_single_coil(addr, value)
                .await
                .map_err(comm_err)
        })
    }
}

//! In-memory controller for demos and tests.
//!
//! The driver and every link it hands out share one [`MockState`]: seeded
//! block contents, marker flags, a write journal in arrival order, and two
//! failure scripts (`fail_connects`, `fail_after` / `fail_reads_of_block`).
//! Unseeded blocks read as zeros, like a freshly initialized data block.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{ConnectFuture, ControllerLink, DriverError, LinkFuture, SessionDriver};
use crate::core::model::ControllerProfile;

/// One recorded write, with the (tokio) instant it arrived.
#[derive(Clone, Debug)]
pub struct MockWrite {
    pub target: WriteTarget,
    pub at: Instant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteTarget {
    Block {
        block: u16,
        offset: u16,
        bytes: Vec<u8>,
    },
    Bit {
        byte_base: u16,
        bit: u8,
        value: bool,
    },
}

#[derive(Debug, Default)]
pub struct MockState {
    pub blocks: HashMap<u16, Vec<u8>>,
    pub bits: HashMap<(u16, u8), bool>,
    pub writes: Vec<MockWrite>,
    /// Total I/O operations served (reads + writes, not connects).
    pub ops: u32,
    pub connects: u32,
    pub fail_connects: bool,
    /// Serve this many operations, then fail every one after.
    pub fail_after: Option<u32>,
    /// Fail every read of this block.
    pub fail_reads_of_block: Option<u16>,
}

impl MockState {
    fn take_op(&mut self, read_block: Option<u16>) -> Result<(), DriverError> {
        self.ops += 1;
        if let Some(limit) = self.fail_after {
            if self.ops > limit {
                return Err(scripted_failure());
            }
        }
        if let (Some(block), Some(target)) = (read_block, self.fail_reads_of_block) {
            if block == target {
                return Err(scripted_failure());
            }
        }
        Ok(())
    }

    pub fn write_targets(&self) -> Vec<WriteTarget> {
        self.writes.iter().map(|w| w.target.clone()).collect()
    }
}

fn scripted_failure() -> DriverError {
    DriverError::Comm {
        message: "scripted failure".to_string(),
    }
}

#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a block's contents before connecting.
    pub fn with_block(self, block: u16, bytes: Vec<u8>) -> Self {
        self.state.lock().blocks.insert(block, bytes);
        self
    }

    /// Seed a marker flag before connecting.
    pub fn with_bit(self, byte_base: u16, bit: u8, value: bool) -> Self {
        self.state.lock().bits.insert((byte_base, bit), value);
        self
    }

    /// Shared handle for scripting failures and inspecting the journal.
    pub fn state(&self) -> Arc<Mutex<MockState>> {
        Arc::clone(&self.state)
    }
}

impl SessionDriver for MockDriver {
    fn connect<'a>(&'a self, _profile: &'a ControllerProfile) -> ConnectFuture<'a> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.connects += 1;
            if state.fail_connects {
                return Err(DriverError::Comm {
                    message: "scripted connect failure".to_string(),
                });
            }
            drop(state);
            Ok(Box::new(MockLink {
                state: Arc::clone(&self.state),
            }) as Box<dyn ControllerLink>)
        })
    }
}

struct MockLink {
    state: Arc<Mutex<MockState>>,
}

impl ControllerLink for MockLink {
    fn read_block<'a>(&'a mut self, block: u16, offset: u16, len: u16) -> LinkFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.take_op(Some(block))?;

            let mut bytes = vec![0; len as usize];
            if let Some(stored) = state.blocks.get(&block) {
                for (i, slot) in bytes.iter_mut().enumerate() {
                    if let Some(byte) = stored.get(offset as usize + i) {
                        *slot = *byte;
                    }
                }
            }
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
            let mut state = self.state.lock();
            state.take_op(None)?;

            let end = offset as usize + bytes.len();
            let stored = state.blocks.entry(block).or_default();
            if stored.len() < end {
                stored.resize(end, 0);
            }
            stored[offset as usize..end].copy_from_slice(bytes);

            state.writes.push(MockWrite {
                target: WriteTarget::Block {
                    block,
                    offset,
                    bytes: bytes.to_vec(),
                },
                at: Instant::now(),
            });
            Ok(())
        })
    }

    fn read_bit<'a>(&'a mut self, byte_base: u16, bit: u8) -> LinkFuture<'a, bool> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.take_op(None)?;
            Ok(state.bits.get(&(byte_base, bit)).copied().unwrap_or(false))
        })
    }

    fn write_bit<'a>(&'a mut self, byte_base: u16, bit: u8, value: bool) -> LinkFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.take_op(None)?;
            state.bits.insert((byte_base, bit), value);
            state.writes.push(MockWrite {
                target: WriteTarget::Bit {
                    byte_base,
                    bit,
                    value,
                },
                at: Instant::now(),
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ControllerProfile {
        ControllerProfile::default()
    }

    #[tokio::test]
    async fn unseeded_blocks_read_as_zeros() {
        let driver = MockDriver::new();
        let mut link = driver.connect(&profile()).await.unwrap();
        assert_eq!(link.read_block(9, 4, 4).await.unwrap(), vec![0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn writes_are_journaled_in_order() {
        let driver = MockDriver::new();
        let mut link = driver.connect(&profile()).await.unwrap();

        link.write_block(54, 0, &[1, 2]).await.unwrap();
        link.write_bit(150, 0, true).await.unwrap();

        let state = driver.state();
        let targets = state.lock().write_targets();
        assert_eq!(
            targets,
            vec![
                WriteTarget::Block {
                    block: 54,
                    offset: 0,
                    bytes: vec![1, 2],
                },
                WriteTarget::Bit {
                    byte_base: 150,
                    bit: 0,
                    value: true,
                },
            ]
        );
    }

    #[tokio::test]
    async fn fail_after_script_fails_every_later_op() {
        let driver = MockDriver::new();
        let mut link = driver.connect(&profile()).await.unwrap();
        driver.state().lock().fail_after = Some(1);

        assert!(link.read_block(54, 0, 2).await.is_ok());
        assert!(link.read_block(54, 0, 2).await.is_err());
        assert!(link.write_bit(150, 0, true).await.is_err());
    }
}

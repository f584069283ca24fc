//! Static register schema of the sign farm.
//!
//! One contiguous block holds the whole configuration: a global brightness
//! word followed by a color/text word pair per panel. Each panel also
//! exposes one status word in its own block, read every poll cycle, and the
//! controller watches a single marker flag for the "new configuration"
//! handshake.

use std::collections::HashSet;

use thiserror::Error;

use super::model::{AuxRead, FlagAddress, RegisterTag, ValueDomain};

/// Block number of the panel configuration block.
pub const PANEL_BLOCK: u16 = 54;
/// First byte of the configuration block.
pub const PANEL_BLOCK_START: u16 = 0;
/// Size of the configuration block in bytes; covers the last tag word.
pub const PANEL_BLOCK_SIZE: u16 = 94;
/// Number of sign panels on the farm.
pub const PANEL_COUNT: u16 = 23;
/// Byte offset of the per-panel status word inside its block.
pub const AUX_STATUS_OFFSET: u16 = 18;
/// Marker address of the "configuration sent" handshake flag.
pub const HANDSHAKE_FLAG: FlagAddress = FlagAddress {
    byte_base: 150,
    bit: 0,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("tag {label} has odd byte offset {offset}")]
    MisalignedTag { label: String, offset: u16 },

    #[error("tag {label} at offset {offset} does not follow its neighbor (expected {expected})")]
    NonContiguousTag {
        label: String,
        offset: u16,
        expected: u16,
    },

    #[error("tag {label} at offset {offset} extends past the {size}-byte block")]
    TagOutsideBlock {
        label: String,
        offset: u16,
        size: u16,
    },

    #[error("duplicate auxiliary read target: block {block} offset {offset}")]
    DuplicateAuxRead { block: u16, offset: u16 },
}

/// The complete static schema: configuration tags, auxiliary reads and the
/// handshake address. Built once at startup; never mutated.
#[derive(Clone, Debug)]
pub struct RegisterSchema {
    pub block: u16,
    pub start: u16,
    pub size: u16,
    pub tags: Vec<RegisterTag>,
    pub aux_reads: Vec<AuxRead>,
    pub handshake: FlagAddress,
}

impl RegisterSchema {
    /// The sign-farm layout: `BRIGHTNESS` at offset 0, then
    /// `P{n}_COLOR`/`P{n}_TEXT` pairs for panels 1..=23, 2 bytes apart.
    pub fn sign_farm() -> Self {
        let mut tags = Vec::with_capacity(1 + 2 * PANEL_COUNT as usize);
        tags.push(RegisterTag {
            label: "BRIGHTNESS".to_string(),
            description: "global sign brightness".to_string(),
            offset: 0,
            domain: ValueDomain::Brightness,
        });
        for panel in 1..=PANEL_COUNT {
            tags.push(RegisterTag {
                label: format!("P{panel}_COLOR"),
                description: format!("panel {panel} text color"),
                offset: panel * 4 - 2,
                domain: ValueDomain::Color,
            });
            tags.push(RegisterTag {
                label: format!("P{panel}_TEXT"),
                description: format!("panel {panel} text variant"),
                offset: panel * 4,
                domain: ValueDomain::TextVariant,
            });
        }

        let aux_reads = (1..=PANEL_COUNT)
            .map(|panel| AuxRead {
                label: format!("P{panel}"),
                block: panel,
                offset: AUX_STATUS_OFFSET,
            })
            .collect();

        Self {
            block: PANEL_BLOCK,
            start: PANEL_BLOCK_START,
            size: PANEL_BLOCK_SIZE,
            tags,
            aux_reads,
            handshake: HANDSHAKE_FLAG,
        }
    }

    pub fn tag(&self, label: &str) -> Option<&RegisterTag> {
        self.tags.iter().find(|tag| tag.label == label)
    }

    /// Check the structural invariants: word-aligned tag offsets, strictly
    /// increasing with a neighbor distance of exactly 2 bytes, everything
    /// inside the block, and distinct auxiliary read targets.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (i, tag) in self.tags.iter().enumerate() {
            if tag.offset % 2 != 0 {
                return Err(SchemaError::MisalignedTag {
                    label: tag.label.clone(),
                    offset: tag.offset,
                });
            }
            let expected = self.start + 2 * i as u16;
            if tag.offset != expected {
                return Err(SchemaError::NonContiguousTag {
                    label: tag.label.clone(),
                    offset: tag.offset,
                    expected,
                });
            }
            if tag.offset + 2 > self.start + self.size {
                return Err(SchemaError::TagOutsideBlock {
                    label: tag.label.clone(),
                    offset: tag.offset,
                    size: self.size,
                });
            }
        }

        let mut seen = HashSet::new();
        for aux in &self.aux_reads {
            if !seen.insert((aux.block, aux.offset)) {
                return Err(SchemaError::DuplicateAuxRead {
                    block: aux.block,
                    offset: aux.offset,
                });
            }
        }

        Ok(())
    }
}

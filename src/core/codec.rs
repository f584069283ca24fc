//! Display-value codec: raw 16-bit register words <-> human-readable labels,
//! plus the big-endian register image used for block read-modify-write.
//!
//! Decode is total: a code outside a domain's mapping degrades to its
//! decimal string instead of failing. Encode accepts a mapped label, a plain
//! integer string, or the empty string (an untouched field, encoded as 0).
//! Pure and deterministic; safe to call from any thread.

use thiserror::Error;

use super::model::ValueDomain;

const BRIGHTNESS_LABELS: [&str; 5] = ["0%", "25%", "50%", "75%", "100%"];
const COLOR_LABELS: [&str; 6] = ["red", "yellow", "green", "cyan", "blue", "pink"];
const TEXT_LABELS: [&str; 3] = ["EUDR", "FSC", "REG"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("'{input}' is not a {domain:?} label or an integer")]
    Unparseable { domain: ValueDomain, input: String },
}

/// Display labels of a bounded domain, indexed by register code. `Raw` has
/// no mapping.
pub fn labels(domain: ValueDomain) -> &'static [&'static str] {
    match domain {
        ValueDomain::Brightness => &BRIGHTNESS_LABELS,
        ValueDomain::Color => &COLOR_LABELS,
        ValueDomain::TextVariant => &TEXT_LABELS,
        ValueDomain::Raw => &[],
    }
}

/// Decode a raw register word to its display string.
pub fn decode(domain: ValueDomain, raw: i16) -> String {
    let table = labels(domain);
    match usize::try_from(raw) {
        Ok(idx) if idx < table.len() => table[idx].to_string(),
        _ => raw.to_string(),
    }
}

/// Encode a display string back to a register word.
///
/// Lookup order: exact label match, then plain integer parse. The empty
/// selection encodes to 0.
pub fn encode(domain: ValueDomain, display: &str) -> Result<i16, CodecError> {
    let display = display.trim();
    if display.is_empty() {
        return Ok(0);
    }
    if let Some(idx) = labels(domain).iter().position(|label| *label == display) {
        return Ok(idx as i16);
    }
    display.parse::<i16>().map_err(|_| CodecError::Unparseable {
        domain,
        input: display.to_string(),
    })
}

/// Render a handshake flag the way the status panel shows it.
pub fn bit_display(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

/// In-memory copy of a register block: big-endian 16-bit signed words in a
/// contiguous byte buffer.
///
/// Offsets come from the static schema; an out-of-range or misaligned offset
/// is a programming-contract violation and panics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterImage {
    bytes: Vec<u8>,
}

impl RegisterImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn zeroed(size: u16) -> Self {
        Self {
            bytes: vec![0; size as usize],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn get_i16(&self, offset: u16) -> i16 {
        let i = offset as usize;
        assert!(i + 2 <= self.bytes.len(), "offset {offset} outside register block");
        i16::from_be_bytes([self.bytes[i], self.bytes[i + 1]])
    }

    pub fn set_i16(&mut self, offset: u16, value: i16) {
        let i = offset as usize;
        assert!(i + 2 <= self.bytes.len(), "offset {offset} outside register block");
        self.bytes[i..i + 2].copy_from_slice(&value.to_be_bytes());
    }
}

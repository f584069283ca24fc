//! Stable data model and DTOs shared between the engine and a presentation
//! layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value domain of a register tag. Bounded domains carry a display mapping
/// in [`crate::core::codec`]; `Raw` is pass-through numeric.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValueDomain {
    Brightness,
    Color,
    TextVariant,
    Raw,
}

/// One named 16-bit signed slot inside the panel register block.
///
/// Tags form a static schema: the set is fixed at startup and only the
/// decoded values change at runtime.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTag {
    pub label: String,
    pub description: String,
    /// Byte offset within the block; always even and word-aligned.
    pub offset: u16,
    pub domain: ValueDomain,
}

/// One auxiliary status word, read every poll cycle: a 2-byte block read at
/// `(block, offset)`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuxRead {
    pub label: String,
    pub block: u16,
    pub offset: u16,
}

/// Address of a single flag in the controller's marker memory.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlagAddress {
    pub byte_base: u16,
    pub bit: u8,
}

/// Connection endpoint and timing for one controller.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerProfile {
    pub address: String,
    pub port: u16,
    pub unit_id: u8,
    pub poll_interval_ms: u64,
    pub pulse_dwell_ms: u64,
}

impl Default for ControllerProfile {
    fn default() -> Self {
        Self {
            address: "192.168.190.53".to_string(),
            port: 502,
            unit_id: 1,
            poll_interval_ms: 500,
            pulse_dwell_ms: 500,
        }
    }
}

/// Session connection state. Exactly one instance exists per engine,
/// published through the gateway's watch channel.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected,
}

/// One decoded auxiliary status value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuxValue {
    pub label: String,
    pub value: i16,
}

/// Immutable snapshot produced by one successful poll cycle. Superseded,
/// never mutated, by the next cycle's sample.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSample {
    pub handshake: bool,
    /// Auxiliary values in schema order.
    pub aux: Vec<AuxValue>,
    pub timestamp: DateTime<Utc>,
}

/// A decoded tag value handed to the presentation layer on reload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagValue {
    pub label: String,
    pub display: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_json_roundtrip_uses_camel_case() {
        let profile = ControllerProfile::default();

        let json = serde_json::to_string_pretty(&profile).unwrap();
        assert!(json.contains("\"pollIntervalMs\": 500"));
        assert!(json.contains("\"unitId\": 1"));
        assert!(!json.contains("unit_id"));

        let decoded: ControllerProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, profile);
    }

    #[test]
    fn status_sample_json_roundtrip() {
        let sample = StatusSample {
            handshake: true,
            aux: vec![AuxValue {
                label: "P1".to_string(),
                value: -7,
            }],
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"handshake\":true"));
        assert!(json.contains("\"label\":\"P1\""));

        let decoded: StatusSample = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, sample);
    }
}

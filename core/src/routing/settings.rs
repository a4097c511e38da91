//! Per-node routing settings
//!
//! Settings shared by both protocol engines:
//! - Wire format used to encode routing payloads
//! - Upper bound on encoded payload size (both directions)
//! - Hop limit for distance-vector paths

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Errors that can occur during settings validation
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsError {
    #[error("Invalid message size limit: must be at least {min}, got {got}")]
    InvalidMessageLimit { min: usize, got: usize },

    #[error("Invalid hop limit: must be 1-255, got {0}")]
    InvalidHopLimit(usize),
}

// ============================================================================
// ENUMS
// ============================================================================

/// Encoding used for routing payloads on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// Compact binary encoding
    #[default]
    Bincode,
    /// Human-readable JSON, useful when tracing message traffic
    Json,
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bincode => write!(f, "bincode"),
            Self::Json => write!(f, "json"),
        }
    }
}

// ============================================================================
// ROUTING SETTINGS
// ============================================================================

/// Smallest accepted `max_message_bytes`
pub const MIN_MESSAGE_BYTES: usize = 64;

/// Largest accepted `max_path_hops`
pub const MAX_PATH_HOPS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Encoded payloads above this size are refused on encode and decode
    pub max_message_bytes: usize,

    /// Distance-vector paths longer than this are treated as unreachable
    pub max_path_hops: usize,

    pub wire_format: WireFormat,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            max_message_bytes: 256 * 1024,
            max_path_hops: 64,
            wire_format: WireFormat::Bincode,
        }
    }
}

impl RoutingSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_message_bytes < MIN_MESSAGE_BYTES {
            return Err(SettingsError::InvalidMessageLimit {
                min: MIN_MESSAGE_BYTES,
                got: self.max_message_bytes,
            });
        }

        if self.max_path_hops == 0 || self.max_path_hops > MAX_PATH_HOPS {
            return Err(SettingsError::InvalidHopLimit(self.max_path_hops));
        }

        Ok(())
    }

    pub fn with_wire_format(mut self, wire_format: WireFormat) -> Self {
        self.wire_format = wire_format;
        self
    }
}

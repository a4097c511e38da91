//! Routing protocol messages and serialization
//!
//! Two payload kinds travel between nodes:
//! - `DvAdvertisement`: a node's full distance vector, stamped with its logical clock
//! - `LinkRecord`: one flooded link fact, versioned by a per-link sequence number
//!
//! Payloads are size-limited on both encode and decode, and structurally
//! validated before an engine is allowed to touch its state.

use super::settings::{RoutingSettings, WireFormat};
use super::types::{Cost, LinkCost, LinkKey, NodeId, Path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A node's belief about its best route to one destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvEntry {
    pub cost: Cost,
    pub path: Path,
}

impl DvEntry {
    /// The entry every node holds for itself
    pub fn local() -> Self {
        Self {
            cost: Cost::ZERO,
            path: Vec::new(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            cost: Cost::Unreachable,
            path: Vec::new(),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.cost.is_reachable()
    }
}

/// Full distance vector sent to every direct neighbor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvAdvertisement {
    pub sender_id: NodeId,
    /// Sender's logical clock; strictly increases per sender
    pub timestamp: u64,
    pub entries: BTreeMap<NodeId, DvEntry>,
}

/// A flooded link fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub source: NodeId,
    pub destination: NodeId,
    pub latency: LinkCost,
    /// Per-link version; higher = newer
    pub seq: u64,
}

impl LinkRecord {
    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.source, self.destination)
    }
}

/// Any routing payload exchanged between nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingMessage {
    DistanceVector(DvAdvertisement),
    LinkState(LinkRecord),
}

impl RoutingMessage {
    /// Human-readable message kind, for logs
    pub fn message_type(&self) -> &'static str {
        match self {
            RoutingMessage::DistanceVector(_) => "DistanceVector",
            RoutingMessage::LinkState(_) => "LinkState",
        }
    }
}

/// Codec and validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Message too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Expected {expected} message, got {got}")]
    UnexpectedKind {
        expected: &'static str,
        got: &'static str,
    },

    #[error("Sender mismatch: payload claims {claimed}, transport reports {actual}")]
    SenderMismatch { claimed: NodeId, actual: NodeId },

    #[error("Invalid entry for destination {destination}: {reason}")]
    InvalidEntry {
        destination: NodeId,
        reason: &'static str,
    },

    #[error("Link record has identical endpoints ({0})")]
    SelfLoop(NodeId),

    #[error("Sender {0} is not a direct neighbor")]
    NotAdjacent(NodeId),
}

// ============================================================================
// CODEC
// ============================================================================

/// Serialize a routing message with the configured wire format
pub fn encode_message(
    msg: &RoutingMessage,
    settings: &RoutingSettings,
) -> Result<Vec<u8>, MessageError> {
    let bytes = match settings.wire_format {
        WireFormat::Bincode => bincode::serialize(msg)
            .map_err(|e| MessageError::Serialization(e.to_string()))?,
        WireFormat::Json => {
            serde_json::to_vec(msg).map_err(|e| MessageError::Serialization(e.to_string()))?
        }
    };

    if bytes.len() > settings.max_message_bytes {
        return Err(MessageError::TooLarge {
            size: bytes.len(),
            max: settings.max_message_bytes,
        });
    }

    Ok(bytes)
}

/// Deserialize bytes to a routing message
pub fn decode_message(
    bytes: &[u8],
    settings: &RoutingSettings,
) -> Result<RoutingMessage, MessageError> {
    if bytes.len() > settings.max_message_bytes {
        return Err(MessageError::TooLarge {
            size: bytes.len(),
            max: settings.max_message_bytes,
        });
    }

    match settings.wire_format {
        WireFormat::Bincode => bincode::deserialize(bytes)
            .map_err(|e| MessageError::Deserialization(e.to_string())),
        WireFormat::Json => {
            serde_json::from_slice(bytes).map_err(|e| MessageError::Deserialization(e.to_string()))
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

impl DvAdvertisement {
    /// Check the vector's shape against the path-vector rules
    ///
    /// The sender's own entry, if present, must be `{0, []}`. Every other
    /// entry is either `{Unreachable, []}` or a finite cost whose path ends
    /// at the destination, never mentions the sender and fits `max_hops`.
    pub fn validate(&self, max_hops: usize) -> Result<(), MessageError> {
        for (&destination, entry) in &self.entries {
            let invalid = |reason| MessageError::InvalidEntry {
                destination,
                reason,
            };

            if destination == self.sender_id {
                if *entry != DvEntry::local() {
                    return Err(invalid("sender's own entry must have zero cost and empty path"));
                }
                continue;
            }

            match entry.cost {
                Cost::Unreachable => {
                    if !entry.path.is_empty() {
                        return Err(invalid("unreachable entry carries a path"));
                    }
                }
                Cost::Finite(_) => {
                    if entry.path.last() != Some(&destination) {
                        return Err(invalid("path does not end at the destination"));
                    }
                    if entry.path.contains(&self.sender_id) {
                        return Err(invalid("path contains the sender"));
                    }
                    if entry.path.len() > max_hops {
                        return Err(invalid("path exceeds hop limit"));
                    }
                }
            }
        }

        Ok(())
    }
}

impl LinkRecord {
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.source == self.destination {
            return Err(MessageError::SelfLoop(self.source));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advertisement(sender_id: NodeId, entries: Vec<(NodeId, DvEntry)>) -> DvAdvertisement {
        DvAdvertisement {
            sender_id,
            timestamp: 1,
            entries: entries.into_iter().collect(),
        }
    }

    fn reach(cost: u64, path: Vec<NodeId>) -> DvEntry {
        DvEntry {
            cost: Cost::Finite(cost),
            path,
        }
    }

    #[test]
    fn test_dv_message_survives_both_wire_formats() {
        let msg = RoutingMessage::DistanceVector(advertisement(
            1,
            vec![(1, DvEntry::local()), (2, reach(3, vec![2])), (9, DvEntry::unreachable())],
        ));

        for format in [WireFormat::Bincode, WireFormat::Json] {
            let settings = RoutingSettings::default().with_wire_format(format);
            let bytes = encode_message(&msg, &settings).unwrap();
            assert_eq!(decode_message(&bytes, &settings).unwrap(), msg);
        }
    }

    #[test]
    fn test_json_payload_is_readable() {
        let settings = RoutingSettings::default().with_wire_format(WireFormat::Json);
        let msg = RoutingMessage::LinkState(LinkRecord {
            source: 1,
            destination: 2,
            latency: LinkCost::Remove,
            seq: 4,
        });
        let text = String::from_utf8(encode_message(&msg, &settings).unwrap()).unwrap();
        assert!(text.contains("\"seq\":4"));
        assert!(text.contains("Remove"));
    }

    #[test]
    fn test_reject_oversized_encode() {
        let settings = RoutingSettings {
            max_message_bytes: 64,
            ..Default::default()
        };
        let entries = (0..50).map(|d| (d, DvEntry::unreachable())).collect();
        let msg = RoutingMessage::DistanceVector(advertisement(0, entries));

        assert!(matches!(
            encode_message(&msg, &settings),
            Err(MessageError::TooLarge { max: 64, .. })
        ));
    }

    #[test]
    fn test_reject_oversized_decode() {
        let settings = RoutingSettings::default();
        let big = vec![0u8; settings.max_message_bytes + 1];
        assert!(matches!(
            decode_message(&big, &settings),
            Err(MessageError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_reject_garbage() {
        let settings = RoutingSettings::default().with_wire_format(WireFormat::Json);
        assert!(matches!(
            decode_message(b"{\"source\": 1}", &settings),
            Err(MessageError::Deserialization(_))
        ));
    }

    #[test]
    fn test_validate_accepts_well_formed_vector() {
        let adv = advertisement(
            1,
            vec![(1, DvEntry::local()), (3, reach(4, vec![2, 3])), (5, DvEntry::unreachable())],
        );
        assert!(adv.validate(64).is_ok());
    }

    #[test]
    fn test_validate_rejects_path_through_sender() {
        let adv = advertisement(1, vec![(3, reach(4, vec![1, 3]))]);
        assert!(matches!(
            adv.validate(64),
            Err(MessageError::InvalidEntry { destination: 3, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let nonzero_self = advertisement(1, vec![(1, reach(2, vec![]))]);
        assert!(nonzero_self.validate(64).is_err());

        let wrong_tail = advertisement(1, vec![(3, reach(2, vec![3, 2]))]);
        assert!(wrong_tail.validate(64).is_err());

        let unreachable_with_path = advertisement(
            1,
            vec![(3, DvEntry {
                cost: Cost::Unreachable,
                path: vec![3],
            })],
        );
        assert!(unreachable_with_path.validate(64).is_err());

        let too_long = advertisement(1, vec![(4, reach(3, vec![2, 3, 4]))]);
        assert!(too_long.validate(2).is_err());
    }

    #[test]
    fn test_link_record_self_loop_is_invalid() {
        let record = LinkRecord {
            source: 4,
            destination: 4,
            latency: LinkCost::Latency(1),
            seq: 0,
        };
        assert_eq!(record.validate(), Err(MessageError::SelfLoop(4)));
        assert_eq!(
            LinkRecord {
                destination: 2,
                ..record
            }
            .key(),
            LinkKey::new(2, 4)
        );
    }
}

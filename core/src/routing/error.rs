//! Errors raised by the routing engines

use super::message::MessageError;
use super::types::NodeId;
use thiserror::Error;

/// Errors surfaced by the routing engines
///
/// None of these are fatal. The offending event is dropped and the node's
/// state is left exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Malformed message from {from}: {source}")]
    Malformed {
        from: NodeId,
        #[source]
        source: MessageError,
    },

    #[error("Failed to encode outbound message: {0}")]
    Encode(#[from] MessageError),

    #[error("Node {0} cannot hold a link to itself")]
    SelfLink(NodeId),
}

impl RoutingError {
    pub fn malformed(from: NodeId, source: MessageError) -> Self {
        RoutingError::Malformed { from, source }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, RoutingError::Malformed { .. })
    }
}

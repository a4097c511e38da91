//! Per-node routing protocols
//!
//! Two interchangeable engines keep a node's forwarding table correct as
//! link costs change:
//! - Distance vector: advertise full paths to direct neighbors, reject any
//!   route that already contains this node
//! - Link state: flood versioned link facts everywhere, run SPF locally
//!
//! Both implement `RoutingNode`, so a driver can swap protocols without
//! touching its event loop.

pub mod distance_vector;
pub mod error;
pub mod link_state;
pub mod message;
pub mod node;
pub mod settings;
pub mod spf;
pub mod types;

pub use distance_vector::{DistanceVector, DistanceVectorNode, NeighborVector};
pub use error::RoutingError;
pub use link_state::LinkStateNode;
pub use message::{
    decode_message, encode_message, DvAdvertisement, DvEntry, LinkRecord, MessageError,
    RoutingMessage,
};
pub use node::{Outcome, RoutingNode, Transport};
pub use settings::{RoutingSettings, SettingsError, WireFormat};
pub use spf::{shortest_paths, Graph, ShortestPaths};
pub use types::{Cost, LinkCost, LinkKey, NodeId, Path, Route};

use serde::{Deserialize, Serialize};

/// Which routing protocol a node runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    DistanceVector,
    LinkState,
}

impl Protocol {
    /// Build a boxed node running this protocol
    pub fn build(self, id: NodeId, settings: RoutingSettings) -> Box<dyn RoutingNode> {
        match self {
            Protocol::DistanceVector => Box::new(DistanceVectorNode::with_settings(id, settings)),
            Protocol::LinkState => Box::new(LinkStateNode::with_settings(id, settings)),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DistanceVector => write!(f, "distance-vector"),
            Self::LinkState => write!(f, "link-state"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dv" | "distance_vector" | "distance-vector" => Ok(Protocol::DistanceVector),
            "ls" | "link_state" | "link-state" => Ok(Protocol::LinkState),
            other => Err(format!("unknown protocol '{}' (expected dv or ls)", other)),
        }
    }
}

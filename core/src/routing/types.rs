//! Identifiers, costs and paths shared by both routing protocols

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Node identifier
pub type NodeId = u32;

/// Hops from (but excluding) the owning node to a destination, nearest first
pub type Path = Vec<NodeId>;

/// Cost of a route
///
/// `Unreachable` is an explicit marker rather than an infinite float, so
/// comparisons stay total. The derived ordering places every finite cost
/// below `Unreachable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cost {
    Finite(u64),
    Unreachable,
}

impl Cost {
    pub const ZERO: Cost = Cost::Finite(0);

    pub fn is_reachable(&self) -> bool {
        matches!(self, Cost::Finite(_))
    }

    /// Finite value, if any
    pub fn value(&self) -> Option<u64> {
        match self {
            Cost::Finite(v) => Some(*v),
            Cost::Unreachable => None,
        }
    }
}

impl Add<u64> for Cost {
    type Output = Cost;

    fn add(self, rhs: u64) -> Cost {
        match self {
            Cost::Finite(v) => Cost::Finite(v.saturating_add(rhs)),
            Cost::Unreachable => Cost::Unreachable,
        }
    }
}

impl From<u64> for Cost {
    fn from(v: u64) -> Self {
        Cost::Finite(v)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Finite(v) => write!(f, "{}", v),
            Cost::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// A link cost update delivered by the driver
///
/// `Remove` deletes the link. It travels inside link-state records so peers
/// can retract the edge from their graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkCost {
    Latency(u64),
    Remove,
}

impl LinkCost {
    pub fn is_remove(&self) -> bool {
        matches!(self, LinkCost::Remove)
    }
}

impl fmt::Display for LinkCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkCost::Latency(v) => write!(f, "{}", v),
            LinkCost::Remove => write!(f, "remove"),
        }
    }
}

/// Unordered pair of link endpoints, stored as `(low, high)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkKey(NodeId, NodeId);

impl LinkKey {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            LinkKey(a, b)
        } else {
            LinkKey(b, a)
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// One row of a node's forwarding table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub destination: NodeId,
    pub next_hop: NodeId,
    pub cost: u64,
}

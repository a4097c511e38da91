//! The contract between routing engines and whatever drives them
//!
//! A driver (simulator, daemon, test) owns the nodes and the transport. It
//! feeds each node link events and received payloads; the node answers by
//! pushing payloads into the `Transport` it was handed for that call.

use super::error::RoutingError;
use super::types::{Cost, LinkCost, NodeId, Route};
use std::collections::BTreeMap;

/// Outbound primitives a node needs from its transport
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Unicast to one directly linked neighbor
    fn send_to_neighbor(&mut self, neighbor: NodeId, payload: Vec<u8>);

    /// Broadcast to every directly linked neighbor
    fn send_to_neighbors(&mut self, payload: Vec<u8>);

    /// Driver's logical clock
    fn current_logical_time(&self) -> u64;
}

/// What happened to an accepted, well-formed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Newer information; stored and acted on
    Applied,
    /// Already seen; dropped without side effects
    Duplicate,
    /// Older than what this node holds; dropped (LS also answers with its newer record)
    Stale,
}

/// Capability contract every routing protocol implementation exposes
///
/// Handlers run to completion on `&mut self`; a node never observes a second
/// event mid-handler. Nodes own all their state, so they can be moved to
/// whichever thread drives them.
pub trait RoutingNode: Send {
    fn id(&self) -> NodeId;

    /// A directly attached link changed cost, appeared, or was removed
    fn on_link_changed(
        &mut self,
        neighbor: NodeId,
        cost: LinkCost,
        transport: &mut dyn Transport,
    ) -> Result<(), RoutingError>;

    /// A payload arrived from the direct neighbor `from`
    fn on_message(
        &mut self,
        from: NodeId,
        payload: &[u8],
        transport: &mut dyn Transport,
    ) -> Result<Outcome, RoutingError>;

    /// Neighbor to forward to for `destination`, `None` if unknown or unreachable
    fn next_hop(&self, destination: NodeId) -> Option<NodeId>;

    /// Believed cost to `destination`
    fn distance(&self, destination: NodeId) -> Cost;

    /// Every reachable destination other than this node
    fn routing_table(&self) -> BTreeMap<NodeId, Route>;
}

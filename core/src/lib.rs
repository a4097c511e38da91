// meshroute core
//
// Per-node routing for a mesh of peers that only ever talk to their direct
// neighbors. Each node runs either a path-vector distance-vector engine or a
// flooding link-state engine behind the same `RoutingNode` contract, and
// keeps a correct next-hop table as links appear, change cost, or vanish.

pub mod routing;
pub mod simulation;

pub use routing::{
    Cost, LinkCost, NodeId, Outcome, Protocol, Route, RoutingError, RoutingNode, RoutingSettings,
    Transport,
};
pub use simulation::{Mismatch, Network, NetworkStats, SimulationError};

//! In-memory reference network for driving routing nodes
//!
//! Owns a set of nodes, the true topology and a FIFO delivery queue. Link
//! events are applied to the topology and reported to both endpoints;
//! payloads the nodes emit are queued and delivered one at a time, so each
//! node handles exactly one event at a time. A single FIFO queue gives
//! in-order delivery per link; payloads whose link vanished while in flight
//! are dropped.

use crate::routing::{
    shortest_paths, Cost, Graph, LinkCost, NodeId, Outcome, Protocol, RoutingError, RoutingNode,
    RoutingSettings, SettingsError, Transport,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Errors raised by the reference network itself
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error("Node {0} cannot be linked to itself")]
    SelfLink(NodeId),

    #[error("Network still busy after {limit} deliveries")]
    DidNotConverge { limit: usize },

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
}

/// Running counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub link_events: u64,
    pub sent: u64,
    pub delivered: u64,
    pub dropped_in_flight: u64,
    pub applied: u64,
    pub duplicates: u64,
    pub stale: u64,
    pub rejected: u64,
}

/// A source/destination pair whose forwarding disagrees with the true topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub source: NodeId,
    pub destination: NodeId,
    pub expected: Cost,
    /// Cost of the path obtained by following next hops
    pub actual: Cost,
}

#[derive(Debug, Clone)]
struct Delivery {
    from: NodeId,
    to: NodeId,
    payload: Vec<u8>,
}

/// Transport handed to one node for the duration of one handler
struct Outbox<'a> {
    from: NodeId,
    neighbors: Vec<NodeId>,
    clock: u64,
    queue: &'a mut VecDeque<Delivery>,
    sent: &'a mut u64,
}

impl Transport for Outbox<'_> {
    fn send_to_neighbor(&mut self, neighbor: NodeId, payload: Vec<u8>) {
        if !self.neighbors.contains(&neighbor) {
            debug!(from = self.from, to = neighbor, "unicast to non-neighbor dropped");
            return;
        }
        *self.sent += 1;
        self.queue.push_back(Delivery {
            from: self.from,
            to: neighbor,
            payload,
        });
    }

    fn send_to_neighbors(&mut self, payload: Vec<u8>) {
        for &neighbor in &self.neighbors {
            *self.sent += 1;
            self.queue.push_back(Delivery {
                from: self.from,
                to: neighbor,
                payload: payload.clone(),
            });
        }
    }

    fn current_logical_time(&self) -> u64 {
        self.clock
    }
}

/// Reference network of routing nodes
pub struct Network {
    protocol: Protocol,
    settings: RoutingSettings,
    nodes: BTreeMap<NodeId, Box<dyn RoutingNode>>,
    topology: Graph,
    queue: VecDeque<Delivery>,
    clock: u64,
    stats: NetworkStats,
}

impl Network {
    pub fn new(protocol: Protocol, settings: RoutingSettings) -> Result<Self, SimulationError> {
        settings.validate()?;
        Ok(Self {
            protocol,
            settings,
            nodes: BTreeMap::new(),
            topology: Graph::new(),
            queue: VecDeque::new(),
            clock: 0,
            stats: NetworkStats::default(),
        })
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats
    }

    pub fn topology(&self) -> &Graph {
        &self.topology
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn RoutingNode> {
        self.nodes.get(&id).map(|n| n.as_ref())
    }

    /// Add a node with no links; no-op if it already exists
    pub fn add_node(&mut self, id: NodeId) {
        let (protocol, settings) = (self.protocol, &self.settings);
        self.nodes
            .entry(id)
            .or_insert_with(|| protocol.build(id, settings.clone()));
    }

    /// Create or re-cost the link `a`-`b`, adding unknown nodes on the way
    pub fn set_link(&mut self, a: NodeId, b: NodeId, latency: u64) -> Result<(), SimulationError> {
        self.change_link(a, b, LinkCost::Latency(latency))
    }

    pub fn remove_link(&mut self, a: NodeId, b: NodeId) -> Result<(), SimulationError> {
        self.change_link(a, b, LinkCost::Remove)
    }

    pub fn change_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        cost: LinkCost,
    ) -> Result<(), SimulationError> {
        if a == b {
            return Err(SimulationError::SelfLink(a));
        }

        match cost {
            LinkCost::Latency(latency) => {
                self.add_node(a);
                self.add_node(b);
                self.topology.set_edge(a, b, latency);
            }
            LinkCost::Remove => {
                if !self.topology.remove_edge(a, b) {
                    debug!(a, b, "removing a link that does not exist");
                }
            }
        }

        self.stats.link_events += 1;
        for (node, neighbor) in [(a, b), (b, a)] {
            self.clock += 1;
            self.notify_link(node, neighbor, cost)?;
        }
        Ok(())
    }

    fn notify_link(
        &mut self,
        id: NodeId,
        neighbor: NodeId,
        cost: LinkCost,
    ) -> Result<(), SimulationError> {
        let neighbors: Vec<NodeId> = self.topology.neighbors(id).map(|(n, _)| n).collect();
        let Some(node) = self.nodes.get_mut(&id) else {
            return Ok(());
        };

        let mut outbox = Outbox {
            from: id,
            neighbors,
            clock: self.clock,
            queue: &mut self.queue,
            sent: &mut self.stats.sent,
        };
        node.on_link_changed(neighbor, cost, &mut outbox)?;
        Ok(())
    }

    /// Queue a raw payload as if `from` had sent it to `to`
    pub fn inject(&mut self, from: NodeId, to: NodeId, payload: Vec<u8>) {
        self.queue.push_back(Delivery { from, to, payload });
    }

    /// Deliver the oldest queued payload; returns `false` once the queue is empty
    pub fn step(&mut self) -> bool {
        let Some(delivery) = self.queue.pop_front() else {
            return false;
        };

        if self.topology.edge(delivery.from, delivery.to).is_none() {
            trace!(from = delivery.from, to = delivery.to, "link gone, dropping payload");
            self.stats.dropped_in_flight += 1;
            return true;
        }

        self.clock += 1;
        let neighbors: Vec<NodeId> = self
            .topology
            .neighbors(delivery.to)
            .map(|(n, _)| n)
            .collect();
        let Some(node) = self.nodes.get_mut(&delivery.to) else {
            self.stats.dropped_in_flight += 1;
            return true;
        };

        let mut outbox = Outbox {
            from: delivery.to,
            neighbors,
            clock: self.clock,
            queue: &mut self.queue,
            sent: &mut self.stats.sent,
        };
        let result = node.on_message(delivery.from, &delivery.payload, &mut outbox);

        self.stats.delivered += 1;
        match result {
            Ok(Outcome::Applied) => self.stats.applied += 1,
            Ok(Outcome::Duplicate) => self.stats.duplicates += 1,
            Ok(Outcome::Stale) => self.stats.stale += 1,
            Err(e) => {
                warn!(from = delivery.from, to = delivery.to, error = %e, "delivery rejected");
                self.stats.rejected += 1;
            }
        }
        true
    }

    /// Deliver until the queue drains
    ///
    /// Returns the number of deliveries made, or `DidNotConverge` once more
    /// than `max_deliveries` would be needed.
    pub fn run_until_quiet(&mut self, max_deliveries: usize) -> Result<usize, SimulationError> {
        let mut delivered = 0;
        while !self.queue.is_empty() {
            if delivered >= max_deliveries {
                return Err(SimulationError::DidNotConverge {
                    limit: max_deliveries,
                });
            }
            self.step();
            delivered += 1;
        }
        debug!(delivered, clock = self.clock, "network quiet");
        Ok(delivered)
    }

    pub fn next_hop(&self, source: NodeId, destination: NodeId) -> Option<NodeId> {
        self.nodes.get(&source)?.next_hop(destination)
    }

    pub fn distance(&self, source: NodeId, destination: NodeId) -> Cost {
        self.nodes
            .get(&source)
            .map_or(Cost::Unreachable, |n| n.distance(destination))
    }

    /// Follow next hops from `source`; `None` on a dead end or a loop
    pub fn route(&self, source: NodeId, destination: NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![source];
        let mut visited = BTreeSet::from([source]);
        let mut current = source;

        while current != destination {
            current = self.next_hop(current, destination)?;
            if !visited.insert(current) {
                return None;
            }
            path.push(current);
        }
        Some(path)
    }

    /// Sum of true link latencies along `path`
    pub fn path_cost(&self, path: &[NodeId]) -> Cost {
        path.windows(2)
            .try_fold(Cost::ZERO, |total, hop| {
                self.topology.edge(hop[0], hop[1]).map(|latency| total + latency)
            })
            .unwrap_or(Cost::Unreachable)
    }

    /// True shortest-path cost between every ordered pair of distinct nodes
    pub fn true_distances(&self) -> BTreeMap<(NodeId, NodeId), Cost> {
        let mut out = BTreeMap::new();
        for &source in self.nodes.keys() {
            let spf = shortest_paths(&self.topology, source);
            for &destination in self.nodes.keys() {
                if source != destination {
                    out.insert((source, destination), spf.distance_to(destination));
                }
            }
        }
        out
    }

    /// Every pair whose next-hop chain does not realise the true shortest cost
    pub fn verify(&self) -> Vec<Mismatch> {
        self.true_distances()
            .into_iter()
            .filter_map(|((source, destination), expected)| {
                let actual = self
                    .route(source, destination)
                    .map_or(Cost::Unreachable, |path| self.path_cost(&path));
                (actual != expected).then_some(Mismatch {
                    source,
                    destination,
                    expected,
                    actual,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(protocol: Protocol) -> Network {
        Network::new(protocol, RoutingSettings::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let settings = RoutingSettings {
            max_path_hops: 0,
            ..Default::default()
        };
        assert!(matches!(
            Network::new(Protocol::LinkState, settings),
            Err(SimulationError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_set_link_adds_nodes_and_queues_messages() {
        let mut net = network(Protocol::DistanceVector);
        net.set_link(1, 2, 3).unwrap();

        assert_eq!(net.node_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(net.topology().edge(1, 2), Some(3));
        assert!(net.pending() > 0);
        assert_eq!(net.stats().link_events, 1);
    }

    #[test]
    fn test_self_link_is_refused() {
        let mut net = network(Protocol::LinkState);
        assert_eq!(net.set_link(4, 4, 1), Err(SimulationError::SelfLink(4)));
    }

    #[test]
    fn test_in_flight_payloads_die_with_their_link() {
        let mut net = network(Protocol::LinkState);
        net.set_link(1, 2, 1).unwrap();
        let queued = net.pending();
        net.topology.remove_edge(1, 2);

        net.run_until_quiet(100).unwrap();
        assert_eq!(net.stats().dropped_in_flight, queued as u64);
        assert_eq!(net.stats().delivered, 0);
    }

    #[test]
    fn test_run_until_quiet_enforces_limit() {
        let mut net = network(Protocol::DistanceVector);
        net.set_link(1, 2, 1).unwrap();
        net.set_link(2, 3, 1).unwrap();

        assert_eq!(
            net.run_until_quiet(1),
            Err(SimulationError::DidNotConverge { limit: 1 })
        );
    }

    #[test]
    fn test_route_and_verify_on_line() {
        for protocol in [Protocol::DistanceVector, Protocol::LinkState] {
            let mut net = network(protocol);
            net.set_link(1, 2, 2).unwrap();
            net.set_link(2, 3, 2).unwrap();
            net.run_until_quiet(1_000).unwrap();

            assert_eq!(net.route(1, 3), Some(vec![1, 2, 3]));
            assert_eq!(net.path_cost(&[1, 2, 3]), Cost::Finite(4));
            assert!(net.verify().is_empty(), "{} did not converge", protocol);
        }
    }

    #[test]
    fn test_garbage_injection_is_counted_not_fatal() {
        let mut net = network(Protocol::DistanceVector);
        net.set_link(1, 2, 1).unwrap();
        net.run_until_quiet(100).unwrap();

        net.inject(1, 2, b"\xff\xff\xff\xff".to_vec());
        net.run_until_quiet(100).unwrap();

        assert_eq!(net.stats().rejected, 1);
        assert_eq!(net.next_hop(2, 1), Some(1));
    }
}

// Shared helpers for the convergence integration tests

#![allow(dead_code)]

use meshroute_core::routing::{Cost, NodeId, Protocol, RoutingSettings};
use meshroute_core::Network;
use std::collections::BTreeMap;

pub const PROTOCOLS: [Protocol; 2] = [Protocol::DistanceVector, Protocol::LinkState];

pub const MAX_DELIVERIES: usize = 100_000;

/// Build a converged network from an undirected edge list
pub fn converged(protocol: Protocol, edges: &[(NodeId, NodeId, u64)]) -> Network {
    converged_with(protocol, RoutingSettings::default(), edges)
}

pub fn converged_with(
    protocol: Protocol,
    settings: RoutingSettings,
    edges: &[(NodeId, NodeId, u64)],
) -> Network {
    let mut net = Network::new(protocol, settings).unwrap();
    for &(a, b, latency) in edges {
        net.set_link(a, b, latency).unwrap();
    }
    net.run_until_quiet(MAX_DELIVERIES).unwrap();
    net
}

/// All-pairs shortest paths, computed without touching the routing code
pub fn floyd_warshall(
    nodes: &[NodeId],
    edges: &BTreeMap<(NodeId, NodeId), u64>,
) -> BTreeMap<(NodeId, NodeId), Cost> {
    let mut dist: BTreeMap<(NodeId, NodeId), Option<u64>> = BTreeMap::new();
    for &a in nodes {
        for &b in nodes {
            dist.insert((a, b), if a == b { Some(0) } else { None });
        }
    }
    for (&(a, b), &w) in edges {
        dist.insert((a, b), Some(w));
        dist.insert((b, a), Some(w));
    }

    for &k in nodes {
        for &i in nodes {
            for &j in nodes {
                if let (Some(ik), Some(kj)) = (dist[&(i, k)], dist[&(k, j)]) {
                    let through = ik + kj;
                    if dist[&(i, j)].map_or(true, |d| through < d) {
                        dist.insert((i, j), Some(through));
                    }
                }
            }
        }
    }

    dist.into_iter()
        .filter(|((i, j), _)| i != j)
        .map(|(pair, d)| (pair, d.map_or(Cost::Unreachable, Cost::Finite)))
        .collect()
}

/// Assert that every node's forwarding matches the independent computation
pub fn assert_matches_reference(net: &Network, edges: &BTreeMap<(NodeId, NodeId), u64>) {
    let nodes: Vec<NodeId> = net.node_ids().collect();
    let expected = floyd_warshall(&nodes, edges);

    for (&(source, destination), &cost) in &expected {
        assert_eq!(
            net.distance(source, destination),
            cost,
            "{}: distance {} -> {}",
            net.protocol(),
            source,
            destination
        );

        let realised = net
            .route(source, destination)
            .map_or(Cost::Unreachable, |path| net.path_cost(&path));
        assert_eq!(
            realised,
            cost,
            "{}: forwarding {} -> {} along {:?}",
            net.protocol(),
            source,
            destination,
            net.route(source, destination)
        );
    }
}

/// Edge map keyed by ordered endpoints
pub fn edge_map(edges: &[(NodeId, NodeId, u64)]) -> BTreeMap<(NodeId, NodeId), u64> {
    edges
        .iter()
        .map(|&(a, b, w)| ((a.min(b), a.max(b)), w))
        .collect()
}

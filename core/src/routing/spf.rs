//! Shortest-path-first computation over an undirected latency graph
//!
//! Dijkstra with a binary heap keyed by `(distance, node)`. Ties are resolved
//! towards the lowest NodeId in two places:
//! - among equal tentative distances, the lowest node is settled first
//! - a node reachable at equal distance through several predecessors keeps
//!   the lowest-numbered predecessor
//!
//! so the same graph always yields the same tree.

use super::types::{Cost, NodeId};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

/// Symmetric adjacency map: node → neighbor → latency
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    adjacency: BTreeMap<NodeId, BTreeMap<NodeId, u64>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the edge in both directions
    pub fn set_edge(&mut self, a: NodeId, b: NodeId, latency: u64) {
        self.adjacency.entry(a).or_default().insert(b, latency);
        self.adjacency.entry(b).or_default().insert(a, latency);
    }

    /// Remove the edge in both directions; nodes left without edges disappear
    pub fn remove_edge(&mut self, a: NodeId, b: NodeId) -> bool {
        let removed = self.detach(a, b);
        self.detach(b, a);
        removed
    }

    fn detach(&mut self, from: NodeId, to: NodeId) -> bool {
        let Some(edges) = self.adjacency.get_mut(&from) else {
            return false;
        };
        let removed = edges.remove(&to).is_some();
        if edges.is_empty() {
            self.adjacency.remove(&from);
        }
        removed
    }

    pub fn edge(&self, a: NodeId, b: NodeId) -> Option<u64> {
        self.adjacency.get(&a).and_then(|edges| edges.get(&b)).copied()
    }

    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = (NodeId, u64)> + '_ {
        self.adjacency
            .get(&node)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(&n, &w)| (n, w)))
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|edges| edges.len()).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}

/// Result of a single-source run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortestPaths {
    source: NodeId,
    distances: BTreeMap<NodeId, u64>,
    predecessors: BTreeMap<NodeId, NodeId>,
}

impl ShortestPaths {
    pub fn distance_to(&self, target: NodeId) -> Cost {
        self.distances
            .get(&target)
            .map_or(Cost::Unreachable, |&d| Cost::Finite(d))
    }

    pub fn distances(&self) -> &BTreeMap<NodeId, u64> {
        &self.distances
    }

    pub fn predecessor(&self, target: NodeId) -> Option<NodeId> {
        self.predecessors.get(&target).copied()
    }

    /// Full path, source first and target last
    pub fn path_to(&self, target: NodeId) -> Option<Vec<NodeId>> {
        if !self.distances.contains_key(&target) {
            return None;
        }

        let mut path = vec![target];
        let mut current = target;
        while current != self.source {
            current = *self.predecessors.get(&current)?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// Neighbor of the source on the path to `target`
    pub fn first_hop(&self, target: NodeId) -> Option<NodeId> {
        if target == self.source {
            return None;
        }
        let mut current = target;
        loop {
            let prev = self.predecessor(current)?;
            if prev == self.source {
                return Some(current);
            }
            current = prev;
        }
    }
}

/// Single-source Dijkstra from `source`
///
/// The source is always present at distance 0, even when it has no edges.
pub fn shortest_paths(graph: &Graph, source: NodeId) -> ShortestPaths {
    let mut distances: BTreeMap<NodeId, u64> = BTreeMap::new();
    let mut predecessors: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut settled: BTreeSet<NodeId> = BTreeSet::new();
    let mut heap = BinaryHeap::new();

    distances.insert(source, 0);
    heap.push(Reverse((0u64, source)));

    while let Some(Reverse((dist, node))) = heap.pop() {
        if !settled.insert(node) {
            continue;
        }

        for (neighbor, latency) in graph.neighbors(node) {
            if settled.contains(&neighbor) {
                continue;
            }
            let candidate = dist.saturating_add(latency);

            match distances.get(&neighbor) {
                Some(&known) if candidate > known => {}
                Some(&known) if candidate == known => {
                    if predecessors.get(&neighbor).is_some_and(|&p| node < p) {
                        predecessors.insert(neighbor, node);
                    }
                }
                _ => {
                    distances.insert(neighbor, candidate);
                    predecessors.insert(neighbor, node);
                    heap.push(Reverse((candidate, neighbor)));
                }
            }
        }
    }

    ShortestPaths {
        source,
        distances,
        predecessors,
    }
}

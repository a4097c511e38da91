// Property tests: random connected topologies converge for both protocols

mod common;

use common::{assert_matches_reference, converged, MAX_DELIVERIES, PROTOCOLS};
use meshroute_core::routing::NodeId;
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Topology {
    edges: BTreeMap<(NodeId, NodeId), u64>,
}

impl Topology {
    fn edge_list(&self) -> Vec<(NodeId, NodeId, u64)> {
        self.edges.iter().map(|(&(a, b), &w)| (a, b, w)).collect()
    }
}

/// A random spanning tree plus extra chords; always connected
fn topology_strategy() -> impl Strategy<Value = Topology> {
    (2usize..=8).prop_flat_map(|n| {
        (
            prop::collection::vec((any::<Index>(), 0u64..=20), n - 1),
            prop::collection::vec((0..n, 0..n, 0u64..=20), 0..=n * 2),
        )
            .prop_map(|(tree, chords)| {
                let mut edges = BTreeMap::new();
                for (i, (parent, latency)) in tree.into_iter().enumerate() {
                    let child = i + 1;
                    let parent = parent.index(child);
                    edges.insert((parent as NodeId, child as NodeId), latency);
                }
                for (a, b, latency) in chords {
                    if a != b {
                        edges.insert(((a.min(b)) as NodeId, (a.max(b)) as NodeId), latency);
                    }
                }
                Topology { edges }
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 48, .. ProptestConfig::default() })]

    #[test]
    fn converges_to_shortest_paths(topology in topology_strategy()) {
        for protocol in PROTOCOLS {
            let net = converged(protocol, &topology.edge_list());
            assert_matches_reference(&net, &topology.edges);
            prop_assert_eq!(net.stats().rejected, 0);
        }
    }

    #[test]
    fn reconverges_after_link_removal(topology in topology_strategy(), pick in any::<Index>()) {
        let edges = topology.edge_list();
        let (a, b, _) = edges[pick.index(edges.len())];

        for protocol in PROTOCOLS {
            let mut net = converged(protocol, &edges);
            net.remove_link(a, b).unwrap();
            net.run_until_quiet(MAX_DELIVERIES).unwrap();

            let mut remaining = topology.edges.clone();
            remaining.remove(&(a, b));
            assert_matches_reference(&net, &remaining);
        }
    }

    #[test]
    fn reconverges_after_cost_change(
        topology in topology_strategy(),
        pick in any::<Index>(),
        latency in 0u64..=40,
    ) {
        let edges = topology.edge_list();
        let (a, b, _) = edges[pick.index(edges.len())];

        for protocol in PROTOCOLS {
            let mut net = converged(protocol, &edges);
            net.set_link(a, b, latency).unwrap();
            net.run_until_quiet(MAX_DELIVERIES).unwrap();

            let mut updated = topology.edges.clone();
            updated.insert((a, b), latency);
            assert_matches_reference(&net, &updated);
        }
    }
}

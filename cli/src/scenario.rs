// Scenario files for the meshroute CLI
//
// A scenario is a JSON document listing nodes and an ordered script of link
// events, convergence points and expectations:
//
// {
//   "protocol": "link_state",
//   "nodes": [1, 2, 3],
//   "steps": [
//     { "action": "set_link", "a": 1, "b": 2, "latency": 1 },
//     { "action": "converge" },
//     { "action": "expect", "source": 1, "destination": 2, "next_hop": 2 }
//   ]
// }

use anyhow::{Context, Result};
use meshroute_core::routing::{Cost, NodeId, Protocol, RoutingSettings};
use meshroute_core::{Mismatch, Network};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub protocol: Protocol,

    #[serde(default)]
    pub settings: RoutingSettings,

    /// Nodes that exist from the start, linked or not
    #[serde(default)]
    pub nodes: Vec<NodeId>,

    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    SetLink {
        a: NodeId,
        b: NodeId,
        latency: u64,
    },
    RemoveLink {
        a: NodeId,
        b: NodeId,
    },
    /// Deliver every queued message
    Converge,
    Expect {
        source: NodeId,
        destination: NodeId,
        #[serde(default)]
        next_hop: Option<NodeId>,
        #[serde(default)]
        distance: Option<u64>,
        /// Expect no route at all
        #[serde(default)]
        unreachable: bool,
    },
}

impl Scenario {
    /// Read and validate a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        self.settings
            .validate()
            .context("Invalid routing settings")?;

        let mut known: BTreeSet<NodeId> = self.nodes.iter().copied().collect();
        for (index, step) in self.steps.iter().enumerate() {
            let position = index + 1;
            match *step {
                Step::SetLink { a, b, .. } => {
                    if a == b {
                        anyhow::bail!("Step {}: node {} cannot link to itself", position, a);
                    }
                    known.insert(a);
                    known.insert(b);
                }
                Step::RemoveLink { a, b } => {
                    if a == b {
                        anyhow::bail!("Step {}: node {} cannot link to itself", position, a);
                    }
                }
                Step::Converge => {}
                Step::Expect {
                    source,
                    destination,
                    next_hop,
                    distance,
                    unreachable,
                } => {
                    for node in [source, destination] {
                        if !known.contains(&node) {
                            anyhow::bail!("Step {}: unknown node {}", position, node);
                        }
                    }
                    if unreachable && (next_hop.is_some() || distance.is_some()) {
                        anyhow::bail!(
                            "Step {}: 'unreachable' excludes 'next_hop' and 'distance'",
                            position
                        );
                    }
                    if !unreachable && next_hop.is_none() && distance.is_none() {
                        anyhow::bail!("Step {}: expectation checks nothing", position);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed scenario")
    }
}

/// Outcome of running a scenario to completion
pub struct Report {
    pub network: Network,
    pub deliveries: usize,
    pub failed_expectations: Vec<String>,
    /// Pairs whose forwarding disagrees with the true shortest paths
    pub mismatches: Vec<Mismatch>,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.failed_expectations.is_empty() && self.mismatches.is_empty()
    }
}

/// Play every step, then drain the network and compare against the topology
pub fn run(scenario: &Scenario, max_deliveries: usize) -> Result<Report> {
    let mut network = Network::new(scenario.protocol, scenario.settings.clone())?;
    for &node in &scenario.nodes {
        network.add_node(node);
    }

    let mut deliveries = 0;
    let mut failed_expectations = Vec::new();

    for (index, step) in scenario.steps.iter().enumerate() {
        let position = index + 1;
        debug!(position, ?step, "running step");
        match *step {
            Step::SetLink { a, b, latency } => network
                .set_link(a, b, latency)
                .with_context(|| format!("Step {}: set_link {}-{}", position, a, b))?,
            Step::RemoveLink { a, b } => network
                .remove_link(a, b)
                .with_context(|| format!("Step {}: remove_link {}-{}", position, a, b))?,
            Step::Converge => {
                deliveries += network
                    .run_until_quiet(max_deliveries)
                    .with_context(|| format!("Step {}: converge", position))?;
            }
            Step::Expect {
                source,
                destination,
                next_hop,
                distance,
                unreachable,
            } => {
                let actual_hop = network.next_hop(source, destination);
                let actual_distance = network.distance(source, destination);

                if unreachable && (actual_hop.is_some() || actual_distance.is_reachable()) {
                    failed_expectations.push(format!(
                        "step {}: {} -> {} expected unreachable, got next hop {:?} at {}",
                        position, source, destination, actual_hop, actual_distance
                    ));
                }
                if let Some(expected) = next_hop {
                    if actual_hop != Some(expected) {
                        failed_expectations.push(format!(
                            "step {}: {} -> {} expected next hop {}, got {:?}",
                            position, source, destination, expected, actual_hop
                        ));
                    }
                }
                if let Some(expected) = distance {
                    if actual_distance != Cost::Finite(expected) {
                        failed_expectations.push(format!(
                            "step {}: {} -> {} expected distance {}, got {}",
                            position, source, destination, expected, actual_distance
                        ));
                    }
                }
            }
        }
    }

    deliveries += network
        .run_until_quiet(max_deliveries)
        .context("Final convergence")?;
    let mismatches = network.verify();
    info!(
        deliveries,
        failed = failed_expectations.len(),
        mismatches = mismatches.len(),
        "scenario finished"
    );

    Ok(Report {
        network,
        deliveries,
        failed_expectations,
        mismatches,
    })
}

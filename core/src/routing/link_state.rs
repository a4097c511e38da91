//! Flooding link-state routing
//!
//! Every node floods raw link facts network-wide and keeps the newest record
//! per link, keyed by the unordered endpoint pair. The derived graph is kept
//! in step with the record database and next hops come from a fresh SPF run.
//!
//! Sequence numbers decide everything on receipt:
//! - unknown link or higher seq: store, apply, flood
//! - equal seq: already seen, flooding stops here
//! - lower seq: the sender is behind, answer it with our newer record

use super::error::RoutingError;
use super::message::{decode_message, encode_message, LinkRecord, MessageError, RoutingMessage};
use super::node::{Outcome, RoutingNode, Transport};
use super::settings::RoutingSettings;
use super::spf::{shortest_paths, Graph, ShortestPaths};
use super::types::{Cost, LinkCost, LinkKey, NodeId, Route};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, trace, warn};

/// Link-state routing node
#[derive(Debug, Clone)]
pub struct LinkStateNode {
    id: NodeId,
    settings: RoutingSettings,
    links: BTreeMap<LinkKey, LinkRecord>,
    graph: Graph,
    /// Neighbors with a live direct link
    adjacent: BTreeSet<NodeId>,
}

impl LinkStateNode {
    pub fn new(id: NodeId) -> Self {
        Self::with_settings(id, RoutingSettings::default())
    }

    pub fn with_settings(id: NodeId, settings: RoutingSettings) -> Self {
        Self {
            id,
            settings,
            links: BTreeMap::new(),
            graph: Graph::new(),
            adjacent: BTreeSet::new(),
        }
    }

    pub fn link_database(&self) -> &BTreeMap<LinkKey, LinkRecord> {
        &self.links
    }

    pub fn record(&self, a: NodeId, b: NodeId) -> Option<&LinkRecord> {
        self.links.get(&LinkKey::new(a, b))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn neighbors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacent.iter().copied()
    }

    /// SPF tree rooted at this node over the current graph
    pub fn shortest_paths(&self) -> ShortestPaths {
        shortest_paths(&self.graph, self.id)
    }

    fn apply(&mut self, record: LinkRecord) {
        match record.latency {
            LinkCost::Latency(latency) => {
                self.graph
                    .set_edge(record.source, record.destination, latency)
            }
            LinkCost::Remove => {
                self.graph.remove_edge(record.source, record.destination);
            }
        }
        self.links.insert(record.key(), record);
    }

    fn encode(&self, record: &LinkRecord) -> Result<Vec<u8>, RoutingError> {
        Ok(encode_message(
            &RoutingMessage::LinkState(record.clone()),
            &self.settings,
        )?)
    }

    fn reject(&self, from: NodeId, err: MessageError) -> RoutingError {
        warn!(node = self.id, from, error = %err, "dropping malformed routing message");
        RoutingError::malformed(from, err)
    }

    fn decode_record(&self, from: NodeId, payload: &[u8]) -> Result<LinkRecord, RoutingError> {
        let record = match decode_message(payload, &self.settings) {
            Ok(RoutingMessage::LinkState(record)) => record,
            Ok(other) => {
                return Err(self.reject(
                    from,
                    MessageError::UnexpectedKind {
                        expected: "LinkState",
                        got: other.message_type(),
                    },
                ))
            }
            Err(e) => return Err(self.reject(from, e)),
        };

        record.validate().map_err(|e| self.reject(from, e))?;
        Ok(record)
    }
}

impl RoutingNode for LinkStateNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn on_link_changed(
        &mut self,
        neighbor: NodeId,
        cost: LinkCost,
        transport: &mut dyn Transport,
    ) -> Result<(), RoutingError> {
        if neighbor == self.id {
            return Err(RoutingError::SelfLink(self.id));
        }
        if cost.is_remove() && !self.adjacent.contains(&neighbor) {
            debug!(node = self.id, neighbor, "ignoring removal of unknown link");
            return Ok(());
        }

        let key = LinkKey::new(self.id, neighbor);
        // Continue from the highest seq known for this link, whichever end minted it
        let seq = self.links.get(&key).map_or(0, |r| r.seq + 1);
        let record = LinkRecord {
            source: self.id,
            destination: neighbor,
            latency: cost,
            seq,
        };

        // Encode up front so a refused payload leaves state untouched
        let payload = self.encode(&record)?;
        let newly_adjacent = !cost.is_remove() && !self.adjacent.contains(&neighbor);
        let sync: Vec<Vec<u8>> = if newly_adjacent {
            self.links
                .values()
                .map(|r| self.encode(r))
                .collect::<Result<_, _>>()?
        } else {
            Vec::new()
        };

        if cost.is_remove() {
            self.adjacent.remove(&neighbor);
        } else {
            self.adjacent.insert(neighbor);
        }
        self.apply(record);

        debug!(node = self.id, neighbor, %cost, seq, newly_adjacent, "link changed");

        if newly_adjacent {
            trace!(node = self.id, neighbor, records = sync.len(), "syncing link database");
            for bytes in sync {
                transport.send_to_neighbor(neighbor, bytes);
            }
        }
        transport.send_to_neighbors(payload);
        Ok(())
    }

    fn on_message(
        &mut self,
        from: NodeId,
        payload: &[u8],
        transport: &mut dyn Transport,
    ) -> Result<Outcome, RoutingError> {
        let record = self.decode_record(from, payload)?;
        let key = record.key();

        let stored_seq = self.links.get(&key).map(|r| r.seq);
        match stored_seq {
            Some(seq) if record.seq == seq => {
                trace!(node = self.id, from, link = %key, seq, "duplicate record");
                Ok(Outcome::Duplicate)
            }
            Some(seq) if record.seq < seq => {
                debug!(
                    node = self.id,
                    from,
                    link = %key,
                    received = record.seq,
                    stored = seq,
                    "stale record, answering with newer one"
                );
                if let Some(stored) = self.links.get(&key) {
                    let reply = self.encode(stored)?;
                    transport.send_to_neighbor(from, reply);
                }
                Ok(Outcome::Stale)
            }
            _ => {
                debug!(
                    node = self.id,
                    from,
                    link = %key,
                    seq = record.seq,
                    latency = %record.latency,
                    "flooding record"
                );
                let flood = self.encode(&record)?;
                self.apply(record);
                transport.send_to_neighbors(flood);
                Ok(Outcome::Applied)
            }
        }
    }

    fn next_hop(&self, destination: NodeId) -> Option<NodeId> {
        if destination == self.id {
            return None;
        }
        self.shortest_paths().first_hop(destination)
    }

    fn distance(&self, destination: NodeId) -> Cost {
        self.shortest_paths().distance_to(destination)
    }

    fn routing_table(&self) -> BTreeMap<NodeId, Route> {
        let spf = self.shortest_paths();
        spf.distances()
            .iter()
            .filter(|&(&destination, _)| destination != self.id)
            .filter_map(|(&destination, &cost)| {
                Some((
                    destination,
                    Route {
                        destination,
                        next_hop: spf.first_hop(destination)?,
                        cost,
                    },
                ))
            })
            .collect()
    }
}

impl fmt::Display for LinkStateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "LS node {} ({} records, {} edges)",
            self.id,
            self.links.len(),
            self.graph.edge_count()
        )?;
        for (key, record) in &self.links {
            writeln!(
                f,
                "  {} = {} (seq {}, from {})",
                key, record.latency, record.seq, record.source
            )?;
        }
        Ok(())
    }
}

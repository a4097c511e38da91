//! Path-vector distance-vector routing
//!
//! Each node keeps:
//! - its outbound links (neighbor → cost)
//! - the latest vector advertised by each neighbor, with the neighbor's timestamp
//! - its own vector (destination → cost + full path), recomputed from the two above
//!
//! Whenever the vector's reachable routes change, the whole vector is sent to
//! every neighbor. Loops are prevented by inspecting advertised paths: a route
//! is only usable if this node does not already appear on it.

use super::error::RoutingError;
use super::message::{
    decode_message, encode_message, DvAdvertisement, DvEntry, MessageError, RoutingMessage,
};
use super::node::{Outcome, RoutingNode, Transport};
use super::settings::RoutingSettings;
use super::types::{Cost, LinkCost, NodeId, Route};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace, warn};

/// A node's own distance vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceVector {
    entries: BTreeMap<NodeId, DvEntry>,
    /// Logical clock of the last advertisement sent
    timestamp: u64,
}

impl DistanceVector {
    fn new(local_id: NodeId) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(local_id, DvEntry::local());
        Self {
            entries,
            timestamp: 0,
        }
    }

    pub fn entries(&self) -> &BTreeMap<NodeId, DvEntry> {
        &self.entries
    }

    pub fn get(&self, destination: NodeId) -> Option<&DvEntry> {
        self.entries.get(&destination)
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn reachable(&self) -> impl Iterator<Item = (&NodeId, &DvEntry)> {
        self.entries.iter().filter(|(_, entry)| entry.is_reachable())
    }
}

/// Cached copy of a neighbor's last accepted vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborVector {
    pub entries: BTreeMap<NodeId, DvEntry>,
    /// `None` until the neighbor's first advertisement arrives
    pub timestamp: Option<u64>,
}

impl NeighborVector {
    fn seeded(neighbor: NodeId) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(neighbor, DvEntry::local());
        Self {
            entries,
            timestamp: None,
        }
    }
}

/// Distance-vector routing node
#[derive(Debug, Clone)]
pub struct DistanceVectorNode {
    id: NodeId,
    settings: RoutingSettings,
    outbound_links: BTreeMap<NodeId, u64>,
    table: DistanceVector,
    neighbor_vectors: BTreeMap<NodeId, NeighborVector>,
}

impl DistanceVectorNode {
    pub fn new(id: NodeId) -> Self {
        Self::with_settings(id, RoutingSettings::default())
    }

    pub fn with_settings(id: NodeId, settings: RoutingSettings) -> Self {
        Self {
            id,
            settings,
            outbound_links: BTreeMap::new(),
            table: DistanceVector::new(id),
            neighbor_vectors: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &DistanceVector {
        &self.table
    }

    pub fn outbound_links(&self) -> &BTreeMap<NodeId, u64> {
        &self.outbound_links
    }

    pub fn neighbor_vector(&self, neighbor: NodeId) -> Option<&NeighborVector> {
        self.neighbor_vectors.get(&neighbor)
    }

    pub fn neighbors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.outbound_links.keys().copied()
    }

    /// Bellman-Ford relaxation over the cached neighbor vectors
    ///
    /// Neighbors are scanned in ascending NodeId order and only a strictly
    /// cheaper candidate replaces the current best, so equal-cost ties go to
    /// the lowest neighbor id. Returns whether any entry changed.
    pub fn recompute(&mut self) -> bool {
        let destinations: Vec<NodeId> = self
            .table
            .entries
            .keys()
            .copied()
            .filter(|&d| d != self.id)
            .collect();

        let mut changed = false;
        for destination in destinations {
            let best = self
                .best_candidate(destination)
                .unwrap_or_else(DvEntry::unreachable);

            if self.table.entries.get(&destination) != Some(&best) {
                trace!(
                    node = self.id,
                    destination,
                    cost = %best.cost,
                    path = ?best.path,
                    "route updated"
                );
                self.table.entries.insert(destination, best);
                changed = true;
            }
        }
        changed
    }

    fn best_candidate(&self, destination: NodeId) -> Option<DvEntry> {
        let mut best: Option<DvEntry> = None;

        for (&neighbor, &link_cost) in &self.outbound_links {
            let (cost, tail) = if neighbor == destination {
                (Cost::ZERO, &[] as &[NodeId])
            } else {
                let Some(advertised) = self
                    .neighbor_vectors
                    .get(&neighbor)
                    .and_then(|v| v.entries.get(&destination))
                else {
                    continue;
                };
                (advertised.cost, advertised.path.as_slice())
            };

            if !cost.is_reachable() || tail.contains(&self.id) {
                continue;
            }
            if tail.len() + 1 > self.settings.max_path_hops {
                continue;
            }

            let total = cost + link_cost;
            if best.as_ref().map_or(true, |b| total < b.cost) {
                let mut path = Vec::with_capacity(tail.len() + 1);
                path.push(neighbor);
                path.extend_from_slice(tail);
                best = Some(DvEntry { cost: total, path });
            }
        }

        best
    }

    /// Stamp the full vector and encode it for broadcast
    ///
    /// The timestamp moves strictly forward even when the driver's clock
    /// has not advanced since the previous advertisement. Nothing changes
    /// if encoding fails.
    fn stamp_advertisement(&mut self, now: u64) -> Result<Vec<u8>, RoutingError> {
        let timestamp = now.max(self.table.timestamp + 1);

        let msg = RoutingMessage::DistanceVector(DvAdvertisement {
            sender_id: self.id,
            timestamp,
            entries: self.table.entries.clone(),
        });
        let payload = encode_message(&msg, &self.settings)?;

        self.table.timestamp = timestamp;
        debug!(
            node = self.id,
            timestamp,
            destinations = self.table.entries.len(),
            "advertising distance vector"
        );
        Ok(payload)
    }

    /// Adopt `next` as this node's state, broadcasting its vector if asked
    ///
    /// The advertisement is encoded before anything is committed, so an
    /// encode failure leaves `self` exactly as it was.
    fn commit(
        &mut self,
        mut next: Self,
        advertise: bool,
        transport: &mut dyn Transport,
    ) -> Result<(), RoutingError> {
        let payload = if advertise {
            Some(next.stamp_advertisement(transport.current_logical_time())?)
        } else {
            None
        };

        *self = next;
        if let Some(payload) = payload {
            transport.send_to_neighbors(payload);
        }
        Ok(())
    }

    fn reject(&self, from: NodeId, err: MessageError) -> RoutingError {
        warn!(node = self.id, from, error = %err, "dropping malformed routing message");
        RoutingError::malformed(from, err)
    }

    fn decode_advertisement(
        &self,
        from: NodeId,
        payload: &[u8],
    ) -> Result<DvAdvertisement, RoutingError> {
        let adv = match decode_message(payload, &self.settings) {
            Ok(RoutingMessage::DistanceVector(adv)) => adv,
            Ok(other) => {
                return Err(self.reject(
                    from,
                    MessageError::UnexpectedKind {
                        expected: "DistanceVector",
                        got: other.message_type(),
                    },
                ))
            }
            Err(e) => return Err(self.reject(from, e)),
        };

        if adv.sender_id != from {
            return Err(self.reject(
                from,
                MessageError::SenderMismatch {
                    claimed: adv.sender_id,
                    actual: from,
                },
            ));
        }

        adv.validate(self.settings.max_path_hops)
            .map_err(|e| self.reject(from, e))?;
        Ok(adv)
    }
}

fn routes_changed(before: &DistanceVector, after: &DistanceVector) -> bool {
    !before.reachable().eq(after.reachable())
}

impl RoutingNode for DistanceVectorNode {
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

        let mut next = self.clone();
        let mut newly_adjacent = false;

        match cost {
            LinkCost::Remove => {
                if next.outbound_links.remove(&neighbor).is_none() {
                    debug!(node = self.id, neighbor, "ignoring removal of unknown link");
                    return Ok(());
                }
                next.neighbor_vectors.remove(&neighbor);
                next.table.entries.insert(neighbor, DvEntry::unreachable());
            }
            LinkCost::Latency(latency) => {
                if next.outbound_links.insert(neighbor, latency).is_none() {
                    newly_adjacent = true;
                    next.table.entries.insert(
                        neighbor,
                        DvEntry {
                            cost: Cost::Finite(latency),
                            path: vec![neighbor],
                        },
                    );
                    next.neighbor_vectors
                        .insert(neighbor, NeighborVector::seeded(neighbor));
                }
            }
        }

        debug!(node = self.id, neighbor, %cost, newly_adjacent, "link changed");
        next.recompute();

        // A new neighbor needs our vector even if none of our routes moved
        let advertise = newly_adjacent || routes_changed(&self.table, &next.table);
        self.commit(next, advertise, transport)
    }

    fn on_message(
        &mut self,
        from: NodeId,
        payload: &[u8],
        transport: &mut dyn Transport,
    ) -> Result<Outcome, RoutingError> {
        let adv = self.decode_advertisement(from, payload)?;
        if !self.outbound_links.contains_key(&from) {
            return Err(self.reject(from, MessageError::NotAdjacent(from)));
        }

        match self.neighbor_vectors.get(&from).and_then(|v| v.timestamp) {
            Some(cached) if adv.timestamp == cached => {
                trace!(node = self.id, from, timestamp = adv.timestamp, "duplicate vector");
                return Ok(Outcome::Duplicate);
            }
            Some(cached) if adv.timestamp < cached => {
                debug!(
                    node = self.id,
                    from,
                    timestamp = adv.timestamp,
                    cached,
                    "stale vector"
                );
                return Ok(Outcome::Stale);
            }
            _ => {}
        }

        let mut next = self.clone();
        for &destination in adv.entries.keys() {
            next.table
                .entries
                .entry(destination)
                .or_insert_with(DvEntry::unreachable);
        }
        next.neighbor_vectors.insert(
            from,
            NeighborVector {
                entries: adv.entries,
                timestamp: Some(adv.timestamp),
            },
        );

        next.recompute();
        let advertise = routes_changed(&self.table, &next.table);
        self.commit(next, advertise, transport)?;
        Ok(Outcome::Applied)
    }

    fn next_hop(&self, destination: NodeId) -> Option<NodeId> {
        self.table
            .get(destination)
            .filter(|entry| entry.is_reachable())
            .and_then(|entry| entry.path.first().copied())
    }

    fn distance(&self, destination: NodeId) -> Cost {
        self.table
            .get(destination)
            .map_or(Cost::Unreachable, |entry| entry.cost)
    }

    fn routing_table(&self) -> BTreeMap<NodeId, Route> {
        self.table
            .reachable()
            .filter_map(|(&destination, entry)| {
                Some((
                    destination,
                    Route {
                        destination,
                        next_hop: *entry.path.first()?,
                        cost: entry.cost.value()?,
                    },
                ))
            })
            .collect()
    }
}

impl fmt::Display for DistanceVectorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DV node {} (t={})", self.id, self.table.timestamp)?;
        writeln!(f, "  links: {:?}", self.outbound_links)?;
        for (destination, entry) in &self.table.entries {
            writeln!(f, "  {} -> {} via {:?}", destination, entry.cost, entry.path)?;
        }
        Ok(())
    }
}

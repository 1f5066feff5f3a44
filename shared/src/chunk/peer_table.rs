use std::collections::VecDeque;

use log::debug;

use super::change_bits::ChangeMask;
use crate::{constants::MAX_CONNECTED_PEERS, PeerId, Revision};

/// Position of a peer in a chunk's peer table. Also the bit used for that peer
/// in RPC relay and ack masks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerSlot(u8);

impl PeerSlot {
    pub(crate) fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn bit(self) -> u64 {
        1u64 << self.0
    }
}

#[derive(Clone, Copy, Debug)]
struct InFlightMarshal<M: ChangeMask> {
    revision: Revision,
    data_sets: M,
}

/// What a peer is known to hold. Created by the first marshal to that peer.
#[derive(Clone, Debug)]
pub struct PeerBaseline<M: ChangeMask> {
    pending: M,
    lost: M,
    last_marshalled: Revision,
    acked: Option<Revision>,
    in_flight: VecDeque<InFlightMarshal<M>>,
}

impl<M: ChangeMask> PeerBaseline<M> {
    fn new() -> Self {
        Self {
            pending: M::empty(),
            lost: M::empty(),
            last_marshalled: 0,
            acked: None,
            in_flight: VecDeque::new(),
        }
    }

    /// Fields changed since the last marshal to this peer, plus reliable
    /// fields whose carrying marshal was lost
    pub fn due(&self) -> M {
        self.pending.union(self.lost)
    }

    pub fn last_marshalled(&self) -> Revision {
        self.last_marshalled
    }

    pub fn acked(&self) -> Option<Revision> {
        self.acked
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn in_flight_mask(&self) -> M {
        self.in_flight
            .iter()
            .fold(M::empty(), |mask, marshal| mask.union(marshal.data_sets))
    }
}

#[derive(Clone, Debug)]
pub struct PeerEntry<M: ChangeMask> {
    peer: PeerId,
    baseline: Option<PeerBaseline<M>>,
}

impl<M: ChangeMask> PeerEntry<M> {
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn baseline(&self) -> Option<&PeerBaseline<M>> {
        self.baseline.as_ref()
    }
}

/// Peers a chunk relays to, each with its own baseline
pub struct PeerTable<M: ChangeMask> {
    slots: Vec<Option<PeerEntry<M>>>,
    max_in_flight: usize,
}

impl<M: ChangeMask> PeerTable<M> {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            slots: Vec::new(),
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Registers `peer`, returning its slot. `None` when every slot is taken.
    pub fn add(&mut self, peer: PeerId) -> Option<PeerSlot> {
        if let Some(slot) = self.slot_of(peer) {
            return Some(slot);
        }
        let entry = PeerEntry {
            peer,
            baseline: None,
        };
        if let Some(index) = self.slots.iter().position(Option::is_none) {
            self.slots[index] = Some(entry);
            return Some(PeerSlot(index as u8));
        }
        if self.slots.len() >= MAX_CONNECTED_PEERS {
            return None;
        }
        self.slots.push(Some(entry));
        Some(PeerSlot((self.slots.len() - 1) as u8))
    }

    pub fn remove(&mut self, peer: PeerId) -> Option<PeerSlot> {
        let slot = self.slot_of(peer)?;
        self.slots[slot.index()] = None;
        Some(slot)
    }

    pub fn slot_of(&self, peer: PeerId) -> Option<PeerSlot> {
        self.slots
            .iter()
            .position(|entry| matches!(entry, Some(entry) if entry.peer == peer))
            .map(|index| PeerSlot(index as u8))
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.slot_of(peer).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One bit per registered peer, by slot
    pub fn connected_mask(&self) -> u64 {
        self.iter().fold(0, |mask, (slot, _)| mask | slot.bit())
    }

    pub fn iter(&self) -> impl Iterator<Item = (PeerSlot, &PeerEntry<M>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.as_ref().map(|entry| (PeerSlot(index as u8), entry)))
    }

    pub fn baseline(&self, peer: PeerId) -> Option<&PeerBaseline<M>> {
        let slot = self.slot_of(peer)?;
        self.slots[slot.index()].as_ref()?.baseline.as_ref()
    }

    fn entry_mut(&mut self, peer: PeerId) -> Option<&mut PeerEntry<M>> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|entry| entry.peer == peer)
    }

    /// Marks a local change pending for every peer that already has a baseline
    pub fn mark_pending(&mut self, index: u8) {
        for entry in self.slots.iter_mut().flatten() {
            if let Some(baseline) = entry.baseline.as_mut() {
                baseline.pending = baseline.pending.with(index);
            }
        }
    }

    /// Records that `sent` was marshalled to `peer` at `revision`, creating the
    /// peer's baseline on first use
    pub fn record_marshal(&mut self, peer: PeerId, revision: Revision, sent: M) {
        let max_in_flight = self.max_in_flight;
        let Some(entry) = self.entry_mut(peer) else {
            return;
        };
        let baseline = entry.baseline.get_or_insert_with(PeerBaseline::new);
        baseline.pending = baseline.pending.difference(sent);
        baseline.lost = baseline.lost.difference(sent);
        baseline.last_marshalled = revision;
        if sent.is_clear() {
            return;
        }
        baseline.in_flight.push_back(InFlightMarshal {
            revision,
            data_sets: sent,
        });
        if baseline.in_flight.len() > max_in_flight {
            // oldest marshal is assumed delivered, it will never be reported
            if let Some(dropped) = baseline.in_flight.pop_front() {
                debug!(
                    "{} has {} unacknowledged marshals, forgetting revision {}",
                    peer, max_in_flight, dropped.revision
                );
            }
        }
    }

    /// Everything marshalled to `peer` at or before `revision` arrived
    pub fn acknowledge(&mut self, peer: PeerId, revision: Revision) -> bool {
        let Some(baseline) = self.entry_mut(peer).and_then(|entry| entry.baseline.as_mut()) else {
            return false;
        };
        baseline.acked = Some(baseline.acked.map_or(revision, |acked| acked.max(revision)));
        baseline.in_flight.retain(|marshal| marshal.revision > revision);
        true
    }

    /// The marshal(s) to `peer` at `revision` were lost. Their reliable fields
    /// are due again.
    pub fn notify_lost(&mut self, peer: PeerId, revision: Revision, reliable_fields: M) -> bool {
        let Some(baseline) = self.entry_mut(peer).and_then(|entry| entry.baseline.as_mut()) else {
            return false;
        };
        let mut lost = M::empty();
        baseline.in_flight.retain(|marshal| {
            if marshal.revision == revision {
                lost = lost.union(marshal.data_sets);
                false
            } else {
                true
            }
        });
        baseline.lost = baseline.lost.union(lost.intersect(reliable_fields));
        true
    }

    /// Fields pending or in flight for any peer
    pub fn outstanding(&self) -> M {
        self.baselines().fold(M::empty(), |mask, baseline| {
            mask.union(baseline.due()).union(baseline.in_flight_mask())
        })
    }

    /// Fields some baselined peer has not been sent yet
    pub fn pending_union(&self) -> M {
        self.baselines()
            .fold(M::empty(), |mask, baseline| mask.union(baseline.pending))
    }

    fn baselines(&self) -> impl Iterator<Item = &PeerBaseline<M>> {
        self.slots
            .iter()
            .flatten()
            .filter_map(|entry| entry.baseline.as_ref())
    }

    /// Every peer is treated as new again
    pub fn reset_baselines(&mut self) {
        for entry in self.slots.iter_mut().flatten() {
            entry.baseline = None;
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

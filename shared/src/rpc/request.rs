use crate::{chunk::PeerSlot, PeerId, Reliability, RpcDirection, RpcRequestId};

/// One queued RPC invocation with its per-peer relay state
#[derive(Clone, Debug)]
pub struct RpcRequest {
    id: RpcRequestId,
    rpc_index: u8,
    reliability: Reliability,
    direction: RpcDirection,
    payload: Vec<u8>,
    origin: Option<PeerId>,
    targets: u64,
    relayed: u64,
    acked: u64,
    drained: bool,
}

impl RpcRequest {
    pub(crate) fn new(
        rpc_index: u8,
        reliability: Reliability,
        direction: RpcDirection,
        payload: Vec<u8>,
        targets: u64,
    ) -> Self {
        Self {
            id: RpcRequestId(0),
            rpc_index,
            reliability,
            direction,
            payload,
            origin: None,
            targets,
            relayed: 0,
            acked: 0,
            drained: false,
        }
    }

    /// Marks the request as a relay of a call received from `origin`
    pub(crate) fn forwarded_from(mut self, origin: PeerId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub(crate) fn set_targets(&mut self, targets: u64) {
        self.targets = targets;
    }

    pub(crate) fn set_id(&mut self, id: RpcRequestId) {
        self.id = id;
    }

    pub fn id(&self) -> RpcRequestId {
        self.id
    }

    pub fn rpc_index(&self) -> u8 {
        self.rpc_index
    }

    pub fn reliability(&self) -> Reliability {
        self.reliability
    }

    pub fn direction(&self) -> RpcDirection {
        self.direction
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn origin(&self) -> Option<PeerId> {
        self.origin
    }

    pub fn targets(&self) -> u64 {
        self.targets
    }

    pub fn is_relayed_to(&self, slot: PeerSlot) -> bool {
        self.relayed & slot.bit() != 0
    }

    pub fn is_acked_by(&self, slot: PeerSlot) -> bool {
        self.acked & slot.bit() != 0
    }

    pub(crate) fn is_due_for(&self, slot: PeerSlot) -> bool {
        self.targets & slot.bit() != 0 && !self.is_relayed_to(slot)
    }

    pub(crate) fn mark_relayed(&mut self, slot: PeerSlot) {
        self.relayed |= slot.bit();
        self.drained = true;
    }

    pub(crate) fn mark_acked(&mut self, slot: PeerSlot) {
        self.acked |= slot.bit();
    }

    pub(crate) fn clear_relayed(&mut self, slot: PeerSlot) {
        self.relayed &= !slot.bit();
    }

    pub(crate) fn drop_target(&mut self, slot: PeerSlot) {
        self.targets &= !slot.bit();
        self.relayed &= !slot.bit();
        self.acked &= !slot.bit();
    }

    pub(crate) fn was_drained(&self) -> bool {
        self.drained
    }

    /// Every still-connected target has the request
    pub(crate) fn is_complete(&self, connected: u64) -> bool {
        let remaining = self.targets & connected;
        match self.reliability {
            Reliability::Reliable => self.acked & remaining == remaining,
            Reliability::Unreliable => self.relayed & remaining == remaining,
        }
    }
}

use std::fmt;

/// Monotonic change counter of a chunk. Bumped on every field change or RPC
/// enqueue.
pub type Revision = u64;

/// Position of a chunk within its owning Replica.
pub type ChunkIndex = u32;

/// Identifies one network participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaId(pub u32);

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replica#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RpcRequestId(pub u32);

impl RpcRequestId {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkRole {
    Primary,
    Proxy,
    Inactive,
}

impl ChunkRole {
    pub fn is_attached(self) -> bool {
        !matches!(self, ChunkRole::Inactive)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reliability {
    Reliable,
    Unreliable,
}

impl Reliability {
    pub fn is_reliable(self) -> bool {
        matches!(self, Reliability::Reliable)
    }
}

/// Upstream RPCs travel from a proxy to the primary, downstream RPCs from the
/// primary to its proxies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RpcDirection {
    Upstream,
    Downstream,
}

impl RpcDirection {
    /// The role a chunk must hold to send an RPC in this direction
    pub fn sender_role(self) -> ChunkRole {
        match self {
            RpcDirection::Upstream => ChunkRole::Proxy,
            RpcDirection::Downstream => ChunkRole::Primary,
        }
    }

    /// The role a chunk must hold to receive an RPC in this direction
    pub fn receiver_role(self) -> ChunkRole {
        match self {
            RpcDirection::Upstream => ChunkRole::Primary,
            RpcDirection::Downstream => ChunkRole::Proxy,
        }
    }
}

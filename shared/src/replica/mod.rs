mod ownership;

pub use ownership::{apply_ownership_change, change_replica_ownership, ChunkOwnership};

use crate::{PeerId, ReplicaId};

/// What a chunk needs to know about the Replica it is attached to
pub trait ReplicaInfo {
    fn replica_id(&self) -> ReplicaId;

    /// The local participant hosting this copy of the Replica
    fn peer_id(&self) -> PeerId;

    fn is_primary(&self) -> bool;

    fn is_proxy(&self) -> bool {
        !self.is_primary()
    }
}

/// Non-owning back-reference from a chunk to its Replica
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReplicaHandle {
    pub replica_id: ReplicaId,
    pub local_peer: PeerId,
}

impl ReplicaHandle {
    pub fn of(replica: &dyn ReplicaInfo) -> Self {
        Self {
            replica_id: replica.replica_id(),
            local_peer: replica.peer_id(),
        }
    }
}

/// Passed to lifecycle and ownership callbacks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReplicaContext {
    pub replica_id: ReplicaId,
    pub local_peer: PeerId,
    /// Owner after the operation in progress completes
    pub owner_peer: PeerId,
}

impl ReplicaContext {
    pub fn new(replica_id: ReplicaId, local_peer: PeerId, owner_peer: PeerId) -> Self {
        Self {
            replica_id,
            local_peer,
            owner_peer,
        }
    }

    pub fn is_local_owner(&self) -> bool {
        self.local_peer == self.owner_peer
    }
}

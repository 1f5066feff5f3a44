use crate::{rpc::RpcRequest, PeerId};

use super::{
    change_bits::{ChangeBits, ChangeMask},
    class::ReplicaChunkClass,
    peer_table::PeerBaseline,
    replica_chunk::ReplicaChunk,
};

/// Read-only view of a chunk's replication bookkeeping, for tests
pub trait ChunkInspector {
    type Mask: ChangeMask;

    fn inspect_change_bits(&self) -> ChangeBits<Self::Mask>;

    fn inspect_baseline(&self, peer: PeerId) -> Option<PeerBaseline<Self::Mask>>;

    /// Snapshot of the RPC queue, oldest first
    fn inspect_rpc_queue(&self) -> Vec<RpcRequest>;

    fn inspect_staged(&self) -> Vec<u8>;
}

impl<C: ReplicaChunkClass> ChunkInspector for ReplicaChunk<C> {
    type Mask = C::Mask;

    fn inspect_change_bits(&self) -> ChangeBits<C::Mask> {
        self.read_state().change_bits
    }

    fn inspect_baseline(&self, peer: PeerId) -> Option<PeerBaseline<C::Mask>> {
        self.read_state().peers.baseline(peer).cloned()
    }

    fn inspect_rpc_queue(&self) -> Vec<RpcRequest> {
        self.read_state().rpc_queue.iter().cloned().collect()
    }

    fn inspect_staged(&self) -> Vec<u8> {
        let count = self.read_state().data_set_count;
        (0..count)
            .filter(|index| {
                self.class
                    .data_set(*index)
                    .map_or(false, |data_set| data_set.has_staged())
            })
            .collect()
    }
}

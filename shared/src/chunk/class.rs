use std::fmt;

use crate::{constants::DEFAULT_RPC_QUEUE_CAPACITY, replica::ReplicaContext, rpc::RpcBase, PeerId};

use super::{change_bits::ChangeMask, data_set::DataSetBase};

/// 32-bit chunk class id, derived from the class name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkClassId(pub u32);

impl ChunkClassId {
    /// Hashes `name` with BLAKE3 and keeps the first four bytes
    pub fn from_name(name: &str) -> Self {
        let hash = blake3::hash(name.as_bytes());
        let bytes = hash.as_bytes();
        Self(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn of<C: ReplicaChunkClass>() -> Self {
        Self::from_name(C::CHUNK_NAME)
    }
}

impl fmt::Display for ChunkClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// A user-declared chunk: a struct whose members are the replicated
/// [`DataSet`](crate::DataSet)s and [`Rpc`](crate::Rpc)s.
///
/// Members are addressed by a dense index starting at 0. `data_set()` and
/// `rpc()` must return `Some` for every index below the declared count and
/// `None` from there on.
pub trait ReplicaChunkClass: Send + Sync + 'static {
    /// Width of the change masks, and so the maximum DataSet count
    type Mask: ChangeMask;

    /// Unique name of the class, hashed into its [`ChunkClassId`]
    const CHUNK_NAME: &'static str;

    const RPC_QUEUE_CAPACITY: usize = DEFAULT_RPC_QUEUE_CAPACITY;

    fn data_set(&self, index: u8) -> Option<&dyn DataSetBase>;

    fn data_set_mut(&mut self, index: u8) -> Option<&mut dyn DataSetBase>;

    fn rpc(&self, _index: u8) -> Option<&dyn RpcBase> {
        None
    }

    fn rpc_mut(&mut self, _index: u8) -> Option<&mut dyn RpcBase> {
        None
    }

    /// Whether the owning Replica may change ownership
    fn is_replica_migratable(&self) -> bool;

    /// Asked on the primary before an ownership change. Returning `false`
    /// vetoes migration of the whole Replica.
    fn accept_change_ownership(&self, _requestor: PeerId, _ctx: &ReplicaContext) -> bool {
        true
    }

    fn on_replica_activate(&mut self, _ctx: &ReplicaContext) {}

    fn on_replica_deactivate(&mut self, _ctx: &ReplicaContext) {}

    fn on_replica_change_ownership(&mut self, _ctx: &ReplicaContext) {}
}

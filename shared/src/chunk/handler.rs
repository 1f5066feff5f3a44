use replica_chunk_serde::{BitReader, Serde, SerdeErr};

use crate::{replica::ReplicaContext, PeerId, Reliability, Revision, RpcDirection, RpcRequestId};

use super::class::ChunkClassId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Set on this participant
    Local,
    /// Applied from a remote marshal
    Remote,
}

/// Notification that a DataSet took a new value
#[derive(Clone, Debug)]
pub struct DataSetChange {
    pub class_id: ChunkClassId,
    pub class_name: &'static str,
    pub index: u8,
    pub name: &'static str,
    pub revision: Revision,
    pub origin: ChangeOrigin,
    pub(crate) encoded: Vec<u8>,
}

impl DataSetChange {
    /// Decodes the new value
    pub fn value<T: Serde>(&self) -> Result<T, SerdeErr> {
        T::de(&mut BitReader::new(&self.encoded))
    }
}

/// An RPC received from a peer, ready for dispatch
#[derive(Clone, Debug)]
pub struct RpcCall {
    pub class_id: ChunkClassId,
    pub class_name: &'static str,
    pub rpc_index: u8,
    pub name: &'static str,
    pub request_id: RpcRequestId,
    pub reliability: Reliability,
    pub direction: RpcDirection,
    pub source: PeerId,
    pub(crate) payload: Vec<u8>,
}

impl RpcCall {
    pub fn args<A: Serde>(&self) -> Result<A, SerdeErr> {
        A::de(&mut BitReader::new(&self.payload))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Game-side logic attached to a chunk. The chunk holds it weakly and never
/// while its own state is locked.
pub trait ReplicaChunkHandler: Send + Sync {
    fn on_data_set_changed(&mut self, change: &DataSetChange);

    /// Handles an incoming RPC. On the primary, returning `true` for an
    /// upstream RPC forwards it to every other proxy.
    fn on_rpc(&mut self, call: &RpcCall) -> bool;

    fn should_send_to_peer(&self, _peer: PeerId) -> bool {
        true
    }

    fn on_activated(&mut self, _ctx: &ReplicaContext) {}

    fn on_deactivated(&mut self, _ctx: &ReplicaContext) {}

    fn on_ownership_changed(&mut self, _ctx: &ReplicaContext, _is_primary: bool) {}
}

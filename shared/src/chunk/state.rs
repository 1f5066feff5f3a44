use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use log::{debug, error};

use crate::{
    rpc::{RpcQueue, RpcRequest},
    ChunkRole, Revision, RpcDirection, RpcRequestId,
};

use super::{
    change_bits::{ChangeBits, ChangeMask},
    class::ChunkClassId,
    config::ChunkConfig,
    error::ChunkError,
    handler::ReplicaChunkHandler,
    lifecycle::ChunkLifecycle,
    mutator::{upgrade_handler, ChunkMutate},
    peer_table::PeerTable,
    priority::{ChunkFlags, ChunkPriority},
};

pub(crate) fn read_lock<M: ChangeMask>(state: &RwLock<ChunkState<M>>) -> RwLockReadGuard<'_, ChunkState<M>> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<M: ChangeMask>(
    state: &RwLock<ChunkState<M>>,
) -> RwLockWriteGuard<'_, ChunkState<M>> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct RpcLayout {
    pub name: &'static str,
    pub direction: RpcDirection,
}

/// Chunk bookkeeping shared between the chunk and its declared members
pub(crate) struct ChunkState<M: ChangeMask> {
    pub class_id: ChunkClassId,
    pub class_name: &'static str,
    pub lifecycle: ChunkLifecycle,
    pub revision: Revision,
    pub change_bits: ChangeBits<M>,
    pub data_set_count: u8,
    /// Bits of every declared DataSet
    pub layout_mask: M,
    /// Bits of the reliable DataSets
    pub reliable_fields: M,
    pub rpcs: Vec<RpcLayout>,
    pub peers: PeerTable<M>,
    pub rpc_queue: RpcQueue,
    pub handler: Option<Weak<RwLock<dyn ReplicaChunkHandler>>>,
    pub priority: ChunkPriority,
    pub flags: ChunkFlags,
}

impl<M: ChangeMask> ChunkState<M> {
    pub fn new(class_id: ChunkClassId, class_name: &'static str, config: &ChunkConfig) -> Self {
        Self {
            class_id,
            class_name,
            lifecycle: ChunkLifecycle::new(),
            revision: 0,
            change_bits: ChangeBits::new(),
            data_set_count: 0,
            layout_mask: M::empty(),
            reliable_fields: M::empty(),
            rpcs: Vec::new(),
            peers: PeerTable::new(config.max_in_flight_marshals),
            rpc_queue: RpcQueue::new(config.rpc_queue_capacity),
            handler: None,
            priority: config.priority,
            flags: ChunkFlags::empty(),
        }
    }

    pub fn role(&self) -> ChunkRole {
        self.lifecycle.role()
    }

    pub fn bump_revision(&mut self) -> Revision {
        self.revision += 1;
        self.revision
    }

    pub fn invalid_operation(&self, operation: &'static str) -> ChunkError {
        ChunkError::InvalidOperation {
            class_name: self.class_name,
            operation,
            role: self.lifecycle.state().name(),
        }
    }

    pub fn invalid_transition(&self, operation: &'static str) -> ChunkError {
        ChunkError::InvalidTransition {
            class_name: self.class_name,
            operation,
            state: self.lifecycle.state().name(),
        }
    }

    /// Drops dirty bits no peer is still waiting on
    pub fn retain_dirty(&mut self) {
        let outstanding = self.peers.outstanding();
        let pending = self.peers.pending_union();
        self.change_bits.retain_reliable(outstanding);
        self.change_bits.retain_unreliable(pending);
    }

    /// Forgets every peer baseline and queued RPC
    pub fn reset_replication(&mut self) {
        self.change_bits.clear_dirty();
        self.peers.reset_baselines();
        self.rpc_queue.clear_pending_rpcs();
    }

    /// Targets for a new request: every registered peer except its origin
    fn targets_for(&self, request: &RpcRequest) -> u64 {
        let origin = request
            .origin()
            .and_then(|peer| self.peers.slot_of(peer))
            .map_or(0, |slot| slot.bit());
        self.peers.connected_mask() & !origin
    }
}

impl<M: ChangeMask> ChunkMutate for ChunkState<M> {
    fn mutate_data_set(&mut self, index: u8) -> Result<Revision, ChunkError> {
        if self.role() != ChunkRole::Primary {
            let err = self.invalid_operation("set a DataSet");
            error!("{}", err);
            return Err(err);
        }
        if index >= self.data_set_count {
            return Err(self.invalid_operation("set an undeclared DataSet"));
        }
        self.change_bits.mark_changed(index);
        self.peers.mark_pending(index);
        self.flags.insert(ChunkFlags::UPDATED_THIS_FRAME);
        Ok(self.bump_revision())
    }

    fn enqueue_rpc(&mut self, mut request: RpcRequest) -> Result<RpcRequestId, ChunkError> {
        let Some(layout) = self.rpcs.get(request.rpc_index() as usize).copied() else {
            return Err(self.invalid_operation("invoke an undeclared RPC"));
        };
        let direction = request.direction();
        if self.role() != direction.sender_role() {
            let err = self.invalid_operation(match direction {
                RpcDirection::Upstream => "invoke an upstream RPC",
                RpcDirection::Downstream => "invoke a downstream RPC",
            });
            error!("RPC `{}`: {}", layout.name, err);
            return Err(err);
        }

        let targets = self.targets_for(&request);
        request.set_targets(targets);
        let id = self
            .rpc_queue
            .enqueue(request)
            .map_err(|err| ChunkError::from_queue(self.class_name, err))?;
        debug!("queued RPC `{}` as {:?} for targets {:#x}", layout.name, id, targets);

        self.flags.insert(ChunkFlags::UPDATED_THIS_FRAME);
        self.bump_revision();
        Ok(id)
    }

    fn handler(&self) -> Option<Arc<RwLock<dyn ReplicaChunkHandler>>> {
        upgrade_handler(&self.handler)
    }

    fn class(&self) -> (ChunkClassId, &'static str) {
        (self.class_id, self.class_name)
    }
}

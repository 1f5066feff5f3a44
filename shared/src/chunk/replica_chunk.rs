use std::{
    collections::VecDeque,
    ops::{Deref, DerefMut},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, info};

use crate::{
    constants::{MAX_CONNECTED_PEERS, RPC_INDEX_BITS},
    replica::{ChunkOwnership, ReplicaContext, ReplicaHandle, ReplicaInfo},
    ChunkRole, PeerId, Revision, RpcRequestId,
};

use super::{
    change_bits::{ChangeBits, ChangeMask},
    class::{ChunkClassId, ReplicaChunkClass},
    config::ChunkConfig,
    error::ChunkError,
    handler::{ReplicaChunkHandler, RpcCall},
    lifecycle::{LifecycleState, TransitionError},
    mutator::{call_handler, upgrade_handler, ChunkMutate, ChunkMutator},
    priority::{ChunkFlags, ChunkPriority},
    state::{read_lock, write_lock, ChunkState, RpcLayout},
};

/// A replicated chunk: the user-declared class `C` plus the bookkeeping that
/// keeps its proxies in sync. Dereferences to `C`.
pub struct ReplicaChunk<C: ReplicaChunkClass> {
    pub(crate) class: C,
    pub(crate) state: Arc<RwLock<ChunkState<C::Mask>>>,
    pub(crate) updates_enabled: bool,
    pub(crate) deferred_rpcs: VecDeque<RpcCall>,
}

impl<C: ReplicaChunkClass> ReplicaChunk<C> {
    pub fn new(class: C) -> Self {
        Self::with_config(class, ChunkConfig::for_class::<C>())
    }

    pub fn with_config(class: C, config: ChunkConfig) -> Self {
        let state = ChunkState::new(ChunkClassId::of::<C>(), C::CHUNK_NAME, &config);
        Self {
            class,
            state: Arc::new(RwLock::new(state)),
            updates_enabled: true,
            deferred_rpcs: VecDeque::new(),
        }
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, ChunkState<C::Mask>> {
        read_lock(&self.state)
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, ChunkState<C::Mask>> {
        write_lock(&self.state)
    }

    // Lifecycle

    /// Binds the declared layout. Only while detached; repeating it with the
    /// same class id is a no-op.
    pub fn init(&mut self, class_id: ChunkClassId) -> Result<(), ChunkError> {
        let own_class = ChunkClassId::of::<C>();
        if class_id != own_class {
            return Err(ChunkError::ClassMismatch {
                class_name: C::CHUNK_NAME,
                bound: own_class.0,
                requested: class_id.0,
            });
        }

        let data_set_count = count_members(|index| self.class.data_set(index).is_some());
        if data_set_count > <C::Mask as ChangeMask>::CAPACITY as usize {
            return Err(ChunkError::LayoutTooLarge {
                class_name: C::CHUNK_NAME,
                what: "data sets",
                declared: data_set_count,
                capacity: <C::Mask as ChangeMask>::CAPACITY as usize,
            });
        }
        let rpc_count = count_members(|index| self.class.rpc(index).is_some());
        let max_rpcs = 1usize << RPC_INDEX_BITS;
        if rpc_count > max_rpcs {
            return Err(ChunkError::LayoutTooLarge {
                class_name: C::CHUNK_NAME,
                what: "RPCs",
                declared: rpc_count,
                capacity: max_rpcs,
            });
        }

        {
            let mut state = self.write_state();
            state.lifecycle.init(class_id).map_err(|err| match err {
                TransitionError::ClassMismatch { bound } => ChunkError::ClassMismatch {
                    class_name: C::CHUNK_NAME,
                    bound: bound.0,
                    requested: class_id.0,
                },
                _ => state.invalid_transition("init"),
            })?;

            let mut reliable_fields = <C::Mask as ChangeMask>::empty();
            for index in 0..data_set_count as u8 {
                if let Some(data_set) = self.class.data_set(index) {
                    if data_set.reliability().is_reliable() {
                        reliable_fields = reliable_fields.with(index);
                    }
                }
            }
            state.data_set_count = data_set_count as u8;
            state.layout_mask = <C::Mask as ChangeMask>::first(data_set_count as u8);
            state.reliable_fields = reliable_fields;
            state.rpcs = (0..rpc_count as u8)
                .filter_map(|index| self.class.rpc(index))
                .map(|rpc| RpcLayout {
                    name: rpc.name(),
                    direction: rpc.direction(),
                })
                .collect();
        }

        let shared: Arc<RwLock<dyn ChunkMutate>> = self.state.clone();
        let mutator = ChunkMutator::new(shared);
        for index in 0..data_set_count as u8 {
            if let Some(data_set) = self.class.data_set_mut(index) {
                data_set.bind(index, mutator.clone());
            }
        }
        for index in 0..rpc_count as u8 {
            if let Some(rpc) = self.class.rpc_mut(index) {
                rpc.bind(index, mutator.clone());
            }
        }

        info!(
            "chunk `{}` ({}) initialized with {} data sets and {} RPCs",
            C::CHUNK_NAME,
            own_class,
            data_set_count,
            rpc_count
        );
        Ok(())
    }

    /// Becomes Primary or Proxy according to `replica`. Stale dirty bits,
    /// peer baselines and queued RPCs are dropped.
    pub fn attached_to_replica(&mut self, replica: &dyn ReplicaInfo) -> Result<ChunkRole, ChunkError> {
        let handle = ReplicaHandle::of(replica);
        let role = {
            let mut state = self.write_state();
            let role = state
                .lifecycle
                .attach(handle, replica.is_primary())
                .map_err(|err| match err {
                    TransitionError::NotInitialized => ChunkError::NotInitialized {
                        class_name: C::CHUNK_NAME,
                    },
                    _ => state.invalid_transition("attach to a replica"),
                })?;

            state.reset_replication();
            state.change_bits.clear();
            for index in 0..state.data_set_count {
                if matches!(self.class.data_set(index), Some(data_set) if data_set.is_non_default()) {
                    state.change_bits.mark_non_default(index);
                }
            }
            role
        };
        self.discard_remote_updates();

        info!(
            "chunk `{}` attached to {} on {} as {:?}",
            C::CHUNK_NAME,
            handle.replica_id,
            handle.local_peer,
            role
        );
        Ok(role)
    }

    pub fn on_replica_activate(&mut self, ctx: &ReplicaContext) -> Result<(), ChunkError> {
        self.check_context(ctx)?;
        self.class.on_replica_activate(ctx);
        if let Some(handler) = self.handler() {
            call_handler(&handler, |handler| handler.on_activated(ctx));
        }
        Ok(())
    }

    /// Enters Detaching: dirty bits, peers and RPCs are purged and the handler
    /// released
    pub fn on_replica_deactivate(&mut self, ctx: &ReplicaContext) -> Result<(), ChunkError> {
        self.check_context(ctx)?;
        {
            let mut state = self.write_state();
            if state.lifecycle.begin_detach().is_err() {
                return Err(state.invalid_transition("deactivate"));
            }
        }
        self.class.on_replica_deactivate(ctx);
        if let Some(handler) = self.handler() {
            call_handler(&handler, |handler| handler.on_deactivated(ctx));
        }
        self.purge();
        debug!("chunk `{}` deactivated", C::CHUNK_NAME);
        Ok(())
    }

    /// Ends in Detached from any state. Everything is purged unconditionally.
    pub fn detached_from_replica(&mut self) {
        self.purge();
        self.write_state().lifecycle.finish_detach();
        info!("chunk `{}` detached", C::CHUNK_NAME);
    }

    fn purge(&mut self) {
        {
            let mut state = self.write_state();
            state.change_bits.clear();
            state.rpc_queue.clear_pending_rpcs();
            state.peers.clear();
            state.handler = None;
        }
        self.discard_remote_updates();
    }

    /// Drops fields staged and RPCs deferred while updates were suspended
    fn discard_remote_updates(&mut self) {
        self.deferred_rpcs.clear();
        for index in 0.. {
            let Some(data_set) = self.class.data_set_mut(index) else {
                break;
            };
            data_set.discard_staged();
        }
    }

    fn check_context(&self, ctx: &ReplicaContext) -> Result<ReplicaHandle, ChunkError> {
        let state = self.read_state();
        let Some(handle) = state.lifecycle.replica() else {
            return Err(state.invalid_transition("handle a replica callback"));
        };
        if handle.replica_id != ctx.replica_id {
            return Err(ChunkError::ReplicaMismatch {
                class_name: C::CHUNK_NAME,
                attached: handle.replica_id,
                given: ctx.replica_id,
            });
        }
        Ok(handle)
    }

    // Ownership

    pub fn is_replica_migratable(&self) -> bool {
        self.class.is_replica_migratable()
    }

    /// Only a primary can agree to hand its Replica over. Has no side effects.
    pub fn accept_change_ownership(&self, requestor: PeerId, ctx: &ReplicaContext) -> bool {
        if self.lifecycle_state() != LifecycleState::AttachedPrimary {
            return false;
        }
        if self.check_context(ctx).is_err() {
            return false;
        }
        self.class.is_replica_migratable() && self.class.accept_change_ownership(requestor, ctx)
    }

    /// Takes the role matching the new owner. Unacknowledged RPCs are
    /// abandoned, updates staged from the previous owner are dropped and
    /// every peer is treated as new.
    pub fn on_replica_change_ownership(&mut self, ctx: &ReplicaContext) -> Result<(), ChunkError> {
        let handle = self.check_context(ctx)?;
        let is_primary = ctx.owner_peer == handle.local_peer;
        let role = {
            let mut state = self.write_state();
            let role = match state.lifecycle.change_role(is_primary) {
                Ok(role) => role,
                Err(_) => return Err(state.invalid_transition("change ownership")),
            };
            state.reset_replication();
            role
        };
        self.discard_remote_updates();

        self.class.on_replica_change_ownership(ctx);
        if let Some(handler) = self.handler() {
            call_handler(&handler, |handler| handler.on_ownership_changed(ctx, is_primary));
        }
        info!(
            "chunk `{}` of {} is now {:?}, owned by {}",
            C::CHUNK_NAME,
            ctx.replica_id,
            role,
            ctx.owner_peer
        );
        Ok(())
    }

    // Peers

    pub fn add_peer(&mut self, peer: PeerId) -> Result<(), ChunkError> {
        let mut state = self.write_state();
        if state.peers.add(peer).is_none() {
            return Err(ChunkError::TooManyPeers {
                class_name: C::CHUNK_NAME,
                peer,
                max: MAX_CONNECTED_PEERS,
            });
        }
        Ok(())
    }

    /// Returns whether the peer was registered
    pub fn remove_peer(&mut self, peer: PeerId) -> bool {
        let mut state = self.write_state();
        let Some(slot) = state.peers.remove(peer) else {
            return false;
        };
        let connected = state.peers.connected_mask();
        state.rpc_queue.remove_peer(slot, connected);
        state.retain_dirty();
        true
    }

    pub fn has_peer(&self, peer: PeerId) -> bool {
        self.read_state().peers.contains(peer)
    }

    pub fn peer_count(&self) -> usize {
        self.read_state().peers.len()
    }

    /// Registered, not the local peer, and not refused by the handler
    pub fn should_send_to_peer(&self, peer: PeerId) -> bool {
        let handler = {
            let state = self.read_state();
            if !state.peers.contains(peer) {
                return false;
            }
            if matches!(state.lifecycle.replica(), Some(handle) if handle.local_peer == peer) {
                return false;
            }
            upgrade_handler(&state.handler)
        };
        let Some(handler) = handler else {
            return true;
        };
        handler
            .try_read()
            .map_or(true, |handler| handler.should_send_to_peer(peer))
    }

    // Acknowledgement

    /// Every marshal to `peer` up to `revision` arrived
    pub fn acknowledge_data(&mut self, peer: PeerId, revision: Revision) -> Result<(), ChunkError> {
        let mut state = self.write_state();
        if !state.peers.contains(peer) {
            return Err(unknown_peer::<C>(peer));
        }
        state.peers.acknowledge(peer, revision);
        state.retain_dirty();
        Ok(())
    }

    /// The marshal to `peer` at `revision` was lost; its reliable fields are
    /// sent again
    pub fn notify_data_lost(&mut self, peer: PeerId, revision: Revision) -> Result<(), ChunkError> {
        let mut state = self.write_state();
        if !state.peers.contains(peer) {
            return Err(unknown_peer::<C>(peer));
        }
        let reliable_fields = state.reliable_fields;
        state.peers.notify_lost(peer, revision, reliable_fields);
        state.retain_dirty();
        Ok(())
    }

    /// Returns whether the request was still queued
    pub fn acknowledge_rpc(&mut self, peer: PeerId, id: RpcRequestId) -> Result<bool, ChunkError> {
        let mut state = self.write_state();
        let Some(slot) = state.peers.slot_of(peer) else {
            return Err(unknown_peer::<C>(peer));
        };
        let connected = state.peers.connected_mask();
        Ok(state.rpc_queue.acknowledge_reliable(id, slot, connected))
    }

    /// Returns whether the request will be sent again
    pub fn notify_rpc_lost(&mut self, peer: PeerId, id: RpcRequestId) -> Result<bool, ChunkError> {
        let mut state = self.write_state();
        let Some(slot) = state.peers.slot_of(peer) else {
            return Err(unknown_peer::<C>(peer));
        };
        Ok(state.rpc_queue.notify_lost(id, slot))
    }

    pub fn clear_pending_rpcs(&mut self) {
        self.write_state().rpc_queue.clear_pending_rpcs();
    }

    // Handler

    pub fn set_handler<H: ReplicaChunkHandler + 'static>(&mut self, handler: &Arc<RwLock<H>>) {
        let handler: Arc<RwLock<dyn ReplicaChunkHandler>> = handler.clone();
        self.write_state().handler = Some(Arc::downgrade(&handler));
    }

    pub fn clear_handler(&mut self) {
        self.write_state().handler = None;
    }

    pub(crate) fn handler(&self) -> Option<Arc<RwLock<dyn ReplicaChunkHandler>>> {
        upgrade_handler(&self.read_state().handler)
    }

    // Accessors

    pub fn class_id(&self) -> ChunkClassId {
        self.read_state().class_id
    }

    pub fn class_name(&self) -> &'static str {
        C::CHUNK_NAME
    }

    pub fn role(&self) -> ChunkRole {
        self.read_state().role()
    }

    pub fn is_primary(&self) -> bool {
        self.role() == ChunkRole::Primary
    }

    pub fn is_proxy(&self) -> bool {
        self.role() == ChunkRole::Proxy
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.read_state().lifecycle.state()
    }

    pub fn replica(&self) -> Option<ReplicaHandle> {
        self.read_state().lifecycle.replica()
    }

    pub fn revision(&self) -> Revision {
        self.read_state().revision
    }

    pub fn priority(&self) -> ChunkPriority {
        self.read_state().priority
    }

    pub fn set_priority(&mut self, priority: ChunkPriority) {
        self.write_state().priority = priority;
    }

    pub fn flags(&self) -> ChunkFlags {
        self.read_state().flags
    }

    pub fn change_bits(&self) -> ChangeBits<C::Mask> {
        self.read_state().change_bits
    }

    /// Fields due for `peer`. `None` when the peer is not registered.
    pub fn calculate_dirty_mask(&self, peer: PeerId) -> Option<C::Mask> {
        let state = self.read_state();
        if !state.peers.contains(peer) {
            return None;
        }
        Some(state.change_bits.calculate_dirty_mask(state.peers.baseline(peer)))
    }

    pub fn pending_rpc_count(&self) -> usize {
        self.read_state().rpc_queue.len()
    }
}

fn count_members(has: impl Fn(u8) -> bool) -> usize {
    let mut count = 0usize;
    while count <= u8::MAX as usize && has(count as u8) {
        count += 1;
    }
    count
}

fn unknown_peer<C: ReplicaChunkClass>(peer: PeerId) -> ChunkError {
    ChunkError::UnknownPeer {
        class_name: C::CHUNK_NAME,
        peer,
    }
}

impl<C: ReplicaChunkClass> Deref for ReplicaChunk<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.class
    }
}

impl<C: ReplicaChunkClass> DerefMut for ReplicaChunk<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.class
    }
}

impl<C: ReplicaChunkClass> ChunkOwnership for ReplicaChunk<C> {
    fn class_name(&self) -> &'static str {
        C::CHUNK_NAME
    }

    fn is_replica_migratable(&self) -> bool {
        ReplicaChunk::is_replica_migratable(self)
    }

    fn accept_change_ownership(&self, requestor: PeerId, ctx: &ReplicaContext) -> bool {
        ReplicaChunk::accept_change_ownership(self, requestor, ctx)
    }

    fn on_replica_change_ownership(&mut self, ctx: &ReplicaContext) -> Result<(), ChunkError> {
        ReplicaChunk::on_replica_change_ownership(self, ctx)
    }
}

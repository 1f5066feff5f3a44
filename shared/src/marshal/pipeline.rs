use log::{debug, warn};

use replica_chunk_serde::{BitReader, BitWrite, SerdeErr, StreamWriter};

use crate::{
    chunk::{
        call_handler, read_lock, write_lock, ChangeMask, ChangeOrigin, ChunkError, ChunkFlags,
        ChunkMutate, ChunkState, DataSetChange, IntegrityFault, IntegrityFaultKind, ReplicaChunk,
        ReplicaChunkClass, RpcCall,
    },
    rpc::RpcRequest,
    ChunkIndex, ChunkRole, PeerId, Reliability, RpcDirection,
};

use super::{
    context::{
        EndianType, MarshalContext, MarshalFlags, MarshalReceipt, PrepareDataResult,
        UnmarshalContext, UnmarshalReport,
    },
    wire::{self, RpcEntryHeader},
};

/// Fields to marshal to `peer`. Only a primary writes fields.
fn due_data_sets<M: ChangeMask>(state: &ChunkState<M>, peer: PeerId, flags: MarshalFlags) -> M {
    if state.role() != ChunkRole::Primary {
        return M::empty();
    }
    let baseline = state.peers.baseline(peer);
    let due = if flags.contains(MarshalFlags::FORCE_DIRTY) {
        state.layout_mask
    } else if flags.contains(MarshalFlags::FULL_SYNC) {
        let pending = baseline.map_or(M::empty(), |baseline| baseline.due());
        state.change_bits.calculate_dirty_mask(None).union(pending)
    } else {
        state.change_bits.calculate_dirty_mask(baseline)
    };
    due.intersect(state.layout_mask)
}

impl<C: ReplicaChunkClass> ReplicaChunk<C> {
    /// Reports what is due across every peer that should be sent to. Has no
    /// side effects; call it before each `marshal` as often as needed.
    pub fn prepare_data(&self, endian: EndianType, flags: MarshalFlags) -> PrepareDataResult {
        let peers: Vec<PeerId> = {
            let state = self.read_state();
            state.peers.iter().map(|(_, entry)| entry.peer()).collect()
        };
        let peers: Vec<PeerId> = peers
            .into_iter()
            .filter(|peer| self.should_send_to_peer(*peer))
            .collect();

        let state = self.read_state();
        let mut result = PrepareDataResult {
            has_reliable: false,
            has_unreliable: false,
            revision: state.revision,
            endian,
        };
        if !state.role().is_attached() {
            return result;
        }

        for peer in peers {
            let Some(slot) = state.peers.slot_of(peer) else {
                continue;
            };
            let due = due_data_sets(&*state, peer, flags);
            result.has_reliable |= !due.intersect(state.reliable_fields).is_clear()
                || state.rpc_queue.has_pending_with(slot, Reliability::Reliable);
            result.has_unreliable |= !due.difference(state.reliable_fields).is_clear()
                || state.rpc_queue.has_pending_with(slot, Reliability::Unreliable);
        }
        result
    }

    /// Writes everything due for the context's peer. Writes nothing and
    /// returns `None` when nothing is due.
    pub fn marshal(
        &mut self,
        ctx: &mut MarshalContext,
        chunk_index: ChunkIndex,
    ) -> Result<Option<MarshalReceipt>, ChunkError> {
        let peer = ctx.peer();
        if !self.has_peer(peer) {
            return Err(ChunkError::UnknownPeer {
                class_name: C::CHUNK_NAME,
                peer,
            });
        }
        if !self.should_send_to_peer(peer) {
            return Ok(None);
        }

        let mut state = write_lock(&self.state);
        let role = state.role();
        let Some(slot) = state.peers.slot_of(peer) else {
            return Ok(None);
        };
        if !role.is_attached() {
            return Ok(None);
        }

        let due = due_data_sets(&*state, peer, ctx.flags());
        if due.is_clear() && !state.rpc_queue.has_pending_for(slot) {
            return Ok(None);
        }

        let writer = ctx.writer();
        wire::write_chunk_index(writer, chunk_index);

        let mut data_sets = Vec::new();
        let mut sent = <C::Mask as ChangeMask>::empty();
        for index in due.indices() {
            let Some(data_set) = self.class.data_set(index) else {
                continue;
            };
            let mut value = StreamWriter::new();
            data_set.write_value(&mut value);

            writer.write_bit(true);
            wire::write_data_set_index(writer, index);
            wire::write_blob(writer, &value.to_bytes());
            data_sets.push(index);
            sent = sent.with(index);
        }
        writer.write_bit(false);

        let mut rpcs = Vec::new();
        for request in state.rpc_queue.drain_for_marshal(slot) {
            writer.write_bit(true);
            wire::write_rpc_header(
                writer,
                &RpcEntryHeader {
                    rpc_index: request.rpc_index(),
                    request_id: request.id(),
                    reliability: request.reliability(),
                    direction: request.direction(),
                },
            );
            wire::write_blob(writer, request.payload());
            rpcs.push((request.id(), request.reliability()));
        }
        writer.write_bit(false);
        let connected = state.peers.connected_mask();
        state.rpc_queue.purge_delivered(connected);

        let revision = state.revision;
        if role == ChunkRole::Primary {
            state.peers.record_marshal(peer, revision, sent);
            state.retain_dirty();
        }

        debug!(
            "marshalled chunk `{}` #{} to {}: {} data sets, {} RPCs at revision {}",
            C::CHUNK_NAME,
            chunk_index,
            peer,
            data_sets.len(),
            rpcs.len(),
            revision
        );
        Ok(Some(MarshalReceipt {
            peer,
            revision,
            data_sets,
            rpcs,
        }))
    }

    /// Reads one marshalled chunk. Entries outside the layout are skipped and
    /// reported; only a truncated stream is an error.
    pub fn unmarshal(
        &mut self,
        ctx: &mut UnmarshalContext,
        chunk_index: ChunkIndex,
    ) -> Result<UnmarshalReport, ChunkError> {
        let truncated = |_: SerdeErr| ChunkError::Truncated {
            class_name: C::CHUNK_NAME,
        };
        let source = ctx.source();
        let reader = ctx.reader();

        let found = wire::read_chunk_index(reader).map_err(truncated)?;
        if found != chunk_index {
            return Err(ChunkError::ChunkIndexMismatch {
                class_name: C::CHUNK_NAME,
                expected: chunk_index,
                found,
            });
        }

        let (class_id, role, data_set_count, rpcs) = {
            let state = read_lock(&self.state);
            (state.class_id, state.role(), state.data_set_count, state.rpcs.clone())
        };
        let mut report = UnmarshalReport::default();

        let mut staged = Vec::new();
        while reader.read_bit().map_err(truncated)? {
            let index = wire::read_data_set_index(reader).map_err(truncated)?;
            let blob = wire::read_blob(reader).map_err(truncated)?;

            if role != ChunkRole::Proxy {
                fault::<C>(&mut report, index, IntegrityFaultKind::UnexpectedDataSet);
                continue;
            }
            let data_set = if index < data_set_count {
                self.class.data_set_mut(index)
            } else {
                None
            };
            let Some(data_set) = data_set else {
                fault::<C>(&mut report, index, IntegrityFaultKind::UnknownDataSet);
                continue;
            };
            if data_set.read_staged(&mut BitReader::new(&blob)).is_err() {
                fault::<C>(&mut report, index, IntegrityFaultKind::MalformedDataSet);
                continue;
            }
            staged.push(index);
        }

        let mut calls = Vec::new();
        while reader.read_bit().map_err(truncated)? {
            let header = wire::read_rpc_header(reader).map_err(truncated)?;
            let payload = wire::read_blob(reader).map_err(truncated)?;

            let Some(layout) = rpcs.get(header.rpc_index as usize) else {
                fault::<C>(&mut report, header.rpc_index, IntegrityFaultKind::UnknownRpc);
                continue;
            };
            let relayed_upstream = header.direction == RpcDirection::Downstream
                && layout.direction == RpcDirection::Upstream;
            if role != header.direction.receiver_role()
                || (header.direction != layout.direction && !relayed_upstream)
            {
                fault::<C>(
                    &mut report,
                    header.rpc_index,
                    IntegrityFaultKind::UnexpectedRpcDirection,
                );
                continue;
            }
            calls.push(RpcCall {
                class_id,
                class_name: C::CHUNK_NAME,
                rpc_index: header.rpc_index,
                name: layout.name,
                request_id: header.request_id,
                reliability: header.reliability,
                direction: header.direction,
                source,
                payload,
            });
        }

        if self.updates_enabled {
            report.merge(self.apply_staged());
            for call in calls {
                self.dispatch_rpc(call, &mut report);
            }
        } else {
            report.staged = staged;
            let capacity = read_lock(&self.state).rpc_queue.capacity();
            for call in calls {
                self.defer_rpc(call, capacity, &mut report);
            }
        }
        Ok(report)
    }

    /// Holds a call until updates resume. When `capacity` calls are already
    /// held the oldest unreliable one is dropped; if every held call is
    /// reliable the new call is dropped instead.
    fn defer_rpc(&mut self, call: RpcCall, capacity: usize, report: &mut UnmarshalReport) {
        if self.deferred_rpcs.len() >= capacity {
            let Some(position) = self
                .deferred_rpcs
                .iter()
                .position(|held| !held.reliability.is_reliable())
            else {
                warn!(
                    "chunk `{}` holds {} deferred RPCs, `{}` from {} dropped",
                    C::CHUNK_NAME,
                    capacity,
                    call.name,
                    call.source
                );
                report.rpcs_dropped += 1;
                return;
            };
            if let Some(evicted) = self.deferred_rpcs.remove(position) {
                warn!(
                    "chunk `{}` holds {} deferred RPCs, unreliable `{}` from {} dropped",
                    C::CHUNK_NAME,
                    capacity,
                    evicted.name,
                    evicted.source
                );
                report.rpcs_dropped += 1;
            }
        }
        self.deferred_rpcs.push_back(call);
        report.rpcs_deferred += 1;
    }

    /// Closes a pass over every peer. Unreliable requests that a skipped peer
    /// never got are dropped, as are requests left without a connected target.
    pub fn end_marshal_pass(&mut self) {
        let mut state = self.write_state();
        let connected = state.peers.connected_mask();
        state.rpc_queue.end_pass(connected);
        state.flags.remove(ChunkFlags::UPDATED_THIS_FRAME);
    }

    pub fn is_update_from_replica_enabled(&self) -> bool {
        self.updates_enabled
    }

    /// Unmarshalled fields are staged and RPCs queued until resumed
    pub fn suspend_updates_from_replica(&mut self) {
        self.updates_enabled = false;
    }

    /// Applies staged fields and dispatches deferred RPCs in arrival order
    pub fn resume_updates_from_replica(&mut self) -> UnmarshalReport {
        self.updates_enabled = true;
        let mut report = self.apply_staged();
        while let Some(call) = self.deferred_rpcs.pop_front() {
            self.dispatch_rpc(call, &mut report);
        }
        report
    }

    /// Moves staged values in, notifying the handler once per changed field.
    /// Only a proxy takes values from its primary.
    fn apply_staged(&mut self) -> UnmarshalReport {
        let mut report = UnmarshalReport::default();
        let mut changes = Vec::new();
        {
            let mut state = write_lock(&self.state);
            if state.role() != ChunkRole::Proxy {
                for index in 0..state.data_set_count {
                    if let Some(data_set) = self.class.data_set_mut(index) {
                        data_set.discard_staged();
                    }
                }
                return report;
            }
            for index in 0..state.data_set_count {
                let Some(data_set) = self.class.data_set_mut(index) else {
                    continue;
                };
                if !data_set.has_staged() {
                    continue;
                }
                let revision = state.revision + 1;
                if !data_set.apply_staged(revision) {
                    continue;
                }
                state.revision = revision;
                if data_set.is_non_default() {
                    state.change_bits.mark_non_default(index);
                }
                changes.push(DataSetChange {
                    class_id: state.class_id,
                    class_name: C::CHUNK_NAME,
                    index,
                    name: data_set.name(),
                    revision,
                    origin: ChangeOrigin::Remote,
                    encoded: data_set.encoded_value(),
                });
                report.applied.push(index);
            }
        }

        if changes.is_empty() {
            return report;
        }
        if let Some(handler) = self.handler() {
            for change in &changes {
                call_handler(&handler, |handler| handler.on_data_set_changed(change));
            }
        }
        report
    }

    fn dispatch_rpc(&mut self, call: RpcCall, report: &mut UnmarshalReport) {
        let Some(handler) = self.handler() else {
            debug!(
                "chunk `{}` has no handler, RPC `{}` from {} dropped",
                C::CHUNK_NAME,
                call.name,
                call.source
            );
            return;
        };
        let forward = call_handler(&handler, |handler| handler.on_rpc(&call)).unwrap_or(false);
        report.rpcs_dispatched += 1;

        if !forward || call.direction != RpcDirection::Upstream || !self.is_primary() {
            return;
        }
        let request = RpcRequest::new(
            call.rpc_index,
            call.reliability,
            RpcDirection::Downstream,
            call.payload,
            0,
        )
        .forwarded_from(call.source);
        match write_lock(&self.state).enqueue_rpc(request) {
            Ok(_) => report.rpcs_forwarded += 1,
            Err(err) => warn!("RPC `{}` from {} not forwarded: {}", call.name, call.source, err),
        }
    }
}

fn fault<C: ReplicaChunkClass>(report: &mut UnmarshalReport, index: u8, kind: IntegrityFaultKind) {
    let fault = IntegrityFault {
        class_name: C::CHUNK_NAME,
        index,
        kind,
    };
    warn!("{}", ChunkError::IntegrityFault(fault.clone()));
    report.faults.push(fault);
}

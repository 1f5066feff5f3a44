use std::collections::VecDeque;

use log::warn;

use super::{error::RpcQueueError, request::RpcRequest};
use crate::{chunk::PeerSlot, Reliability, RpcRequestId};

/// Bounded FIFO of pending RPC requests. Never blocks: when full the oldest
/// unreliable request is evicted, and if every entry is reliable the enqueue
/// fails.
pub struct RpcQueue {
    requests: VecDeque<RpcRequest>,
    capacity: usize,
    next_id: RpcRequestId,
}

impl RpcQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            requests: VecDeque::with_capacity(capacity),
            capacity,
            next_id: RpcRequestId(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn enqueue(&mut self, mut request: RpcRequest) -> Result<RpcRequestId, RpcQueueError> {
        if self.requests.len() >= self.capacity {
            let Some(position) = self
                .requests
                .iter()
                .position(|request| !request.reliability().is_reliable())
            else {
                return Err(RpcQueueError::QueueFull {
                    capacity: self.capacity,
                });
            };
            if let Some(evicted) = self.requests.remove(position) {
                warn!(
                    "RPC queue full ({} entries), dropping unreliable request {:?} for rpc {}",
                    self.capacity,
                    evicted.id(),
                    evicted.rpc_index()
                );
            }
        }

        let id = self.next_id;
        self.next_id = self.next_id.next();
        request.set_id(id);
        self.requests.push_back(request);
        Ok(id)
    }

    pub fn get(&self, id: RpcRequestId) -> Option<&RpcRequest> {
        self.requests.iter().find(|request| request.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RpcRequest> {
        self.requests.iter()
    }

    pub fn has_pending_for(&self, slot: PeerSlot) -> bool {
        self.requests.iter().any(|request| request.is_due_for(slot))
    }

    pub fn has_pending_with(&self, slot: PeerSlot, reliability: Reliability) -> bool {
        self.requests
            .iter()
            .any(|request| request.reliability() == reliability && request.is_due_for(slot))
    }

    /// Yields, oldest first, every request due for the peer in `slot`, marking
    /// each relayed to it
    pub fn drain_for_marshal(&mut self, slot: PeerSlot) -> impl Iterator<Item = &RpcRequest> {
        self.requests
            .iter_mut()
            .filter(move |request| request.is_due_for(slot))
            .map(move |request| {
                request.mark_relayed(slot);
                &*request
            })
    }

    /// Records an ack from the peer in `slot`, purging the request once every
    /// still-connected target has acknowledged it. Returns whether the request
    /// was known.
    pub fn acknowledge_reliable(&mut self, id: RpcRequestId, slot: PeerSlot, connected: u64) -> bool {
        let Some(position) = self.requests.iter().position(|request| request.id() == id) else {
            return false;
        };
        let request = &mut self.requests[position];
        request.mark_acked(slot);
        if request.reliability().is_reliable() && request.is_complete(connected) {
            self.requests.remove(position);
        }
        true
    }

    /// The marshal carrying `id` to `slot` was lost. Reliable requests are
    /// drained again; unreliable ones are not retried.
    pub fn notify_lost(&mut self, id: RpcRequestId, slot: PeerSlot) -> bool {
        let Some(request) = self.requests.iter_mut().find(|request| request.id() == id) else {
            return false;
        };
        if request.reliability().is_reliable() && !request.is_acked_by(slot) {
            request.clear_relayed(slot);
            return true;
        }
        false
    }

    /// Forgets the peer in `slot`: it is no longer a target of any request.
    /// Reliable requests it was the last to acknowledge are purged.
    pub fn remove_peer(&mut self, slot: PeerSlot, connected: u64) {
        for request in self.requests.iter_mut() {
            request.drop_target(slot);
        }
        self.requests.retain(|request| {
            request.targets() & connected != 0
                && !(request.reliability().is_reliable() && request.is_complete(connected))
        });
    }

    /// Drops unreliable requests already relayed to every connected target.
    /// Reliable requests wait for their acks.
    pub fn purge_delivered(&mut self, connected: u64) {
        self.requests.retain(|request| {
            request.reliability().is_reliable() || !request.is_complete(connected)
        });
    }

    /// Ends a marshal pass. Unreliable requests drained to some peer during
    /// the pass are dropped even if another target was skipped. Completed
    /// reliable requests and requests without a connected target go too.
    pub fn end_pass(&mut self, connected: u64) {
        self.requests.retain(|request| {
            if request.targets() & connected == 0 {
                return false;
            }
            match request.reliability() {
                Reliability::Unreliable => !request.was_drained(),
                Reliability::Reliable => !request.is_complete(connected),
            }
        });
    }

    /// Discards every request regardless of relay or ack state
    pub fn clear_pending_rpcs(&mut self) {
        self.requests.clear();
    }
}

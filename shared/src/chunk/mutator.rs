use std::sync::{Arc, PoisonError, RwLock, TryLockError, Weak};

use log::warn;

use crate::{rpc::RpcRequest, Revision, RpcRequestId};

use super::{class::ChunkClassId, error::ChunkError, handler::ReplicaChunkHandler};

/// What a declared member may do to the chunk it belongs to
pub trait ChunkMutate: Send + Sync {
    /// Records a local change of the DataSet at `index`, returning the chunk's
    /// new revision
    fn mutate_data_set(&mut self, index: u8) -> Result<Revision, ChunkError>;

    fn enqueue_rpc(&mut self, request: RpcRequest) -> Result<RpcRequestId, ChunkError>;

    fn handler(&self) -> Option<Arc<RwLock<dyn ReplicaChunkHandler>>>;

    fn class(&self) -> (ChunkClassId, &'static str);
}

/// Shared handle from a DataSet or Rpc to its chunk's state
#[derive(Clone)]
pub struct ChunkMutator {
    inner: Arc<RwLock<dyn ChunkMutate>>,
}

impl ChunkMutator {
    pub(crate) fn new(inner: Arc<RwLock<dyn ChunkMutate>>) -> Self {
        Self { inner }
    }

    pub fn mutate_data_set(&self, index: u8) -> Result<Revision, ChunkError> {
        let mut chunk = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        chunk.mutate_data_set(index)
    }

    pub fn enqueue_rpc(&self, request: RpcRequest) -> Result<RpcRequestId, ChunkError> {
        let mut chunk = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        chunk.enqueue_rpc(request)
    }

    pub fn class(&self) -> (ChunkClassId, &'static str) {
        let chunk = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        chunk.class()
    }

    /// Runs `f` against the chunk's handler, if one is attached. The chunk
    /// lock is released first.
    pub fn with_handler<R>(&self, f: impl FnOnce(&mut dyn ReplicaChunkHandler) -> R) -> Option<R> {
        let handler = {
            let chunk = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            chunk.handler()
        }?;
        call_handler(&handler, f)
    }
}

/// Locks `handler` for one call. A handler already locked higher up the stack
/// is skipped rather than deadlocked on.
pub(crate) fn call_handler<R>(
    handler: &Arc<RwLock<dyn ReplicaChunkHandler>>,
    f: impl FnOnce(&mut dyn ReplicaChunkHandler) -> R,
) -> Option<R> {
    match handler.try_write() {
        Ok(mut guard) => Some(f(&mut *guard)),
        Err(TryLockError::Poisoned(poisoned)) => {
            let mut guard = poisoned.into_inner();
            Some(f(&mut *guard))
        }
        Err(TryLockError::WouldBlock) => {
            warn!("chunk handler is busy, skipping notification");
            None
        }
    }
}

pub(crate) fn upgrade_handler(
    handler: &Option<Weak<RwLock<dyn ReplicaChunkHandler>>>,
) -> Option<Arc<RwLock<dyn ReplicaChunkHandler>>> {
    handler.as_ref().and_then(Weak::upgrade)
}

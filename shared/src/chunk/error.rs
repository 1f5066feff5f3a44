use thiserror::Error;

use crate::{rpc::RpcQueueError, PeerId, ReplicaId};

/// What was wrong with a marshalled entry that had to be skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityFaultKind {
    /// Field index outside the chunk's declared layout
    UnknownDataSet,
    /// RPC index outside the chunk's declared layout
    UnknownRpc,
    /// The value blob did not decode as the field's type
    MalformedDataSet,
    /// A data set arrived at a chunk that does not accept field writes
    UnexpectedDataSet,
    /// An RPC arrived travelling the wrong direction for this chunk's role
    UnexpectedRpcDirection,
}

/// A single entry skipped while unmarshalling
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} at index {index} in chunk `{class_name}`")]
pub struct IntegrityFault {
    pub class_name: &'static str,
    pub index: u8,
    pub kind: IntegrityFaultKind,
}

/// Errors that can occur during chunk operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// RPC queue is full and holds no unreliable entry to evict
    #[error("RPC queue of chunk `{class_name}` is full ({capacity} reliable requests pending)")]
    QueueFull {
        class_name: &'static str,
        capacity: usize,
    },

    /// Marshalled data referenced something outside the chunk's layout
    #[error("Integrity fault: {0}")]
    IntegrityFault(IntegrityFault),

    /// A chunk refused an ownership change of its Replica
    #[error("Chunk `{class_name}` vetoed migration of {replica_id} to {requestor}")]
    MigrationVetoed {
        class_name: &'static str,
        replica_id: ReplicaId,
        requestor: PeerId,
    },

    /// Operation not allowed for the chunk's current role
    #[error("Cannot {operation} on chunk `{class_name}` while {role}")]
    InvalidOperation {
        class_name: &'static str,
        operation: &'static str,
        role: &'static str,
    },

    /// Lifecycle call out of order
    #[error("Chunk `{class_name}` cannot {operation} while {state}")]
    InvalidTransition {
        class_name: &'static str,
        operation: &'static str,
        state: &'static str,
    },

    /// `init()` called again with a different class id
    #[error("Chunk `{class_name}` is already bound to class {bound:#010x}, cannot bind {requested:#010x}")]
    ClassMismatch {
        class_name: &'static str,
        bound: u32,
        requested: u32,
    },

    /// Chunk used before `init()`
    #[error("Chunk `{class_name}` must be initialized with `init()` before it is attached")]
    NotInitialized { class_name: &'static str },

    /// Declared layout does not fit the class's change mask
    #[error("Chunk `{class_name}` declares {declared} {what}, but at most {capacity} are supported")]
    LayoutTooLarge {
        class_name: &'static str,
        what: &'static str,
        declared: usize,
        capacity: usize,
    },

    /// Peer table has no free slot
    #[error("Chunk `{class_name}` already relays to {max} peers, cannot add {peer}")]
    TooManyPeers {
        class_name: &'static str,
        peer: PeerId,
        max: usize,
    },

    /// Peer was never registered with `add_peer()`
    #[error("{peer} is not registered with chunk `{class_name}`")]
    UnknownPeer {
        class_name: &'static str,
        peer: PeerId,
    },

    /// Lifecycle context names a different Replica than the one attached
    #[error("Chunk `{class_name}` is attached to {attached}, but was given a context for {given}")]
    ReplicaMismatch {
        class_name: &'static str,
        attached: ReplicaId,
        given: ReplicaId,
    },

    /// Stream header names another chunk
    #[error("Chunk `{class_name}` expected chunk index {expected}, stream carries {found}")]
    ChunkIndexMismatch {
        class_name: &'static str,
        expected: u32,
        found: u32,
    },

    /// Stream ended mid-entry, framing is lost
    #[error("Marshalled data for chunk `{class_name}` ended unexpectedly")]
    Truncated { class_name: &'static str },
}

impl ChunkError {
    pub(crate) fn from_queue(class_name: &'static str, error: RpcQueueError) -> Self {
        match error {
            RpcQueueError::QueueFull { capacity } => ChunkError::QueueFull {
                class_name,
                capacity,
            },
        }
    }
}

//! # Replica Chunk
//! Replicated state chunks for networked games. A chunk is owned by one
//! participant (its primary) and mirrored on the others (its proxies). Local
//! field changes are tracked with dirty bits and marshalled as deltas, new
//! peers catch up field by field, RPCs are queued with per-peer relay and
//! acknowledgement tracking, and ownership can migrate between participants.
//!
//! The crate decides *what* to marshal at each opportunity. When a tick
//! happens and which packet goes to which peer is up to the transport.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use replica_chunk_serde::{
    BitReader, BitWrite, Serde, SerdeErr, SerdeFloat, SerdeInteger, SignedFloat, SignedInteger,
    SignedVariableFloat, SignedVariableInteger, StreamWriter, UnsignedFloat, UnsignedInteger,
    UnsignedVariableFloat, UnsignedVariableInteger,
};

mod chunk;
mod constants;
mod marshal;
mod replica;
mod rpc;
mod types;

#[cfg(any(test, feature = "test_utils"))]
pub use chunk::ChunkInspector;
pub use chunk::{
    BasicThrottle, ChangeBits, ChangeMask, ChangeOrigin, ChunkClassId, ChunkConfig, ChunkError,
    ChunkFlags, ChunkLifecycle, ChunkMutate, ChunkMutator, ChunkPriority, DataSet, DataSetBase,
    DataSetChange, DataSetThrottle, EpsilonThrottle, IntegrityFault, IntegrityFaultKind,
    LifecycleState, MaskIndices, PeerBaseline, PeerEntry, PeerSlot, PeerTable, ReplicaChunk,
    ReplicaChunkClass, ReplicaChunkHandler, RpcCall, TransitionError,
};
pub use constants::{
    DATA_SET_INDEX_BITS, DEFAULT_MAX_IN_FLIGHT_MARSHALS, DEFAULT_RPC_QUEUE_CAPACITY,
    MAX_CONNECTED_PEERS, RPC_INDEX_BITS,
};
pub use marshal::{
    EndianType, MarshalContext, MarshalFlags, MarshalReceipt, MarshalScheduler, MarshalTask,
    PrepareDataResult, UnmarshalContext, UnmarshalReport,
};
pub use replica::{
    apply_ownership_change, change_replica_ownership, ChunkOwnership, ReplicaContext,
    ReplicaHandle, ReplicaInfo,
};
pub use rpc::{Rpc, RpcBase, RpcQueue, RpcQueueError, RpcRequest};
pub use types::{
    ChunkIndex, ChunkRole, PeerId, Reliability, ReplicaId, Revision, RpcDirection, RpcRequestId,
};

mod change_bits;
mod class;
mod config;
mod data_set;
mod error;
mod handler;
#[cfg(any(test, feature = "test_utils"))]
mod inspector;
mod lifecycle;
mod mutator;
mod peer_table;
mod priority;
mod replica_chunk;
mod state;
mod throttle;

pub use change_bits::{ChangeBits, ChangeMask, MaskIndices};
pub use class::{ChunkClassId, ReplicaChunkClass};
pub use config::ChunkConfig;
pub use data_set::{DataSet, DataSetBase};
pub use error::{ChunkError, IntegrityFault, IntegrityFaultKind};
pub use handler::{ChangeOrigin, DataSetChange, ReplicaChunkHandler, RpcCall};
#[cfg(any(test, feature = "test_utils"))]
pub use inspector::ChunkInspector;
pub use lifecycle::{ChunkLifecycle, LifecycleState, TransitionError};
pub use mutator::{ChunkMutate, ChunkMutator};
pub use peer_table::{PeerBaseline, PeerEntry, PeerSlot, PeerTable};
pub use priority::{ChunkFlags, ChunkPriority};
pub use replica_chunk::ReplicaChunk;
pub use throttle::{BasicThrottle, DataSetThrottle, EpsilonThrottle};

pub(crate) use mutator::call_handler;
pub(crate) use state::{read_lock, write_lock, ChunkState};

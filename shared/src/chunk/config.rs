use crate::constants::{DEFAULT_MAX_IN_FLIGHT_MARSHALS, DEFAULT_RPC_QUEUE_CAPACITY};

use super::{class::ReplicaChunkClass, priority::ChunkPriority};

/// Contains config properties fixed when a chunk is constructed
#[derive(Clone, Debug)]
pub struct ChunkConfig {
    /// Maximum number of queued RPC requests
    pub rpc_queue_capacity: usize,
    /// Unacknowledged marshals remembered per peer for loss reporting
    pub max_in_flight_marshals: usize,
    /// Priority the chunk starts with
    pub priority: ChunkPriority,
}

impl ChunkConfig {
    /// Defaults, with the queue capacity declared by `C`
    pub fn for_class<C: ReplicaChunkClass>() -> Self {
        Self {
            rpc_queue_capacity: C::RPC_QUEUE_CAPACITY,
            ..Self::default()
        }
    }

    pub fn with_rpc_queue_capacity(mut self, capacity: usize) -> Self {
        self.rpc_queue_capacity = capacity;
        self
    }

    pub fn with_max_in_flight_marshals(mut self, max: usize) -> Self {
        self.max_in_flight_marshals = max;
        self
    }

    pub fn with_priority(mut self, priority: ChunkPriority) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            rpc_queue_capacity: DEFAULT_RPC_QUEUE_CAPACITY,
            max_in_flight_marshals: DEFAULT_MAX_IN_FLIGHT_MARSHALS,
            priority: ChunkPriority::NORMAL,
        }
    }
}

/// Default capacity of a chunk's RPC queue
pub const DEFAULT_RPC_QUEUE_CAPACITY: usize = 512;

/// Peers a single chunk can relay to. Per-request relay and ack state is a `u64`.
pub const MAX_CONNECTED_PEERS: usize = 64;

/// Marshals remembered per peer while waiting for an ack or loss report
pub const DEFAULT_MAX_IN_FLIGHT_MARSHALS: usize = 32;

/// Bits used to write a DataSet index. A `u128` mask holds 128 fields.
pub const DATA_SET_INDEX_BITS: u8 = 7;

/// Bits used to write an RPC index
pub const RPC_INDEX_BITS: u8 = 7;

use replica_chunk_serde::{BitReader, StreamWriter};

use crate::{chunk::IntegrityFault, PeerId, Reliability, Revision, RpcRequestId};

/// Byte order requested by the transport. Carried through marshalling
/// untouched; the bit stream itself is order independent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EndianType {
    Big,
    #[default]
    Little,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MarshalFlags(u8);

impl MarshalFlags {
    /// Marshal as if the peer had no baseline
    pub const FULL_SYNC: Self = Self(1);
    /// Marshal every declared field
    pub const FORCE_DIRTY: Self = Self(1 << 1);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Outgoing packet for one peer. Several chunks may marshal into the same
/// context, one after another.
pub struct MarshalContext {
    writer: StreamWriter,
    peer: PeerId,
    endian: EndianType,
    flags: MarshalFlags,
}

impl MarshalContext {
    pub fn new(peer: PeerId, endian: EndianType, flags: MarshalFlags) -> Self {
        Self {
            writer: StreamWriter::new(),
            peer,
            endian,
            flags,
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn endian(&self) -> EndianType {
        self.endian
    }

    pub fn flags(&self) -> MarshalFlags {
        self.flags
    }

    pub fn writer(&mut self) -> &mut StreamWriter {
        &mut self.writer
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.writer.to_bytes()
    }
}

/// Incoming packet from one peer
pub struct UnmarshalContext<'b> {
    reader: BitReader<'b>,
    source: PeerId,
    endian: EndianType,
}

impl<'b> UnmarshalContext<'b> {
    pub fn new(bytes: &'b [u8], source: PeerId, endian: EndianType) -> Self {
        Self {
            reader: BitReader::new(bytes),
            source,
            endian,
        }
    }

    pub fn source(&self) -> PeerId {
        self.source
    }

    pub fn endian(&self) -> EndianType {
        self.endian
    }

    pub fn reader(&mut self) -> &mut BitReader<'b> {
        &mut self.reader
    }

    /// Whether another chunk follows in the packet
    pub fn has_more(&self) -> bool {
        self.reader.bytes_remaining() > 0
    }
}

/// What `prepare_data()` found due across all connected peers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrepareDataResult {
    pub has_reliable: bool,
    pub has_unreliable: bool,
    pub revision: Revision,
    pub endian: EndianType,
}

impl PrepareDataResult {
    pub fn is_empty(&self) -> bool {
        !self.has_reliable && !self.has_unreliable
    }
}

/// Describes one chunk marshal, for later ack or loss reporting
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarshalReceipt {
    pub peer: PeerId,
    pub revision: Revision,
    pub data_sets: Vec<u8>,
    pub rpcs: Vec<(RpcRequestId, Reliability)>,
}

impl MarshalReceipt {
    /// Something in this marshal must be acknowledged
    pub fn is_reliable(&self) -> bool {
        !self.data_sets.is_empty()
            || self
                .rpcs
                .iter()
                .any(|(_, reliability)| reliability.is_reliable())
    }
}

/// Outcome of one `unmarshal()` or `resume_updates_from_replica()`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnmarshalReport {
    /// Fields whose value changed, in index order
    pub applied: Vec<u8>,
    /// Fields parsed and held back while updates are suspended
    pub staged: Vec<u8>,
    pub rpcs_dispatched: usize,
    pub rpcs_deferred: usize,
    /// Deferred calls dropped because the deferred queue was full
    pub rpcs_dropped: usize,
    pub rpcs_forwarded: usize,
    pub faults: Vec<IntegrityFault>,
}

impl UnmarshalReport {
    pub fn merge(&mut self, other: UnmarshalReport) {
        self.applied.extend(other.applied);
        self.staged.extend(other.staged);
        self.rpcs_dispatched += other.rpcs_dispatched;
        self.rpcs_deferred += other.rpcs_deferred;
        self.rpcs_dropped += other.rpcs_dropped;
        self.rpcs_forwarded += other.rpcs_forwarded;
        self.faults.extend(other.faults);
    }
}

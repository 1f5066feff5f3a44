use replica_chunk_serde::{
    BitReader, BitWrite, Serde, SerdeErr, UnsignedInteger, UnsignedVariableInteger,
};

use crate::{
    constants::{DATA_SET_INDEX_BITS, RPC_INDEX_BITS},
    ChunkIndex, Reliability, RpcDirection, RpcRequestId,
};

pub(crate) type ChunkIndexWire = UnsignedVariableInteger<5>;
type BlobLength = UnsignedVariableInteger<7>;
type RequestIdWire = UnsignedVariableInteger<7>;

/// Header of an RPC entry in the RPC section
pub(crate) struct RpcEntryHeader {
    pub rpc_index: u8,
    pub request_id: RpcRequestId,
    pub reliability: Reliability,
    pub direction: RpcDirection,
}

pub(crate) fn write_chunk_index(writer: &mut dyn BitWrite, chunk_index: ChunkIndex) {
    ChunkIndexWire::new(chunk_index).ser(writer);
}

pub(crate) fn read_chunk_index(reader: &mut BitReader) -> Result<ChunkIndex, SerdeErr> {
    let index = ChunkIndexWire::de(reader)?;
    ChunkIndex::try_from(index.get()).map_err(|_| SerdeErr)
}

pub(crate) fn write_data_set_index(writer: &mut dyn BitWrite, index: u8) {
    UnsignedInteger::<DATA_SET_INDEX_BITS>::new(index).ser(writer);
}

pub(crate) fn read_data_set_index(reader: &mut BitReader) -> Result<u8, SerdeErr> {
    let index = UnsignedInteger::<DATA_SET_INDEX_BITS>::de(reader)?;
    u8::try_from(index.get()).map_err(|_| SerdeErr)
}

pub(crate) fn write_rpc_header(writer: &mut dyn BitWrite, header: &RpcEntryHeader) {
    UnsignedInteger::<RPC_INDEX_BITS>::new(header.rpc_index).ser(writer);
    RequestIdWire::new(header.request_id.0).ser(writer);
    writer.write_bit(header.reliability.is_reliable());
    writer.write_bit(header.direction == RpcDirection::Upstream);
}

pub(crate) fn read_rpc_header(reader: &mut BitReader) -> Result<RpcEntryHeader, SerdeErr> {
    let rpc_index = UnsignedInteger::<RPC_INDEX_BITS>::de(reader)?;
    let request_id = RequestIdWire::de(reader)?;
    let reliability = if reader.read_bit()? {
        Reliability::Reliable
    } else {
        Reliability::Unreliable
    };
    let direction = if reader.read_bit()? {
        RpcDirection::Upstream
    } else {
        RpcDirection::Downstream
    };
    Ok(RpcEntryHeader {
        rpc_index: u8::try_from(rpc_index.get()).map_err(|_| SerdeErr)?,
        request_id: RpcRequestId(u32::try_from(request_id.get()).map_err(|_| SerdeErr)?),
        reliability,
        direction,
    })
}

/// Length-prefixed byte blob. Lets a reader skip entries it cannot decode.
pub(crate) fn write_blob(writer: &mut dyn BitWrite, bytes: &[u8]) {
    BlobLength::new(bytes.len() as u64).ser(writer);
    writer.write_bytes(bytes);
}

pub(crate) fn read_blob(reader: &mut BitReader) -> Result<Vec<u8>, SerdeErr> {
    let length = BlobLength::de(reader)?;
    let length = usize::try_from(length.get()).map_err(|_| SerdeErr)?;
    reader.read_bytes(length)
}

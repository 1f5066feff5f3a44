use crate::{bit_reader::BitReader, bit_write::BitWrite, error::SerdeErr};

/// A type that can be written to and read from a bit stream.
///
/// This is the per-type marshaler used for replicated field values and RPC
/// arguments.
pub trait Serde: Sized + Clone + PartialEq {
    /// Serialize Self into the writer
    fn ser(&self, writer: &mut dyn BitWrite);

    /// Parse Self from the reader
    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr>;
}

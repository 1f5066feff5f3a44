//! # Replica Chunk Serde
//! Bit-level serialization used to marshal replicated fields and RPC
//! arguments.

mod bit_reader;
mod bit_write;
mod error;
mod impls;
mod number;
mod serde;
mod stream_writer;

pub use bit_reader::BitReader;
pub use bit_write::BitWrite;
pub use error::SerdeErr;
pub use number::{
    SerdeFloat, SerdeFloatConversion, SerdeInteger, SerdeIntegerConversion, SignedFloat,
    SignedInteger, SignedVariableFloat, SignedVariableInteger, UnsignedFloat, UnsignedInteger,
    UnsignedVariableFloat, UnsignedVariableInteger,
};
pub use serde::Serde;
pub use stream_writer::StreamWriter;

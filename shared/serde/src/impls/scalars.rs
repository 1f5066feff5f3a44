use crate::{bit_reader::BitReader, bit_write::BitWrite, error::SerdeErr, serde::Serde};

impl Serde for () {
    fn ser(&self, _: &mut dyn BitWrite) {}

    fn de(_: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(())
    }
}

impl Serde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        reader.read_bit()
    }
}

// Fixed-width scalars travel as their little-endian bytes
macro_rules! impl_serde_for_le_bytes {
    ($($impl_type:ty),*) => {
        $(
            impl Serde for $impl_type {
                fn ser(&self, writer: &mut dyn BitWrite) {
                    writer.write_bytes(&self.to_le_bytes());
                }

                fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                    let mut bytes = [0u8; std::mem::size_of::<$impl_type>()];
                    for byte in bytes.iter_mut() {
                        *byte = reader.read_byte()?;
                    }
                    Ok(<$impl_type>::from_le_bytes(bytes))
                }
            }
        )*
    };
}

impl_serde_for_le_bytes!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Serde for char {
    fn ser(&self, writer: &mut dyn BitWrite) {
        (*self as u32).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        char::from_u32(u32::de(reader)?).ok_or(SerdeErr)
    }
}

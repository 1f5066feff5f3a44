use crate::{
    bit_reader::BitReader, bit_write::BitWrite, error::SerdeErr, serde::Serde,
    UnsignedVariableInteger,
};

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Some(value) => {
                writer.write_bit(true);
                value.ser(writer);
            }
            None => writer.write_bit(false),
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if reader.read_bit()? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedVariableInteger::<5>::new(self.len() as u64).ser(writer);
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length: usize = UnsignedVariableInteger::<5>::de(reader)?
            .get()
            .try_into()
            .map_err(|_| SerdeErr)?;
        // every element costs at least one bit on the wire
        let mut output = Vec::with_capacity(length.min(reader.bytes_remaining() * 8 + 8));
        for _ in 0..length {
            output.push(T::de(reader)?);
        }
        Ok(output)
    }
}

macro_rules! impl_serde_for_tuple {
    ($($name:ident),+) => {
        impl<$($name: Serde),+> Serde for ($($name,)+) {
            #[allow(non_snake_case)]
            fn ser(&self, writer: &mut dyn BitWrite) {
                let ($($name,)+) = self;
                $($name.ser(writer);)+
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                Ok(($($name::de(reader)?,)+))
            }
        }
    };
}

impl_serde_for_tuple!(A);
impl_serde_for_tuple!(A, B);
impl_serde_for_tuple!(A, B, C);
impl_serde_for_tuple!(A, B, C, D);

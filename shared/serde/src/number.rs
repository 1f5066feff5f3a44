use crate::{bit_reader::BitReader, bit_write::BitWrite, error::SerdeErr, serde::Serde};

// Integers

pub trait SerdeIntegerConversion<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> {
    fn from(value: &SerdeInteger<SIGNED, VARIABLE, BITS>) -> Self;
}

pub type UnsignedInteger<const BITS: u8> = SerdeInteger<false, false, BITS>;
pub type SignedInteger<const BITS: u8> = SerdeInteger<true, false, BITS>;
pub type UnsignedVariableInteger<const BITS: u8> = SerdeInteger<false, true, BITS>;
pub type SignedVariableInteger<const BITS: u8> = SerdeInteger<true, true, BITS>;

/// An integer written with exactly `BITS` magnitude bits, or, when
/// `VARIABLE`, in `BITS`-sized groups each preceded by a continuation bit.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SerdeInteger<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> {
    inner: NumberEncoding,
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> SerdeInteger<SIGNED, VARIABLE, BITS> {
    pub fn new<T: Into<i128>>(value: T) -> Self {
        Self {
            inner: NumberEncoding::new(SIGNED, VARIABLE, BITS, value.into()),
        }
    }

    pub fn get(&self) -> i128 {
        self.inner.value
    }

    pub fn set<T: Into<i128>>(&mut self, value: T) {
        self.inner = NumberEncoding::new(SIGNED, VARIABLE, BITS, value.into());
    }

    pub fn to<T: SerdeIntegerConversion<SIGNED, VARIABLE, BITS>>(&self) -> T {
        T::from(self)
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> Serde
    for SerdeInteger<SIGNED, VARIABLE, BITS>
{
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.inner.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let inner = NumberEncoding::de(reader, SIGNED, VARIABLE, BITS)?;
        Ok(Self { inner })
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8, T: Into<i128>> From<T>
    for SerdeInteger<SIGNED, VARIABLE, BITS>
{
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8, T: TryFrom<i128>>
    SerdeIntegerConversion<SIGNED, VARIABLE, BITS> for T
{
    fn from(value: &SerdeInteger<SIGNED, VARIABLE, BITS>) -> Self {
        let Ok(t_value) = T::try_from(value.get()) else {
            panic!("SerdeInteger's value is out of range to convert to this type.");
        };
        t_value
    }
}

// Floats

pub trait SerdeFloatConversion<
    const SIGNED: bool,
    const VARIABLE: bool,
    const BITS: u8,
    const FRACTION_DIGITS: u8,
>
{
    fn from(value: &SerdeFloat<SIGNED, VARIABLE, BITS, FRACTION_DIGITS>) -> Self;
}

pub type UnsignedFloat<const BITS: u8, const FRACTION_DIGITS: u8> =
    SerdeFloat<false, false, BITS, FRACTION_DIGITS>;
pub type SignedFloat<const BITS: u8, const FRACTION_DIGITS: u8> =
    SerdeFloat<true, false, BITS, FRACTION_DIGITS>;
pub type UnsignedVariableFloat<const BITS: u8, const FRACTION_DIGITS: u8> =
    SerdeFloat<false, true, BITS, FRACTION_DIGITS>;
pub type SignedVariableFloat<const BITS: u8, const FRACTION_DIGITS: u8> =
    SerdeFloat<true, true, BITS, FRACTION_DIGITS>;

/// A quantized float: the value is scaled by `10^FRACTION_DIGITS`, rounded,
/// and written as an integer. Useful for cosmetic fields where a full `f32`
/// wastes bandwidth.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SerdeFloat<
    const SIGNED: bool,
    const VARIABLE: bool,
    const BITS: u8,
    const FRACTION_DIGITS: u8,
> {
    inner: NumberEncoding,
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8, const FRACTION_DIGITS: u8>
    SerdeFloat<SIGNED, VARIABLE, BITS, FRACTION_DIGITS>
{
    fn scale() -> f32 {
        10f32.powi(FRACTION_DIGITS as i32)
    }

    pub fn new<T: Into<f32>>(value: T) -> Self {
        let scaled = (value.into() * Self::scale()).round() as i128;
        Self {
            inner: NumberEncoding::new(SIGNED, VARIABLE, BITS, scaled),
        }
    }

    pub fn get(&self) -> f32 {
        (self.inner.value as f32) / Self::scale()
    }

    pub fn set<T: Into<f32>>(&mut self, value: T) {
        *self = Self::new(value);
    }

    pub fn to<T: SerdeFloatConversion<SIGNED, VARIABLE, BITS, FRACTION_DIGITS>>(&self) -> T {
        T::from(self)
    }
}

impl<const S: bool, const V: bool, const B: u8, const F: u8> Serde for SerdeFloat<S, V, B, F> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.inner.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let inner = NumberEncoding::de(reader, S, V, B)?;
        Ok(Self { inner })
    }
}

impl<const S: bool, const V: bool, const B: u8, const F: u8, T: From<f32>>
    SerdeFloatConversion<S, V, B, F> for T
{
    fn from(value: &SerdeFloat<S, V, B, F>) -> Self {
        T::from(value.get())
    }
}

// Shared, non-generic encoding, to keep monomorphized code small

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
struct NumberEncoding {
    value: i128,
    signed: bool,
    variable: bool,
    bits: u8,
}

impl NumberEncoding {
    fn new(signed: bool, variable: bool, bits: u8, value: i128) -> Self {
        if bits == 0 {
            panic!("can't create a number with 0 bits...");
        }
        if bits > 127 {
            panic!("can't create a number with more than 127 bits...");
        }
        if !signed && value < 0 {
            panic!("can't encode a negative number with an Unsigned type!");
        }
        if !variable {
            let limit: i128 = 2_i128.pow(bits as u32);
            if value.abs() >= limit {
                panic!(
                    "value `{}` is out of range! (with `{}` bits, magnitude must be below `{}`)",
                    value, bits, limit
                );
            }
        }

        Self {
            value,
            signed,
            variable,
            bits,
        }
    }

    fn ser(&self, writer: &mut dyn BitWrite) {
        if self.signed {
            writer.write_bit(self.value < 0);
        }
        let mut magnitude = self.value.unsigned_abs();

        if !self.variable {
            write_magnitude_bits(writer, &mut magnitude, self.bits);
            return;
        }

        let group_limit = 1_u128 << self.bits;
        loop {
            let proceed = magnitude >= group_limit;
            writer.write_bit(proceed);
            write_magnitude_bits(writer, &mut magnitude, self.bits);
            if !proceed {
                return;
            }
        }
    }

    fn de(reader: &mut BitReader, signed: bool, variable: bool, bits: u8) -> Result<Self, SerdeErr> {
        let negative = if signed { reader.read_bit()? } else { false };

        let mut magnitude: u128 = 0;
        let mut shift: u32 = 0;

        if variable {
            loop {
                let proceed = reader.read_bit()?;
                read_magnitude_bits(reader, &mut magnitude, &mut shift, bits)?;
                if !proceed {
                    break;
                }
            }
        } else {
            read_magnitude_bits(reader, &mut magnitude, &mut shift, bits)?;
        }

        let value = magnitude as i128;
        Ok(Self {
            value: if negative { -value } else { value },
            signed,
            variable,
            bits,
        })
    }
}

fn write_magnitude_bits(writer: &mut dyn BitWrite, magnitude: &mut u128, bits: u8) {
    for _ in 0..bits {
        writer.write_bit(*magnitude & 1 != 0);
        *magnitude >>= 1;
    }
}

fn read_magnitude_bits(
    reader: &mut BitReader,
    magnitude: &mut u128,
    shift: &mut u32,
    bits: u8,
) -> Result<(), SerdeErr> {
    for _ in 0..bits {
        let bit = reader.read_bit()?;
        if *shift >= 128 {
            // a well-formed stream never carries more than 128 magnitude bits
            return Err(SerdeErr);
        }
        if bit {
            *magnitude |= 1 << *shift;
        }
        *shift += 1;
    }
    Ok(())
}

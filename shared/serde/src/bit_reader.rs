use crate::SerdeErr;

pub struct BitReader<'b> {
    scratch: u8,
    scratch_index: u8,
    buffer_index: usize,
    buffer: &'b [u8],
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            scratch: 0,
            scratch_index: 0,
            buffer_index: 0,
            buffer,
        }
    }

    pub fn read_bit(&mut self) -> Result<bool, SerdeErr> {
        if self.scratch_index == 0 {
            let Some(byte) = self.buffer.get(self.buffer_index) else {
                return Err(SerdeErr);
            };

            self.scratch = *byte;
            self.buffer_index += 1;
            self.scratch_index = 8;
        }

        let value = self.scratch & 1;

        self.scratch >>= 1;
        self.scratch_index -= 1;

        Ok(value != 0)
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        let mut output: u8 = 0;
        for shift in 0..8 {
            if self.read_bit()? {
                output |= 1 << shift;
            }
        }
        Ok(output)
    }

    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, SerdeErr> {
        if length > self.bytes_remaining() + 1 {
            return Err(SerdeErr);
        }
        let mut output = Vec::with_capacity(length);
        for _ in 0..length {
            output.push(self.read_byte()?);
        }
        Ok(output)
    }

    /// Whole bytes not yet pulled into the scratch byte
    pub fn bytes_remaining(&self) -> usize {
        self.buffer.len() - self.buffer_index
    }

    /// True once every bit, padding included, has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.scratch_index == 0 && self.buffer_index == self.buffer.len()
    }
}

use crate::wire::error::WireError;

/// A bounds-checked cursor over an inbound payload.
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], WireError> {
        let available = self.buffer.len() - self.cursor;
        if count > available {
            return Err(WireError::UnexpectedEnd {
                needed: count - available,
                available,
            });
        }
        let slice = &self.buffer[self.cursor..self.cursor + count];
        self.cursor += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        let bytes = self.take(8)?;
        let mut array = [0u8; 8];
        array.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(array))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], WireError> {
        self.take(count)
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// Everything after the cursor, consuming the reader's remaining input.
    pub fn remaining_bytes(&mut self) -> &'a [u8] {
        let slice = &self.buffer[self.cursor..];
        self.cursor = self.buffer.len();
        slice
    }
}

use crate::core::error::{Error, ErrorKind, Result};

/// Variable byte encoding: 7 bits per byte, low group first, high bit set
/// on every byte except the last.
pub struct VByteEncoder;

impl VByteEncoder {
    /// Values < 128 use 1 byte, < 16384 use 2 bytes, etc.
    pub fn encode_u32(output: &mut Vec<u8>, value: u32) {
        Self::encode_u64(output, value as u64);
    }

    pub fn encode_u64(output: &mut Vec<u8>, mut value: u64) {
        while value >= 128 {
            output.push((value & 127) as u8 | 128);
            value >>= 7;
        }
        output.push(value as u8);
    }

    /// Decode single u32 value, returns (value, bytes_consumed)
    pub fn decode_u32(input: &[u8]) -> Result<(u32, usize)> {
        let (value, consumed) = Self::decode_u64(input)?;
        let value = u32::try_from(value)
            .map_err(|_| Error::new(ErrorKind::Overflow, format!("varint {} exceeds u32", value)))?;
        Ok((value, consumed))
    }

    pub fn decode_u64(input: &[u8]) -> Result<(u64, usize)> {
        let mut value = 0u64;
        let mut shift = 0u32;

        for (i, &byte) in input.iter().enumerate() {
            let group = (byte & 127) as u64;
            if group != 0 && shift > 57 && (shift >= 64 || group >> (64 - shift) != 0) {
                return Err(Error::new(ErrorKind::Overflow, "varint exceeds u64".to_string()));
            }
            value |= group << shift.min(63);

            if byte & 128 == 0 {
                return Ok((value, i + 1));
            }
            shift += 7;
        }

        Err(Error::new(ErrorKind::Truncated, "incomplete varint".to_string()))
    }

    pub fn encode_u32_list(nums: &[u32]) -> Vec<u8> {
        let mut output = Vec::new();
        for &num in nums {
            Self::encode_u32(&mut output, num);
        }
        output
    }

    pub fn decode_u32_list(data: &[u8]) -> Result<Vec<u32>> {
        let mut reader = ByteReader::new(data);
        let mut nums = Vec::new();
        while !reader.is_empty() {
            nums.push(reader.read_u32()?);
        }
        Ok(nums)
    }
}

pub fn pack_bool(output: &mut Vec<u8>, value: bool) {
    output.push(if value { 1 } else { 0 });
}

/// Length-prefixed byte string, for use inside record bodies.
pub fn pack_string(output: &mut Vec<u8>, value: &[u8]) {
    VByteEncoder::encode_u64(output, value.len() as u64);
    output.extend_from_slice(value);
}

/// Forward cursor over an encoded buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let (value, consumed) = VByteEncoder::decode_u32(self.remaining())?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let (value, consumed) = VByteEncoder::decode_u64(self.remaining())?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .remaining()
            .first()
            .ok_or_else(|| Error::new(ErrorKind::Truncated, "expected a byte".to_string()))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::new(ErrorKind::Overflow, format!("bad bool byte {:#04x}", other))),
        }
    }

    pub fn read_string(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u64()?;
        let rest = self.remaining();
        if (rest.len() as u64) < len {
            return Err(Error::new(
                ErrorKind::Truncated,
                format!("string of {} bytes, {} available", len, rest.len()),
            ));
        }
        let len = len as usize;
        self.pos += len;
        Ok(&rest[..len])
    }
}

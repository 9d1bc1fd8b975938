//! Bit-level coding: truncated minimal binary codes and interpolative
//! coding of strictly increasing sequences.
//!
//! Bits are packed least-significant first: the first bit written lands
//! in bit 0 of the first output byte.

use crate::core::error::{Error, ErrorKind, Result};

/// Number of bits needed to represent `value`; 0 for 0.
fn bit_width(value: u64) -> u32 {
    64 - value.leading_zeros()
}

pub struct BitWriter {
    buf: Vec<u8>,
    acc: u64,
    n_bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_prefix(Vec::new())
    }

    /// Bits are appended after the bytes already in `prefix`.
    pub fn with_prefix(prefix: Vec<u8>) -> Self {
        BitWriter { buf: prefix, acc: 0, n_bits: 0 }
    }

    fn write_bits(&mut self, value: u64, count: u32) {
        if count == 0 {
            return;
        }
        self.acc |= value << self.n_bits;
        self.n_bits += count;
        while self.n_bits >= 8 {
            self.buf.push(self.acc as u8);
            self.acc >>= 8;
            self.n_bits -= 8;
        }
    }

    /// Encode `value` in `[0, outof)` using `ceil(log2(outof))` bits, one
    /// fewer for the `spare` values in the middle of the range.
    pub fn encode_bounded(&mut self, value: u64, outof: u64) {
        debug_assert!(value < outof, "{} out of range [0, {})", value, outof);
        let mut bits = bit_width(outof - 1);
        let spare = (1u64 << bits) - outof;
        let mut value = value;
        if spare != 0 {
            let mid_start = (outof - spare) / 2;
            if value >= mid_start + spare {
                value = (value - (mid_start + spare)) | (1u64 << (bits - 1));
            } else if value >= mid_start {
                bits -= 1;
            }
        }
        self.write_bits(value, bits);
    }

    /// Interpolative coding of `pos[j+1..k]` given `pos[j]` and `pos[k]`.
    /// `pos` must be strictly increasing.
    pub fn encode_interpolative(&mut self, pos: &[u32], mut j: usize, k: usize) {
        while j + 1 < k {
            let mid = j + (k - j) / 2;
            let outof = (pos[k] - pos[j]) as u64 + 1 - (k - j) as u64;
            let lowest = pos[j] as u64 + (mid - j) as u64;
            self.encode_bounded(pos[mid] as u64 - lowest, outof);
            self.encode_interpolative(pos, j, mid);
            j = mid;
        }
    }

    /// Flush any partial byte and return the buffer.
    pub fn freeze(mut self) -> Vec<u8> {
        if self.n_bits > 0 {
            self.buf.push(self.acc as u8);
        }
        self.buf
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BitReader<'a> {
    buf: &'a [u8],
    idx: usize,
    acc: u64,
    n_bits: u32,
}

impl<'a> BitReader<'a> {
    /// Start reading bits at byte offset `skip`.
    pub fn new(buf: &'a [u8], skip: usize) -> Self {
        BitReader { buf, idx: skip, acc: 0, n_bits: 0 }
    }

    fn read_bits(&mut self, count: u32) -> Result<u64> {
        if count == 0 {
            return Ok(0);
        }
        while self.n_bits < count {
            let byte = *self.buf.get(self.idx).ok_or_else(|| {
                Error::new(ErrorKind::Truncated, "bit stream ended early".to_string())
            })?;
            self.acc |= (byte as u64) << self.n_bits;
            self.n_bits += 8;
            self.idx += 1;
        }
        let value = self.acc & ((1u64 << count) - 1);
        self.acc >>= count;
        self.n_bits -= count;
        Ok(value)
    }

    pub fn decode_bounded(&mut self, outof: u64) -> Result<u64> {
        if outof == 0 {
            return Err(Error::new(ErrorKind::Overflow, "empty range in bit stream".to_string()));
        }
        let bits = bit_width(outof - 1);
        let spare = (1u64 << bits) - outof;
        if spare != 0 {
            let mid_start = (outof - spare) / 2;
            let mut p = self.read_bits(bits - 1)?;
            if p < mid_start && self.read_bits(1)? != 0 {
                p += mid_start + spare;
            }
            Ok(p)
        } else {
            self.read_bits(bits)
        }
    }

    /// Fill `pos[j+1..k]` from `pos[j]` and `pos[k]`, reading bits in the
    /// same order `encode_interpolative` wrote them.
    pub fn decode_interpolative(&mut self, pos: &mut [u32], mut j: usize, k: usize) -> Result<()> {
        while j + 1 < k {
            let mid = j + (k - j) / 2;
            let outof = (pos[k] as u64 + 1)
                .checked_sub(pos[j] as u64 + (k - j) as u64)
                .filter(|&o| o > 0)
                .ok_or_else(|| {
                    Error::new(ErrorKind::Overflow, "interpolative range collapsed".to_string())
                })?;
            let lowest = pos[j] as u64 + (mid - j) as u64;
            let value = self.decode_bounded(outof)?;
            pos[mid] = (lowest + value) as u32;
            self.decode_interpolative(pos, j, mid)?;
            j = mid;
        }
        Ok(())
    }
}

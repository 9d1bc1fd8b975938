//! Encodings whose byte order matches the natural order of the value, so
//! they can be concatenated into table keys.

use crate::core::error::{Error, ErrorKind, Result};

/// Length byte followed by the big-endian bytes without leading zeros.
pub fn encode_uint(output: &mut Vec<u8>, value: u32) {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    output.push((bytes.len() - skip) as u8);
    output.extend_from_slice(&bytes[skip..]);
}

/// Decode a sortable uint, returns (value, bytes_consumed).
pub fn decode_uint(input: &[u8]) -> Result<(u32, usize)> {
    let (&len, rest) = input
        .split_first()
        .ok_or_else(|| Error::new(ErrorKind::Truncated, "missing uint length".to_string()))?;
    let len = len as usize;
    if len > 4 {
        return Err(Error::new(ErrorKind::Overflow, format!("uint of {} bytes", len)));
    }
    if rest.len() < len {
        return Err(Error::new(ErrorKind::Truncated, "uint shorter than its length".to_string()));
    }
    let value = rest[..len].iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
    Ok((value, len + 1))
}

/// Escape each zero byte as `0x00 0xff` and terminate with a lone `0x00`.
pub fn encode_string(output: &mut Vec<u8>, value: &[u8]) {
    encode_string_last(output, value);
    output.push(0);
}

/// Escaped form without a terminator, for the final component of a key.
pub fn encode_string_last(output: &mut Vec<u8>, value: &[u8]) {
    for &b in value {
        output.push(b);
        if b == 0 {
            output.push(0xff);
        }
    }
}

/// Decode a terminated sortable string, returns (value, bytes_consumed).
pub fn decode_string(input: &[u8]) -> Result<(Vec<u8>, usize)> {
    let mut value = Vec::new();
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        i += 1;
        if b == 0 {
            if input.get(i) == Some(&0xff) {
                i += 1;
            } else {
                return Ok((value, i));
            }
        }
        value.push(b);
    }
    Err(Error::new(ErrorKind::MalformedKey, "unterminated key string".to_string()))
}

/// Inverse of `encode_string_last`; consumes the whole input.
pub fn decode_string_last(input: &[u8]) -> Result<Vec<u8>> {
    let mut value = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        i += 1;
        if b == 0 {
            if input.get(i) != Some(&0xff) {
                return Err(Error::new(ErrorKind::MalformedKey, "bare zero in key string".to_string()));
            }
            i += 1;
        }
        value.push(b);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint(v: u32) -> Vec<u8> {
        let mut out = Vec::new();
        encode_uint(&mut out, v);
        out
    }

    fn string(v: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_string(&mut out, v);
        out
    }

    #[test]
    fn uint_layout() {
        assert_eq!(uint(0), vec![0]);
        assert_eq!(uint(5), vec![1, 5]);
        assert_eq!(uint(0x1234), vec![2, 0x12, 0x34]);
        assert_eq!(decode_uint(&uint(u32::MAX)).unwrap(), (u32::MAX, 5));
    }

    #[test]
    fn uint_order_matches_numeric_order() {
        let samples = [0u32, 1, 2, 127, 255, 256, 65_535, 65_536, 1 << 24, u32::MAX - 1, u32::MAX];
        for pair in samples.windows(2) {
            assert!(uint(pair[0]) < uint(pair[1]), "{} vs {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn uint_rejects_bad_lengths() {
        assert_eq!(decode_uint(&[5, 1, 1, 1, 1, 1]).unwrap_err().kind, ErrorKind::Overflow);
        assert_eq!(decode_uint(&[3, 1]).unwrap_err().kind, ErrorKind::Truncated);
        assert_eq!(decode_uint(&[]).unwrap_err().kind, ErrorKind::Truncated);
    }

    #[test]
    fn string_escapes_zero_bytes() {
        assert_eq!(string(b"a\0b"), vec![b'a', 0, 0xff, b'b', 0]);
        let (decoded, used) = decode_string(&string(b"a\0b")).unwrap();
        assert_eq!(decoded, b"a\0b");
        assert_eq!(used, 5);
    }

    #[test]
    fn string_order_matches_byte_order() {
        let samples: [&[u8]; 6] = [b"", b"\0", b"\0\0", b"a", b"a\0", b"ab"];
        for pair in samples.windows(2) {
            assert!(string(pair[0]) < string(pair[1]));
        }
    }

    #[test]
    fn string_followed_by_uint_sorts_by_string_first() {
        let mut a = string(b"dog");
        encode_uint(&mut a, u32::MAX);
        let mut b = string(b"dog\0");
        encode_uint(&mut b, 0);
        assert!(a < b);
        assert!(string(b"dog") < a);
    }

    #[test]
    fn unterminated_string_is_malformed() {
        assert_eq!(decode_string(b"abc").unwrap_err().kind, ErrorKind::MalformedKey);
        assert_eq!(decode_string(&[b'a', 0, 0xff]).unwrap_err().kind, ErrorKind::MalformedKey);
    }

    #[test]
    fn last_component_round_trips() {
        let mut out = Vec::new();
        encode_string_last(&mut out, b"x\0y");
        assert_eq!(decode_string_last(&out).unwrap(), b"x\0y");
        assert!(decode_string_last(&[b'x', 0]).is_err());
    }
}

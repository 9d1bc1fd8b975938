//! Position lists: the strictly increasing token offsets of one term in one
//! document, interpolative coded.
//!
//! A single position is stored as a bare varint. Longer lists store the last
//! position, then bit-packed the first position, the count less two, and the
//! interior positions.

use crate::compression::bitstream::{BitReader, BitWriter};
use crate::compression::sortable;
use crate::compression::vbyte::{ByteReader, VByteEncoder};
use crate::core::error::{Error, Result};
use crate::core::types::DocId;
use crate::storage::table::{KeyValueTable, WritableTable};

pub fn encode_position_list(positions: &[u32]) -> Result<Vec<u8>> {
    let (&first, &last) = match (positions.first(), positions.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(Error::invalid_argument("position list is empty")),
    };
    if let Some(pair) = positions.windows(2).find(|w| w[0] >= w[1]) {
        return Err(Error::invalid_argument(format!(
            "positions must be strictly increasing, found {} then {}",
            pair[0], pair[1]
        )));
    }

    let mut prefix = Vec::with_capacity(8);
    VByteEncoder::encode_u32(&mut prefix, last);
    if positions.len() == 1 {
        return Ok(prefix);
    }

    let header_len = prefix.len();
    let mut writer = BitWriter::with_prefix(prefix);
    writer.encode_bounded(first as u64, last as u64);
    writer.encode_bounded((positions.len() - 2) as u64, (last - first) as u64);
    writer.encode_interpolative(positions, 0, positions.len() - 1);
    let mut encoded = writer.freeze();
    if encoded.len() == header_len {
        // a run like [0, 1] needs no bits but must not read as one position
        encoded.push(0);
    }
    Ok(encoded)
}

/// Reads the header: (last, first, count), or just the bit offset for a
/// single position.
fn read_header<'a>(data: &'a [u8]) -> Result<(u32, Option<(BitReader<'a>, u32, usize)>)> {
    let mut bytes = ByteReader::new(data);
    let last = bytes.read_u32()?;
    if bytes.is_empty() {
        return Ok((last, None));
    }
    let mut bits = BitReader::new(data, bytes.position());
    let first = bits.decode_bounded(last as u64)? as u32;
    let count = bits.decode_bounded((last - first) as u64)? as usize + 2;
    Ok((last, Some((bits, first, count))))
}

pub fn decode_position_list(data: &[u8]) -> Result<Vec<u32>> {
    decode(data).map_err(|e| e.at_record("position list"))
}

fn decode(data: &[u8]) -> Result<Vec<u32>> {
    let (last, rest) = read_header(data)?;
    let Some((mut bits, first, count)) = rest else {
        return Ok(vec![last]);
    };
    let mut positions = vec![0u32; count];
    positions[0] = first;
    positions[count - 1] = last;
    bits.decode_interpolative(&mut positions, 0, count - 1)?;
    Ok(positions)
}

/// Number of positions, read from the header alone.
pub fn position_count(data: &[u8]) -> Result<usize> {
    let (_, rest) = read_header(data).map_err(|e| e.at_record("position list"))?;
    Ok(rest.map_or(1, |(_, _, count)| count))
}

pub fn position_key(did: DocId, term: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(term.len() + 6);
    sortable::encode_uint(&mut key, did.0);
    sortable::encode_string_last(&mut key, term.as_bytes());
    key
}

/// Store `positions`; an empty list removes any stored one.
pub fn set_position_list<T: WritableTable>(table: &mut T, did: DocId, term: &str, positions: &[u32]) -> Result<()> {
    let key = position_key(did, term);
    if positions.is_empty() {
        table.delete(&key)?;
        return Ok(());
    }
    table.put(&key, encode_position_list(positions)?)
}

pub fn get_position_list<T: KeyValueTable>(table: &T, did: DocId, term: &str) -> Result<Vec<u32>> {
    match table.get_exact(&position_key(did, term))? {
        Some(tag) => decode_position_list(&tag),
        None => Err(Error::not_found(format!("no positions for '{}' in document {}", term, did))),
    }
}

/// Zero when nothing is stored.
pub fn get_position_count<T: KeyValueTable>(table: &T, did: DocId, term: &str) -> Result<usize> {
    match table.get_exact(&position_key(did, term))? {
        Some(tag) => position_count(&tag),
        None => Ok(0),
    }
}

pub fn delete_position_list<T: WritableTable>(table: &mut T, did: DocId, term: &str) -> Result<bool> {
    table.delete(&position_key(did, term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::storage::memory::MemoryTable;

    #[test]
    fn single_position_is_a_bare_varint() {
        assert_eq!(encode_position_list(&[300]).unwrap(), vec![0xac, 0x02]);
        assert_eq!(decode_position_list(&[0xac, 0x02]).unwrap(), vec![300]);
        assert_eq!(position_count(&[0xac, 0x02]).unwrap(), 1);
    }

    #[test]
    fn lists_round_trip() {
        let cases: Vec<Vec<u32>> = vec![
            vec![0, 1],
            vec![3, 4, 9, 12],
            vec![1, 2, 3, 4, 5, 6, 7, 8],
            vec![0, 1_000_000, u32::MAX],
            (0..500).map(|i| i * 7 + (i % 3)).collect(),
        ];
        for positions in cases {
            let encoded = encode_position_list(&positions).unwrap();
            assert_eq!(decode_position_list(&encoded).unwrap(), positions);
            assert_eq!(position_count(&encoded).unwrap(), positions.len());
        }
    }

    #[test]
    fn bit_free_pair_is_not_mistaken_for_single_position() {
        for positions in [vec![0u32, 1], vec![5, 6], vec![0, 1, 2]] {
            let encoded = encode_position_list(&positions).unwrap();
            assert_eq!(encoded.len(), 2);
            assert_eq!(decode_position_list(&encoded).unwrap(), positions);
        }
    }

    #[test]
    fn contiguous_run_costs_only_the_header() {
        let positions: Vec<u32> = (100..200).collect();
        let encoded = encode_position_list(&positions).unwrap();
        assert!(encoded.len() <= 4, "{} bytes", encoded.len());
    }

    #[test]
    fn rejects_unsorted_or_repeated_positions() {
        let err = encode_position_list(&[3, 4, 9, 12, 12]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(encode_position_list(&[5, 2]).is_err());
        assert!(encode_position_list(&[]).is_err());
    }

    #[test]
    fn damaged_list_is_corrupt() {
        let encoded = encode_position_list(&[3, 40, 900, 1200]).unwrap();
        let err = decode_position_list(&encoded[..encoded.len() - 1]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DatabaseCorrupt);
        // last position 0 cannot be followed by more positions
        assert_eq!(decode_position_list(&[0, 1]).unwrap_err().kind, ErrorKind::DatabaseCorrupt);
    }

    #[test]
    fn table_helpers() {
        let mut table = MemoryTable::new();
        set_position_list(&mut table, DocId(4), "dog", &[1, 5, 9]).unwrap();
        assert_eq!(get_position_list(&table, DocId(4), "dog").unwrap(), vec![1, 5, 9]);
        assert_eq!(get_position_count(&table, DocId(4), "dog").unwrap(), 3);
        assert_eq!(get_position_count(&table, DocId(4), "cat").unwrap(), 0);
        assert_eq!(get_position_list(&table, DocId(5), "dog").unwrap_err().kind, ErrorKind::NotFound);

        set_position_list(&mut table, DocId(4), "dog", &[]).unwrap();
        assert!(table.is_empty());
    }
}

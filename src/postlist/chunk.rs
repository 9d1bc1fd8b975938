//! Keys and record layout of posting list chunks.
//!
//! The first chunk of a term lives under `sortable_string(term)` and starts
//! with the term totals. Later chunks live under
//! `sortable_string(term) ++ sortable_uint(first_did)`.

use bytes::Bytes;
use crate::compression::sortable;
use crate::compression::vbyte::{pack_bool, ByteReader, VByteEncoder};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::TermTotals;

pub fn first_chunk_key(term: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(term.len() + 1);
    sortable::encode_string(&mut key, term.as_bytes());
    key
}

pub fn chunk_key(term: &str, first_did: u32) -> Vec<u8> {
    let mut key = first_chunk_key(term);
    sortable::encode_uint(&mut key, first_did);
    key
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub term: Vec<u8>,
    /// None for the first chunk of the term
    pub first_did: Option<u32>,
}

pub fn parse_key(key: &[u8]) -> Result<ParsedKey> {
    let (term, used) = sortable::decode_string(key)?;
    let rest = &key[used..];
    if rest.is_empty() {
        return Ok(ParsedKey { term, first_did: None });
    }
    let (did, used) = sortable::decode_uint(rest)?;
    if used != rest.len() {
        return Err(Error::new(ErrorKind::MalformedKey, "trailing bytes after docid".to_string()));
    }
    Ok(ParsedKey { term, first_did: Some(did) })
}

/// Parse `key` and return its first docid if it is a chunk of `term`.
/// `Some(None)` is the term's first chunk, `None` a foreign key.
pub fn key_for_term(key: &[u8], term: &str) -> Result<Option<Option<u32>>> {
    let parsed = parse_key(key)?;
    if parsed.term != term.as_bytes() {
        return Ok(None);
    }
    Ok(Some(parsed.first_did))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub is_last: bool,
    pub first_did: u32,
    pub last_did: u32,
}

impl ChunkHeader {
    pub fn new(first_did: u32, last_did: u32, is_last: bool) -> Self {
        ChunkHeader { is_last, first_did, last_did }
    }

    /// `last - first - 1` wraps for single-entry chunks; decoding undoes it.
    pub fn encode(&self, output: &mut Vec<u8>) {
        pack_bool(output, self.is_last);
        VByteEncoder::encode_u32(output, self.last_did.wrapping_sub(self.first_did).wrapping_sub(1));
    }

    pub fn decode(reader: &mut ByteReader, first_did: u32) -> Result<Self> {
        let is_last = reader.read_bool()?;
        let increase = reader.read_u32()?;
        let last_did = first_did.wrapping_add(increase).wrapping_add(1);
        if last_did < first_did {
            return Err(Error::corrupt(format!(
                "chunk header ends at {} before it starts at {}",
                last_did, first_did
            )));
        }
        Ok(ChunkHeader { is_last, first_did, last_did })
    }
}

/// A chunk record split into its parts.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Present only on a term's first chunk
    pub totals: Option<TermTotals>,
    pub header: ChunkHeader,
    /// Posting entries, first entry without a docid delta
    pub body: Bytes,
}

pub fn encode_subsequent_chunk(header: &ChunkHeader, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 8);
    header.encode(&mut out);
    out.extend_from_slice(body);
    out
}

/// First chunk in the general layout: totals, header, then body.
pub fn encode_first_chunk_general(totals: &TermTotals, header: &ChunkHeader, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 16);
    VByteEncoder::encode_u32(&mut out, header.first_did - 1);
    VByteEncoder::encode_u32(&mut out, totals.collection_frequency);
    VByteEncoder::encode_u32(&mut out, totals.term_frequency - 1);
    header.encode(&mut out);
    out.extend_from_slice(body);
    out
}

/// First chunk, using the single-posting layout when the whole list is one
/// posting whose wdf equals the collection frequency.
pub fn encode_first_chunk(totals: &TermTotals, header: &ChunkHeader, body: &[u8]) -> Vec<u8> {
    if totals.term_frequency == 1 && header.is_last && header.first_did == header.last_did {
        let mut reader = ByteReader::new(body);
        if let (Ok(wdf), Ok(doc_length)) = (reader.read_u32(), reader.read_u32()) {
            if wdf == totals.collection_frequency && reader.is_empty() {
                let mut out = Vec::with_capacity(12);
                VByteEncoder::encode_u32(&mut out, header.first_did - 1);
                VByteEncoder::encode_u32(&mut out, totals.collection_frequency);
                VByteEncoder::encode_u32(&mut out, doc_length);
                return out;
            }
        }
    }
    encode_first_chunk_general(totals, header, body)
}

fn read_first_did(reader: &mut ByteReader) -> Result<u32> {
    reader
        .read_u32()?
        .checked_add(1)
        .ok_or_else(|| Error::new(ErrorKind::Overflow, "first docid out of range".to_string()))
}

pub fn decode_first_chunk(tag: &Bytes) -> Result<ChunkRecord> {
    decode_first(tag).map_err(|e| e.at_record("first posting chunk"))
}

fn decode_first(tag: &Bytes) -> Result<ChunkRecord> {
    let mut reader = ByteReader::new(tag);
    let first_did = read_first_did(&mut reader)?;
    let collection_frequency = reader.read_u32()?;
    let third = reader.read_u32()?;

    if reader.is_empty() {
        // single posting: wdf is the collection frequency, `third` the doc length
        let mut body = Vec::with_capacity(10);
        VByteEncoder::encode_u32(&mut body, collection_frequency);
        VByteEncoder::encode_u32(&mut body, third);
        return Ok(ChunkRecord {
            totals: Some(TermTotals { term_frequency: 1, collection_frequency }),
            header: ChunkHeader::new(first_did, first_did, true),
            body: Bytes::from(body),
        });
    }

    let term_frequency = third
        .checked_add(1)
        .ok_or_else(|| Error::new(ErrorKind::Overflow, "term frequency out of range".to_string()))?;
    let header = ChunkHeader::decode(&mut reader, first_did)?;
    Ok(ChunkRecord {
        totals: Some(TermTotals { term_frequency, collection_frequency }),
        header,
        body: tag.slice(reader.position()..),
    })
}

pub fn decode_subsequent_chunk(first_did: u32, tag: &Bytes) -> Result<ChunkRecord> {
    let mut reader = ByteReader::new(tag);
    let header = ChunkHeader::decode(&mut reader, first_did).map_err(|e| e.at_record("posting chunk"))?;
    Ok(ChunkRecord {
        totals: None,
        header,
        body: tag.slice(reader.position()..),
    })
}

/// Decode whichever kind of chunk `first_did` denotes (None for the first chunk).
pub fn decode_chunk(first_did: Option<u32>, tag: &Bytes) -> Result<ChunkRecord> {
    match first_did {
        None => decode_first_chunk(tag),
        Some(did) => decode_subsequent_chunk(did, tag),
    }
}

/// Re-encode a decoded chunk, keeping the general layout for first chunks.
pub fn encode_record(record: &ChunkRecord) -> Vec<u8> {
    match &record.totals {
        Some(totals) => encode_first_chunk(totals, &record.header, &record.body),
        None => encode_subsequent_chunk(&record.header, &record.body),
    }
}

//! Per-slot value streams.
//!
//! Values of one slot are stored in chunks keyed by
//! `sortable_uint(slot) ++ sortable_uint(last docid in chunk)`. A chunk body
//! is `varint(last - first)`, the first value, then for each further entry
//! `varint(docid gap - 1)` and the value. Statistics for a slot live under
//! `0xff ++ sortable_uint(slot)`, after every chunk key.

use std::collections::BTreeMap;
use bytes::Bytes;
use tracing::trace;
use crate::compression::sortable;
use crate::compression::vbyte::{pack_string, ByteReader, VByteEncoder};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocId;
use crate::storage::table::{KeyValueTable, TableCursor, WritableTable};

const STATS_PREFIX: u8 = 0xff;

pub fn value_chunk_key(slot: u32, last_did: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(10);
    sortable::encode_uint(&mut key, slot);
    sortable::encode_uint(&mut key, last_did);
    key
}

pub fn value_stats_key(slot: u32) -> Vec<u8> {
    let mut key = vec![STATS_PREFIX];
    sortable::encode_uint(&mut key, slot);
    key
}

/// (slot, last docid) of a chunk key; None for a statistics key.
fn parse_chunk_key(key: &[u8]) -> Result<Option<(u32, u32)>> {
    if key.first() == Some(&STATS_PREFIX) {
        return Ok(None);
    }
    let (slot, used) = sortable::decode_uint(key)?;
    let (last, more) = sortable::decode_uint(&key[used..])?;
    if used + more != key.len() {
        return Err(Error::new(ErrorKind::MalformedKey, "trailing bytes in value key".to_string()));
    }
    Ok(Some((slot, last)))
}

/// Last docid of the chunk under the cursor, if it belongs to `slot`.
fn chunk_of_slot<C: TableCursor>(cursor: &C, slot: u32) -> Result<Option<u32>> {
    if cursor.at_end() {
        return Ok(None);
    }
    let parsed = parse_chunk_key(cursor.current_key()).map_err(|e| e.at_record("value chunk key"))?;
    Ok(parsed.filter(|&(s, _)| s == slot).map(|(_, last)| last))
}

/// Sequential decoder for one value chunk.
#[derive(Debug, Clone)]
pub struct ValueChunkReader {
    body: Bytes,
    pos: usize,
    did: u32,
    last_did: u32,
    value: Bytes,
    at_end: bool,
}

impl ValueChunkReader {
    pub fn new(last_did: u32, body: Bytes) -> Result<Self> {
        let mut bytes = ByteReader::new(&body);
        let span = bytes.read_u32().map_err(|e| e.at_record("value chunk"))?;
        let first_did = last_did
            .checked_sub(span)
            .ok_or_else(|| Error::corrupt(format!("value chunk spans {} docids before {}", span, last_did)))?;
        let mut reader = ValueChunkReader {
            pos: bytes.position(),
            body,
            did: first_did,
            last_did,
            value: Bytes::new(),
            at_end: false,
        };
        reader.read_value()?;
        Ok(reader)
    }

    fn read_value(&mut self) -> Result<()> {
        let mut bytes = ByteReader::new(&self.body[self.pos..]);
        let len = bytes.read_string().map_err(|e| e.at_record("value"))?.len();
        let end = self.pos + bytes.position();
        self.value = self.body.slice(end - len..end);
        self.pos = end;
        Ok(())
    }

    pub fn first_did(&self) -> u32 {
        self.did
    }

    pub fn at_end(&self) -> bool {
        self.at_end
    }

    pub fn doc_id(&self) -> u32 {
        self.did
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn next(&mut self) -> Result<()> {
        if self.pos >= self.body.len() {
            if self.did != self.last_did {
                return Err(Error::corrupt(format!(
                    "value chunk ends at {} but its key says {}",
                    self.did, self.last_did
                )));
            }
            self.at_end = true;
            return Ok(());
        }
        let mut bytes = ByteReader::new(&self.body[self.pos..]);
        let gap = bytes.read_u32().map_err(|e| e.at_record("value docid delta"))?;
        self.pos += bytes.position();
        self.did = self
            .did
            .checked_add(gap)
            .and_then(|d| d.checked_add(1))
            .filter(|&d| d <= self.last_did)
            .ok_or_else(|| Error::corrupt("value chunk runs past its last docid"))?;
        self.read_value()
    }
}

struct ValueRun {
    first_did: u32,
    last_did: u32,
    body: Vec<u8>,
}

/// Applies ascending per-document changes to one slot's chunks, copying
/// untouched entries through.
pub struct ValueUpdater<'t, T: WritableTable> {
    table: &'t mut T,
    slot: u32,
    threshold: usize,
    loaded: bool,
    reader: Option<ValueChunkReader>,
    orig_key: Option<Vec<u8>>,
    run: Option<ValueRun>,
    last_allowed_did: u32,
}

impl<'t, T: WritableTable> ValueUpdater<'t, T> {
    pub fn new(table: &'t mut T, slot: u32, threshold: usize) -> Self {
        ValueUpdater {
            table,
            slot,
            threshold,
            loaded: false,
            reader: None,
            orig_key: None,
            run: None,
            last_allowed_did: u32::MAX,
        }
    }

    /// Set the value of `did`; `None` or an empty value removes it.
    pub fn update(&mut self, did: u32, value: Option<&[u8]>) -> Result<()> {
        if self.loaded && did > self.last_allowed_did {
            self.copy_rest()?;
            self.write_chunk()?;
            self.loaded = false;
        }
        if !self.loaded {
            self.load_chunk(did)?;
            self.loaded = true;
        }

        while let Some(reader) = self.reader.as_mut() {
            if reader.at_end() || reader.doc_id() >= did {
                if !reader.at_end() && reader.doc_id() == did {
                    reader.next()?;
                }
                break;
            }
            let (copy_did, copy_value) = (reader.doc_id(), reader.value().clone());
            reader.next()?;
            self.append(copy_did, &copy_value)?;
        }

        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.append(did, value)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        if self.loaded {
            self.copy_rest()?;
            self.write_chunk()?;
        }
        Ok(())
    }

    fn load_chunk(&mut self, did: u32) -> Result<()> {
        self.reader = None;
        self.orig_key = None;
        self.last_allowed_did = u32::MAX;

        let mut cursor = self.table.cursor();
        cursor.seek_ge(&value_chunk_key(self.slot, did));
        let found = match chunk_of_slot(&cursor, self.slot)? {
            Some(last) => {
                let tag = cursor.read_tag()?;
                let orig_key = cursor.current_key().to_vec();
                cursor.next();
                if let Some(next_last) = chunk_of_slot(&cursor, self.slot)? {
                    let next = ValueChunkReader::new(next_last, cursor.read_tag()?)?;
                    if next.first_did() <= last {
                        return Err(Error::corrupt(format!("value chunks of slot {} overlap", self.slot)));
                    }
                    self.last_allowed_did = next.first_did() - 1;
                }
                Some((orig_key, last, tag))
            }
            None => {
                // nothing at or after `did`: extend the slot's final chunk
                cursor.seek_le(&value_chunk_key(self.slot, did));
                match chunk_of_slot(&cursor, self.slot)? {
                    Some(last) => Some((cursor.current_key().to_vec(), last, cursor.read_tag()?)),
                    None => None,
                }
            }
        };

        if let Some((orig_key, last, tag)) = found {
            self.reader = Some(ValueChunkReader::new(last, tag)?);
            self.orig_key = Some(orig_key);
        }
        Ok(())
    }

    fn copy_rest(&mut self) -> Result<()> {
        while let Some(reader) = self.reader.as_mut() {
            if reader.at_end() {
                break;
            }
            let (copy_did, copy_value) = (reader.doc_id(), reader.value().clone());
            reader.next()?;
            self.append(copy_did, &copy_value)?;
        }
        Ok(())
    }

    fn append(&mut self, did: u32, value: &[u8]) -> Result<()> {
        match self.run.as_mut() {
            None => {
                let mut body = Vec::with_capacity(value.len() + 8);
                pack_string(&mut body, value);
                self.run = Some(ValueRun { first_did: did, last_did: did, body });
            }
            Some(run) => {
                VByteEncoder::encode_u32(&mut run.body, did - run.last_did - 1);
                pack_string(&mut run.body, value);
                run.last_did = did;
            }
        }
        if self.run.as_ref().is_some_and(|r| r.body.len() >= self.threshold) {
            trace!(slot = self.slot, at = did, "value chunk full");
            self.write_chunk()?;
        }
        Ok(())
    }

    fn write_chunk(&mut self) -> Result<()> {
        let orig = self.orig_key.take();
        let Some(run) = self.run.take() else {
            if let Some(orig) = orig {
                self.table.delete(&orig)?;
            }
            return Ok(());
        };
        let key = value_chunk_key(self.slot, run.last_did);
        if let Some(orig) = orig.filter(|orig| *orig != key) {
            self.table.delete(&orig)?;
        }
        let mut tag = Vec::with_capacity(run.body.len() + 5);
        VByteEncoder::encode_u32(&mut tag, run.last_did - run.first_did);
        tag.extend_from_slice(&run.body);
        self.table.put(&key, tag)
    }
}

/// Apply sorted changes for one slot.
pub fn update_slot<T: WritableTable>(
    table: &mut T,
    slot: u32,
    changes: &BTreeMap<DocId, Option<Vec<u8>>>,
    threshold: usize,
) -> Result<()> {
    let mut updater = ValueUpdater::new(table, slot, threshold);
    for (did, value) in changes {
        updater.update(did.0, value.as_deref())?;
    }
    updater.finish()
}

pub fn get_value<T: KeyValueTable>(table: &T, did: DocId, slot: u32) -> Result<Option<Bytes>> {
    let mut cursor = table.cursor();
    cursor.seek_ge(&value_chunk_key(slot, did.0));
    let Some(last) = chunk_of_slot(&cursor, slot)? else {
        return Ok(None);
    };
    let mut reader = ValueChunkReader::new(last, cursor.read_tag()?)?;
    while !reader.at_end() && reader.doc_id() < did.0 {
        reader.next()?;
    }
    if !reader.at_end() && reader.doc_id() == did.0 {
        return Ok(Some(reader.value().clone()));
    }
    Ok(None)
}

/// Every `(docid, value)` of `slot` in docid order.
pub fn value_stream<T: KeyValueTable>(table: &T, slot: u32) -> Result<Vec<(DocId, Bytes)>> {
    let mut out = Vec::new();
    let mut cursor = table.cursor();
    cursor.seek_ge(&value_chunk_key(slot, 0));
    while let Some(last) = chunk_of_slot(&cursor, slot)? {
        let mut reader = ValueChunkReader::new(last, cursor.read_tag()?)?;
        if out.last().is_some_and(|(prev, _): &(DocId, Bytes)| prev.0 >= reader.first_did()) {
            return Err(Error::corrupt(format!("value chunks of slot {} overlap", slot)));
        }
        while !reader.at_end() {
            out.push((DocId(reader.doc_id()), reader.value().clone()));
            reader.next()?;
        }
        cursor.next();
    }
    Ok(out)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueStats {
    pub freq: u32,
    pub lower_bound: Vec<u8>,
    pub upper_bound: Vec<u8>,
}

impl ValueStats {
    pub fn add(&mut self, value: &[u8]) {
        if self.freq == 0 {
            self.lower_bound = value.to_vec();
            self.upper_bound = value.to_vec();
        } else if value < self.lower_bound.as_slice() {
            self.lower_bound = value.to_vec();
        } else if value > self.upper_bound.as_slice() {
            self.upper_bound = value.to_vec();
        }
        self.freq += 1;
    }

    /// Bounds stay as they are until the slot empties.
    pub fn remove(&mut self) {
        self.freq = self.freq.saturating_sub(1);
        if self.freq == 0 {
            self.lower_bound.clear();
            self.upper_bound.clear();
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        VByteEncoder::encode_u32(&mut out, self.freq);
        pack_string(&mut out, &self.lower_bound);
        pack_string(&mut out, &self.upper_bound);
        out
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let freq = reader.read_u32()?;
        let lower_bound = reader.read_string()?.to_vec();
        let upper_bound = reader.read_string()?.to_vec();
        Ok(ValueStats { freq, lower_bound, upper_bound })
    }
}

pub fn get_value_stats<T: KeyValueTable>(table: &T, slot: u32) -> Result<ValueStats> {
    match table.get_exact(&value_stats_key(slot))? {
        Some(tag) => ValueStats::decode(&tag).map_err(|e| e.at_record("value statistics")),
        None => Ok(ValueStats::default()),
    }
}

pub fn set_value_stats<T: WritableTable>(table: &mut T, slot: u32, stats: &ValueStats) -> Result<()> {
    if stats.freq == 0 {
        table.delete(&value_stats_key(slot))?;
        return Ok(());
    }
    table.put(&value_stats_key(slot), stats.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryTable;

    fn apply(table: &mut MemoryTable, slot: u32, changes: &[(u32, Option<&str>)], threshold: usize) {
        let changes: BTreeMap<DocId, Option<Vec<u8>>> = changes
            .iter()
            .map(|&(did, v)| (DocId(did), v.map(|s| s.as_bytes().to_vec())))
            .collect();
        update_slot(table, slot, &changes, threshold).unwrap();
    }

    fn stream(table: &MemoryTable, slot: u32) -> Vec<(u32, String)> {
        value_stream(table, slot)
            .unwrap()
            .into_iter()
            .map(|(did, v)| (did.0, String::from_utf8(v.to_vec()).unwrap()))
            .collect()
    }

    #[test]
    fn set_replace_and_remove() {
        let mut table = MemoryTable::new();
        apply(&mut table, 0, &[(1, Some("a")), (4, Some("d")), (9, Some("i"))], 2000);
        assert_eq!(stream(&table, 0), vec![(1, "a".into()), (4, "d".into()), (9, "i".into())]);
        assert!(table.get_exact(&value_chunk_key(0, 9)).unwrap().is_some());

        apply(&mut table, 0, &[(4, Some("D")), (9, None), (12, Some("l"))], 2000);
        assert_eq!(stream(&table, 0), vec![(1, "a".into()), (4, "D".into()), (12, "l".into())]);
        assert!(table.get_exact(&value_chunk_key(0, 9)).unwrap().is_none());
        assert_eq!(get_value(&table, DocId(4), 0).unwrap().unwrap(), Bytes::from_static(b"D"));
        assert!(get_value(&table, DocId(9), 0).unwrap().is_none());

        apply(&mut table, 0, &[(1, None), (4, None), (12, Some(""))], 2000);
        assert!(table.is_empty());
    }

    #[test]
    fn slots_do_not_mix() {
        let mut table = MemoryTable::new();
        apply(&mut table, 1, &[(5, Some("one"))], 2000);
        apply(&mut table, 2, &[(3, Some("two"))], 2000);
        assert_eq!(stream(&table, 1), vec![(5, "one".into())]);
        assert_eq!(stream(&table, 2), vec![(3, "two".into())]);
        assert!(get_value(&table, DocId(3), 1).unwrap().is_none());
    }

    #[test]
    fn large_streams_split_and_accept_later_updates() {
        let mut table = MemoryTable::new();
        let initial: Vec<(u32, Option<&str>)> = (1..=200).map(|d| (d * 2, Some("value"))).collect();
        apply(&mut table, 7, &initial, 64);
        assert!(table.len() > 3);

        apply(&mut table, 7, &[(3, Some("odd")), (200, None), (399, Some("odd")), (1000, Some("end"))], 64);
        let got = stream(&table, 7);
        assert_eq!(got.len(), 202);
        assert!(got.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(got.contains(&(3, "odd".into())));
        assert!(got.contains(&(399, "odd".into())));
        assert!(!got.iter().any(|(d, _)| *d == 200));
        assert_eq!(got.last().unwrap(), &(1000, "end".into()));
    }

    #[test]
    fn stats_track_bounds_and_clear_when_empty() {
        let mut stats = ValueStats::default();
        stats.add(b"m");
        stats.add(b"c");
        stats.add(b"x");
        assert_eq!((stats.freq, stats.lower_bound.as_slice(), stats.upper_bound.as_slice()), (3, &b"c"[..], &b"x"[..]));

        let mut table = MemoryTable::new();
        set_value_stats(&mut table, 3, &stats).unwrap();
        assert_eq!(get_value_stats(&table, 3).unwrap(), stats);

        for _ in 0..3 {
            stats.remove();
        }
        assert_eq!(stats, ValueStats::default());
        set_value_stats(&mut table, 3, &stats).unwrap();
        assert!(table.is_empty());
    }
}

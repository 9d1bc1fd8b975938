use tracing::trace;
use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, Result};
use crate::core::types::TermTotals;
use crate::postlist::chunk::{
    chunk_key, decode_chunk, decode_subsequent_chunk, encode_first_chunk, encode_record,
    encode_subsequent_chunk, first_chunk_key, key_for_term, ChunkHeader,
};
use crate::storage::table::{KeyValueTable, TableCursor, WritableTable};

/// Where a chunk sits in its term's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPlace {
    /// First and last
    Sole,
    /// First, with successors
    Head,
    Interior,
    /// Last, with predecessors
    Tail,
}

impl ChunkPlace {
    pub fn new(is_first: bool, is_last: bool) -> Self {
        match (is_first, is_last) {
            (true, true) => ChunkPlace::Sole,
            (true, false) => ChunkPlace::Head,
            (false, false) => ChunkPlace::Interior,
            (false, true) => ChunkPlace::Tail,
        }
    }

    pub fn is_first(self) -> bool {
        matches!(self, ChunkPlace::Sole | ChunkPlace::Head)
    }

    pub fn is_last(self) -> bool {
        matches!(self, ChunkPlace::Sole | ChunkPlace::Tail)
    }

    /// Same chunk after a new chunk has been split off behind it.
    fn continued(self) -> Self {
        ChunkPlace::new(self.is_first(), false)
    }

    /// The chunk split off behind this one.
    fn successor(self) -> Self {
        ChunkPlace::new(false, self.is_last())
    }
}

#[derive(Debug, Clone)]
struct ChunkRun {
    first_did: u32,
    last_did: u32,
    body: Vec<u8>,
}

impl ChunkRun {
    fn start(did: u32, wdf: u32, doc_length: u32) -> Self {
        let mut body = Vec::with_capacity(64);
        VByteEncoder::encode_u32(&mut body, wdf);
        VByteEncoder::encode_u32(&mut body, doc_length);
        ChunkRun { first_did: did, last_did: did, body }
    }

    fn push(&mut self, did: u32, wdf: u32, doc_length: u32) {
        VByteEncoder::encode_u32(&mut self.body, did - self.last_did - 1);
        VByteEncoder::encode_u32(&mut self.body, wdf);
        VByteEncoder::encode_u32(&mut self.body, doc_length);
        self.last_did = did;
    }

    fn header(&self, place: ChunkPlace) -> ChunkHeader {
        ChunkHeader::new(self.first_did, self.last_did, place.is_last())
    }
}

/// Accumulates the rewritten contents of one chunk and stores them on
/// `flush`, splitting into extra chunks when the body outgrows the
/// threshold.
#[derive(Debug)]
pub struct ChunkWriter {
    term: String,
    /// Key the chunk was read from; None when nothing is stored under it yet
    orig_key: Option<Vec<u8>>,
    place: ChunkPlace,
    run: Option<ChunkRun>,
    totals: TermTotals,
    threshold: usize,
}

impl ChunkWriter {
    pub fn new(
        term: &str,
        orig_key: Option<Vec<u8>>,
        place: ChunkPlace,
        totals: TermTotals,
        threshold: usize,
    ) -> Self {
        ChunkWriter {
            term: term.to_string(),
            orig_key,
            place,
            run: None,
            totals,
            threshold,
        }
    }

    pub fn place(&self) -> ChunkPlace {
        self.place
    }

    pub fn is_empty(&self) -> bool {
        self.run.is_none()
    }

    pub fn append<T: WritableTable>(
        &mut self,
        table: &mut T,
        did: u32,
        wdf: u32,
        doc_length: u32,
    ) -> Result<()> {
        let Some(run) = self.run.as_mut() else {
            self.run = Some(ChunkRun::start(did, wdf, doc_length));
            return Ok(());
        };
        debug_assert!(did > run.last_did, "postings must be appended in docid order");
        if run.body.len() < self.threshold {
            run.push(did, wdf, doc_length);
            return Ok(());
        }

        trace!(term = %self.term, at = did, "splitting posting chunk");
        let place = self.place;
        self.place = place.continued();
        self.flush(table)?;
        self.place = place.successor();
        self.orig_key = None;
        self.run = Some(ChunkRun::start(did, wdf, doc_length));
        Ok(())
    }

    /// Take over an already-encoded body covering `first_did..=last_did`.
    pub fn raw_append(&mut self, first_did: u32, last_did: u32, body: &[u8]) {
        debug_assert!(self.run.is_none(), "raw append onto a started chunk");
        self.run = Some(ChunkRun {
            first_did,
            last_did,
            body: body.to_vec(),
        });
    }

    pub fn flush<T: WritableTable>(&mut self, table: &mut T) -> Result<()> {
        match (self.place, self.run.take()) {
            (place, Some(run)) if place.is_first() => {
                let tag = encode_first_chunk(&self.totals, &run.header(place), &run.body);
                table.put(&first_chunk_key(&self.term), tag)
            }
            (place, Some(run)) => {
                let key = chunk_key(&self.term, run.first_did);
                if let Some(orig) = self.orig_key.take().filter(|orig| *orig != key) {
                    trace!(term = %self.term, first = run.first_did, "re-keying posting chunk");
                    table.delete(&orig)?;
                }
                table.put(&key, encode_subsequent_chunk(&run.header(place), &run.body))
            }
            (ChunkPlace::Head, None) => self.promote_next_chunk(table),
            (place, None) => {
                let Some(orig) = self.orig_key.take() else {
                    return Ok(());
                };
                table.delete(&orig)?;
                if place == ChunkPlace::Tail {
                    self.mark_previous_chunk_last(table, &orig)?;
                }
                Ok(())
            }
        }
    }

    /// The first chunk emptied out: the next chunk becomes the first one.
    fn promote_next_chunk<T: WritableTable>(&mut self, table: &mut T) -> Result<()> {
        let orig = self
            .orig_key
            .take()
            .unwrap_or_else(|| first_chunk_key(&self.term));

        let (next_key, first_did, tag) = {
            let mut cursor = table.cursor();
            if !cursor.seek_ge(&orig) {
                return Err(Error::corrupt(format!("first chunk of '{}' disappeared", self.term)));
            }
            if !cursor.next() {
                return Err(Error::corrupt(format!(
                    "expected another chunk of '{}' but found none",
                    self.term
                )));
            }
            let next_key = cursor.current_key().to_vec();
            let first_did = match key_for_term(&next_key, &self.term).map_err(|e| e.at_record("chunk key"))? {
                Some(Some(did)) => did,
                _ => {
                    return Err(Error::corrupt(format!(
                        "expected another chunk of '{}' but found a different key",
                        self.term
                    )));
                }
            };
            (next_key, first_did, cursor.read_tag()?)
        };

        trace!(term = %self.term, first = first_did, "promoting chunk to first chunk");
        let record = decode_subsequent_chunk(first_did, &tag)?;
        let promoted = encode_first_chunk(&self.totals, &record.header, &record.body);
        table.delete(&next_key)?;
        table.put(&orig, promoted)
    }

    /// The last chunk was deleted: its predecessor becomes the last one.
    fn mark_previous_chunk_last<T: WritableTable>(&mut self, table: &mut T, deleted: &[u8]) -> Result<()> {
        let (prev_key, first_did, tag) = {
            let mut cursor = table.cursor();
            if cursor.seek_le(deleted) {
                return Err(Error::corrupt(format!("chunk of '{}' was not deleted", self.term)));
            }
            if cursor.at_end() {
                return Err(Error::corrupt(format!("no chunk of '{}' before its last chunk", self.term)));
            }
            let prev_key = cursor.current_key().to_vec();
            let first_did = key_for_term(&prev_key, &self.term)
                .map_err(|e| e.at_record("chunk key"))?
                .ok_or_else(|| {
                    Error::corrupt(format!("chunk before last chunk of '{}' has another term", self.term))
                })?;
            (prev_key, first_did, cursor.read_tag()?)
        };

        trace!(term = %self.term, "marking previous chunk as last");
        let mut record = decode_chunk(first_did, &tag)?;
        record.header.is_last = true;
        table.put(&prev_key, encode_record(&record))
    }
}

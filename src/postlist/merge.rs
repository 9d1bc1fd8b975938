use std::collections::BTreeMap;
use tracing::debug;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, TermTotals};
use crate::postlist::chunk::{
    chunk_key, decode_chunk, decode_first_chunk, encode_first_chunk_general, first_chunk_key,
    key_for_term,
};
use crate::postlist::reader::ChunkReader;
use crate::postlist::writer::{ChunkPlace, ChunkWriter};
use crate::storage::table::{KeyValueTable, TableCursor, WritableTable};

/// Buffered change to one posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingChange {
    /// New posting with this wdf
    Added(u32),
    /// Existing posting rewritten with this wdf
    Modified(u32),
    Deleted,
}

impl PostingChange {
    pub fn new_wdf(self) -> Option<u32> {
        match self {
            PostingChange::Added(wdf) | PostingChange::Modified(wdf) => Some(wdf),
            PostingChange::Deleted => None,
        }
    }

    pub fn is_add(self) -> bool {
        matches!(self, PostingChange::Added(_))
    }
}

/// Signed adjustment to a term's totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreqDelta {
    pub term_frequency: i64,
    pub collection_frequency: i64,
}

impl FreqDelta {
    pub fn is_zero(&self) -> bool {
        self.term_frequency == 0 && self.collection_frequency == 0
    }
}

/// A chunk opened for rewriting.
pub struct Chunk {
    /// None when the stored body was handed to the writer unread
    pub reader: Option<ChunkReader>,
    pub writer: ChunkWriter,
    /// Highest docid that belongs in this chunk
    pub max_did: u32,
}

pub fn term_totals<T: KeyValueTable>(table: &T, term: &str) -> Result<Option<TermTotals>> {
    match table.get_exact(&first_chunk_key(term))? {
        Some(tag) => Ok(decode_first_chunk(&tag)?.totals),
        None => Ok(None),
    }
}

pub fn get_term_frequency<T: KeyValueTable>(table: &T, term: &str) -> Result<u32> {
    Ok(term_totals(table, term)?.map_or(0, |t| t.term_frequency))
}

pub fn get_collection_frequency<T: KeyValueTable>(table: &T, term: &str) -> Result<u32> {
    Ok(term_totals(table, term)?.map_or(0, |t| t.collection_frequency))
}

/// Open the chunk of `term` that `did` belongs in.
///
/// With no stored list this is only legal when `adding`, and yields a
/// writer for a brand new list.
pub fn get_chunk<T: WritableTable>(
    table: &T,
    term: &str,
    did: u32,
    adding: bool,
    totals: TermTotals,
    threshold: usize,
) -> Result<Chunk> {
    let mut cursor = table.cursor();
    cursor.seek_le(&chunk_key(term, did));

    let located = if cursor.at_end() {
        None
    } else {
        key_for_term(cursor.current_key(), term).map_err(|e| e.at_record("posting chunk key"))?
    };
    let Some(key_did) = located else {
        if !adding {
            return Err(Error::corrupt(format!(
                "attempted to change docid {} in missing posting list '{}'",
                did, term
            )));
        }
        return Ok(Chunk {
            reader: None,
            writer: ChunkWriter::new(term, None, ChunkPlace::Sole, totals, threshold),
            max_did: u32::MAX,
        });
    };

    let orig_key = cursor.current_key().to_vec();
    let record = decode_chunk(key_did, &cursor.read_tag()?)?;
    let header = record.header;

    let max_did = if header.is_last {
        u32::MAX
    } else {
        if !cursor.next() {
            return Err(Error::corrupt(format!("chunk list of '{}' ends without a last chunk", term)));
        }
        match key_for_term(cursor.current_key(), term).map_err(|e| e.at_record("posting chunk key"))? {
            Some(Some(next_first)) if next_first > header.last_did => next_first - 1,
            _ => {
                return Err(Error::corrupt(format!(
                    "chunk of '{}' ending at {} has no valid successor",
                    term, header.last_did
                )));
            }
        }
    };

    let place = ChunkPlace::new(key_did.is_none(), header.is_last);
    let mut writer = ChunkWriter::new(term, Some(orig_key), place, totals, threshold);
    let reader = if did > header.last_did {
        writer.raw_append(header.first_did, header.last_did, &record.body);
        None
    } else {
        Some(ChunkReader::new(header.first_did, record.body)?)
    };

    Ok(Chunk { reader, writer, max_did })
}

/// Apply buffered posting changes to the stored posting lists.
///
/// `changes` holds, per term, the changed docids in ascending order;
/// `doc_lengths` the new length of every added or modified document;
/// `freq_deltas` the per-term adjustment to the stored totals.
pub fn merge_changes<T: WritableTable>(
    table: &mut T,
    changes: &BTreeMap<String, BTreeMap<DocId, PostingChange>>,
    doc_lengths: &BTreeMap<DocId, u32>,
    freq_deltas: &BTreeMap<String, FreqDelta>,
    chunk_threshold: usize,
) -> Result<()> {
    for (term, term_changes) in changes {
        if term_changes.is_empty() {
            continue;
        }
        let delta = freq_deltas.get(term).copied().unwrap_or_default();
        merge_term(table, term, term_changes, doc_lengths, delta, chunk_threshold)?;
    }
    Ok(())
}

fn apply_delta(stored: u32, delta: i64, term: &str, what: &str) -> Result<u32> {
    u32::try_from(stored as i64 + delta).map_err(|_| {
        Error::corrupt(format!("{} of '{}' would become {} + {}", what, term, stored, delta))
    })
}

fn merge_term<T: WritableTable>(
    table: &mut T,
    term: &str,
    term_changes: &BTreeMap<DocId, PostingChange>,
    doc_lengths: &BTreeMap<DocId, u32>,
    delta: FreqDelta,
    threshold: usize,
) -> Result<()> {
    let first_key = first_chunk_key(term);
    let stored = match table.get_exact(&first_key)? {
        Some(tag) => Some(decode_first_chunk(&tag)?),
        None => None,
    };
    let old = stored.as_ref().and_then(|r| r.totals).unwrap_or_default();
    let totals = TermTotals {
        term_frequency: apply_delta(old.term_frequency, delta.term_frequency, term, "term frequency")?,
        collection_frequency: apply_delta(
            old.collection_frequency,
            delta.collection_frequency,
            term,
            "collection frequency",
        )?,
    };
    debug!(term, changes = term_changes.len(), tf = totals.term_frequency, "merging posting list");

    if totals.term_frequency == 0 {
        return delete_posting_list(table, term);
    }
    if let Some(record) = &stored {
        table.put(&first_key, encode_first_chunk_general(&totals, &record.header, &record.body))?;
    }

    let Some((first_did, first_change)) = term_changes.iter().next() else {
        return Ok(());
    };
    let mut chunk = get_chunk(table, term, first_did.0, first_change.is_add(), totals, threshold)?;

    for (&doc_id, &change) in term_changes {
        let did = doc_id.0;
        let mut present = false;
        loop {
            if let Some(reader) = chunk.reader.as_mut() {
                while !reader.at_end() {
                    let copy_did = reader.doc_id();
                    if copy_did >= did {
                        if copy_did == did {
                            present = true;
                            reader.next()?;
                        }
                        break;
                    }
                    chunk.writer.append(table, copy_did, reader.wdf(), reader.doc_length())?;
                    reader.next()?;
                }
            }
            let exhausted = chunk.reader.as_ref().is_none_or(|r| r.at_end());
            if exhausted && did > chunk.max_did {
                chunk.writer.flush(table)?;
                chunk = get_chunk(table, term, did, false, totals, threshold)?;
                continue;
            }
            break;
        }

        if change.is_add() {
            assert!(!present, "document {} added to '{}' is already in its posting list", did, term);
        } else {
            assert!(present, "document {} changed in '{}' is not in its posting list", did, term);
        }

        if let Some(wdf) = change.new_wdf() {
            let doc_length = *doc_lengths.get(&doc_id).ok_or_else(|| {
                Error::invalid_argument(format!("no length buffered for document {}", did))
            })?;
            chunk.writer.append(table, did, wdf, doc_length)?;
        }
    }

    if let Some(reader) = chunk.reader.as_mut() {
        while !reader.at_end() {
            chunk.writer.append(table, reader.doc_id(), reader.wdf(), reader.doc_length())?;
            reader.next()?;
        }
    }
    chunk.writer.flush(table)
}

/// Remove every chunk stored for `term`.
pub fn delete_posting_list<T: WritableTable>(table: &mut T, term: &str) -> Result<()> {
    let keys = {
        let mut keys = Vec::new();
        let mut cursor = table.cursor();
        cursor.seek_ge(&first_chunk_key(term));
        while !cursor.at_end() {
            if key_for_term(cursor.current_key(), term)
                .map_err(|e| e.at_record("posting chunk key"))?
                .is_none()
            {
                break;
            }
            keys.push(cursor.current_key().to_vec());
            cursor.next();
        }
        keys
    };
    debug!(term, chunks = keys.len(), "deleting posting list");
    for key in keys {
        table.delete(&key)?;
    }
    Ok(())
}

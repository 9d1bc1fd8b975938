use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Posting, TermTotals};
use crate::index::positions::get_position_list;
use crate::postlist::chunk::{
    chunk_key, decode_chunk, decode_first_chunk, decode_subsequent_chunk, first_chunk_key,
    key_for_term, ChunkHeader,
};
use crate::postlist::reader::ChunkReader;
use crate::storage::table::{KeyValueTable, TableCursor};

/// Walks one term's posting list across its chunks.
///
/// The iterator starts before the first posting; `advance` or `skip_to`
/// moves onto it.
pub struct PostingListIterator<'a, T: KeyValueTable + 'a> {
    term: String,
    cursor: T::Cursor<'a>,
    positions: Option<&'a T>,
    totals: TermTotals,
    current: Option<(ChunkHeader, ChunkReader)>,
    started: bool,
}

impl<'a, T: KeyValueTable + 'a> PostingListIterator<'a, T> {
    /// A missing term gives an empty iterator.
    pub fn new(table: &'a T, term: &str) -> Result<Self> {
        let mut cursor = table.cursor();
        let mut totals = TermTotals::default();
        let mut current = None;
        if cursor.seek_ge(&first_chunk_key(term)) {
            let record = decode_first_chunk(&cursor.read_tag()?)?;
            totals = record.totals.unwrap_or_default();
            current = Some((record.header, ChunkReader::new(record.header.first_did, record.body)?));
        }
        Ok(PostingListIterator {
            term: term.to_string(),
            cursor,
            positions: None,
            totals,
            current,
            started: false,
        })
    }

    /// Attach the position table `read_position_list` reads from.
    pub fn with_positions(mut self, positions: &'a T) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn term_frequency(&self) -> u32 {
        self.totals.term_frequency
    }

    pub fn collection_frequency(&self) -> u32 {
        self.totals.collection_frequency
    }

    pub fn at_end(&self) -> bool {
        self.started && self.current.is_none()
    }

    /// Posting under the iterator, if it has been moved onto one.
    pub fn posting(&self) -> Option<Posting> {
        if !self.started {
            return None;
        }
        self.current.as_ref().map(|(_, reader)| reader.posting())
    }

    pub fn advance(&mut self) -> Result<Option<Posting>> {
        if !self.started {
            self.started = true;
            return Ok(self.posting());
        }
        let Some((_, reader)) = self.current.as_mut() else {
            return Ok(None);
        };
        reader.next()?;
        if reader.at_end() {
            self.next_chunk()?;
        }
        Ok(self.posting())
    }

    /// Move to the first posting with docid `>= target`.
    pub fn skip_to(&mut self, target: DocId) -> Result<Option<Posting>> {
        self.started = true;
        let Some((header, reader)) = self.current.as_ref() else {
            return Ok(None);
        };
        if reader.doc_id() >= target.0 {
            return Ok(self.posting());
        }
        if target.0 > header.last_did {
            self.move_to_chunk_containing(target.0)?;
        }
        while let Some((_, reader)) = self.current.as_mut() {
            if reader.doc_id() >= target.0 {
                break;
            }
            reader.next()?;
            if reader.at_end() {
                self.next_chunk()?;
            }
        }
        Ok(self.posting())
    }

    fn move_to_chunk_containing(&mut self, did: u32) -> Result<()> {
        self.cursor.seek_le(&chunk_key(&self.term, did));
        let first_did = if self.cursor.at_end() {
            None
        } else {
            key_for_term(self.cursor.current_key(), &self.term)
                .map_err(|e| e.at_record("posting chunk key"))?
        };
        let Some(first_did) = first_did else {
            return Err(Error::corrupt(format!("posting list of '{}' lost its chunks", self.term)));
        };
        let record = decode_chunk(first_did, &self.cursor.read_tag()?)?;
        let header = record.header;
        self.current = Some((header, ChunkReader::new(header.first_did, record.body)?));
        if did > header.last_did {
            self.next_chunk()?;
        }
        Ok(())
    }

    fn next_chunk(&mut self) -> Result<()> {
        let Some((header, _)) = self.current.take() else {
            return Ok(());
        };
        if header.is_last {
            return Ok(());
        }
        if !self.cursor.next() {
            return Err(Error::corrupt(format!(
                "posting list of '{}' ends before its last chunk",
                self.term
            )));
        }
        let first_did = match key_for_term(self.cursor.current_key(), &self.term)
            .map_err(|e| e.at_record("posting chunk key"))?
        {
            Some(Some(did)) => did,
            _ => {
                return Err(Error::corrupt(format!(
                    "expected another chunk of '{}' after docid {}",
                    self.term, header.last_did
                )));
            }
        };
        if first_did <= header.last_did {
            return Err(Error::corrupt(format!(
                "chunks of '{}' overlap at docid {}",
                self.term, first_did
            )));
        }
        let record = decode_subsequent_chunk(first_did, &self.cursor.read_tag()?)?;
        self.current = Some((record.header, ChunkReader::new(first_did, record.body)?));
        Ok(())
    }

    /// Positions of the term in the current document.
    pub fn read_position_list(&self) -> Result<Vec<u32>> {
        if self.term.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                "the document length list has no positions".to_string(),
            ));
        }
        let positions = self.positions.ok_or_else(|| {
            Error::new(ErrorKind::InvalidOperation, "no position table attached".to_string())
        })?;
        let posting = self.posting().ok_or_else(|| {
            Error::new(ErrorKind::InvalidOperation, "iterator is not on a posting".to_string())
        })?;
        get_position_list(positions, posting.doc_id, &self.term)
    }
}

impl<'a, T: KeyValueTable + 'a> Iterator for PostingListIterator<'a, T> {
    type Item = Result<Posting>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

use bytes::Bytes;
use crate::compression::vbyte::ByteReader;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Posting};

/// Sequential decoder for the postings in one chunk body.
#[derive(Debug, Clone)]
pub struct ChunkReader {
    body: Bytes,
    pos: usize,
    did: u32,
    wdf: u32,
    doc_length: u32,
    at_end: bool,
}

impl ChunkReader {
    /// Positions on the first posting, whose docid is `first_did`.
    pub fn new(first_did: u32, body: Bytes) -> Result<Self> {
        let mut reader = ChunkReader {
            body,
            pos: 0,
            did: first_did,
            wdf: 0,
            doc_length: 0,
            at_end: false,
        };
        if reader.body.is_empty() {
            return Err(Error::corrupt(format!("empty posting chunk starting at {}", first_did)));
        }
        reader.read_wdf_and_length()?;
        Ok(reader)
    }

    fn read_wdf_and_length(&mut self) -> Result<()> {
        let mut bytes = ByteReader::new(&self.body[self.pos..]);
        self.wdf = bytes.read_u32().map_err(|e| e.at_record("posting wdf"))?;
        self.doc_length = bytes.read_u32().map_err(|e| e.at_record("posting doc length"))?;
        self.pos += bytes.position();
        Ok(())
    }

    pub fn at_end(&self) -> bool {
        self.at_end
    }

    pub fn doc_id(&self) -> u32 {
        self.did
    }

    pub fn wdf(&self) -> u32 {
        self.wdf
    }

    pub fn doc_length(&self) -> u32 {
        self.doc_length
    }

    pub fn posting(&self) -> Posting {
        Posting {
            doc_id: DocId(self.did),
            wdf: self.wdf,
            doc_length: self.doc_length,
        }
    }

    pub fn next(&mut self) -> Result<()> {
        if self.pos >= self.body.len() {
            self.at_end = true;
            return Ok(());
        }
        let mut bytes = ByteReader::new(&self.body[self.pos..]);
        let gap = bytes.read_u32().map_err(|e| e.at_record("posting docid delta"))?;
        self.pos += bytes.position();
        self.did = self
            .did
            .checked_add(gap)
            .and_then(|d| d.checked_add(1))
            .ok_or_else(|| Error::corrupt("posting docid overflows"))?;
        self.read_wdf_and_length()
    }
}

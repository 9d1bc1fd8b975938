use crate::compression::vbyte::{ByteReader, VByteEncoder};
use crate::core::error::Result;
use crate::storage::memory::MemoryTable;
use crate::storage::table::{KeyValueTable, WritableTable};

const LAST_DOCID_KEY: &[u8] = b"last_docid";

/// Every table of one database revision.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    pub postlist: MemoryTable,
    pub position: MemoryTable,
    pub termlist: MemoryTable,
    pub value: MemoryTable,
    pub meta: MemoryTable,
}

impl TableSet {
    pub fn new() -> Self {
        TableSet::default()
    }

    /// Highest docid ever handed out; 0 for a fresh database.
    pub fn last_docid(&self) -> Result<u32> {
        match self.meta.get_exact(LAST_DOCID_KEY)? {
            Some(tag) => ByteReader::new(&tag).read_u32().map_err(|e| e.at_record("last docid")),
            None => Ok(0),
        }
    }

    pub fn set_last_docid(&mut self, did: u32) -> Result<()> {
        let mut tag = Vec::with_capacity(5);
        VByteEncoder::encode_u32(&mut tag, did);
        self.meta.put(LAST_DOCID_KEY, tag)
    }
}

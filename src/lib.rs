pub mod core;
pub mod compression;
pub mod storage;
pub mod postlist;
pub mod index;
pub mod mvcc;
pub mod writer;
pub mod reader;

pub use crate::core::config::Config;
pub use crate::core::database::Database;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{DocId, Document, Posting, TermEntry, TermTotals};
pub use crate::reader::snapshot_reader::DatabaseReader;
pub use crate::writer::index_writer::IndexWriter;

/*
 Database
   ├── MVCCController ── Arc<Revision> ── TableSet
   │                                        ├── postlist  term → chunked postings
   │                                        ├── position  (docid, term) → position list
   │                                        ├── termlist  docid → terms, wdfs, slots
   │                                        ├── value     (slot, last docid) → value chunk
   │                                        └── meta      last docid
   ├── IndexWriter ── WriteBuffer ── merge_changes / ValueUpdater ── working TableSet
   └── DatabaseReader ── PostingListIterator (cursor borrowed from the snapshot)
*/

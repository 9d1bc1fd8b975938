use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document};
use crate::index::positions::{delete_position_list, set_position_list};
use crate::index::termlist::{delete_termlist, get_termlist, set_termlist, termlist_key, TermList};
use crate::index::values::{get_value_stats, set_value_stats, update_slot};
use crate::mvcc::controller::{MVCCController, Revision};
use crate::postlist::merge::{get_collection_frequency, get_term_frequency, merge_changes};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::persist::save_revision;
use crate::storage::table::KeyValueTable;
use crate::storage::tables::TableSet;
use crate::writer::write_buffer::WriteBuffer;

/// Term under which the document length list is stored.
pub const DOC_LENGTH_TERM: &str = "";

/// The single writer of a database.
///
/// Term lists and position lists go straight into a private working copy
/// of the tables; posting and value changes are buffered and merged on
/// `flush`. Nothing is visible to readers before `commit`.
pub struct IndexWriter {
    config: Config,
    mvcc: Arc<MVCCController>,
    storage: Option<Arc<StorageLayout>>,
    base: Arc<Revision>,
    working: TableSet,
    buffer: WriteBuffer,
    last_docid: u32,
    uncommitted: bool,
    active: Arc<AtomicBool>,
    _lock: Option<FileLock>, // Single writer across processes
}

impl IndexWriter {
    pub(crate) fn new(
        config: Config,
        mvcc: Arc<MVCCController>,
        storage: Option<Arc<StorageLayout>>,
        active: Arc<AtomicBool>,
        lock: Option<FileLock>,
    ) -> Result<Self> {
        let base = mvcc.current_snapshot();
        let working = base.tables.clone();
        let last_docid = working.last_docid()?;
        Ok(IndexWriter {
            config,
            mvcc,
            storage,
            base,
            working,
            buffer: WriteBuffer::new(),
            last_docid,
            uncommitted: false,
            active,
            _lock: lock,
        })
    }

    pub fn last_docid(&self) -> DocId {
        DocId(self.last_docid)
    }

    /// Revision the working tables were last synchronised with.
    pub fn base_revision(&self) -> u64 {
        self.base.number
    }

    pub fn has_pending_changes(&self) -> bool {
        self.uncommitted || self.buffer.change_count > 0 || !self.buffer.is_empty()
    }

    /// Add `doc` under the next unused docid.
    pub fn add_document(&mut self, doc: &Document) -> Result<DocId> {
        let did = self.last_docid.checked_add(1).ok_or_else(|| {
            Error::new(ErrorKind::InvalidOperation, "docid space exhausted".to_string())
        })?;
        let termlist = Self::prepare(doc)?;
        self.index_document(DocId(did), doc, &termlist)?;
        self.note_change()?;
        Ok(DocId(did))
    }

    /// Add `doc` under a caller-chosen docid, which must be unused.
    pub fn add_document_with_id(&mut self, did: DocId, doc: &Document) -> Result<()> {
        if did.0 == 0 {
            return Err(Error::invalid_argument("docid 0 is invalid"));
        }
        if self.working.termlist.get_exact(&termlist_key(did))?.is_some() {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("docid {} is already in use", did.0),
            ));
        }
        let termlist = Self::prepare(doc)?;
        self.index_document(did, doc, &termlist)?;
        self.note_change()
    }

    /// Store `doc` under `did`, replacing whatever was there.
    pub fn replace_document(&mut self, did: DocId, doc: &Document) -> Result<()> {
        if did.0 == 0 {
            return Err(Error::invalid_argument("docid 0 is invalid"));
        }
        let termlist = Self::prepare(doc)?;
        match get_termlist(&self.working.termlist, did) {
            Ok(old) => self.unindex_document(did, &old)?,
            Err(e) if e.kind == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.index_document(did, doc, &termlist)?;
        self.note_change()
    }

    pub fn delete_document(&mut self, did: DocId) -> Result<()> {
        let old = get_termlist(&self.working.termlist, did)?;
        self.unindex_document(did, &old)?;
        self.note_change()
    }

    /// Validate `doc` before anything is buffered for it.
    fn prepare(doc: &Document) -> Result<TermList> {
        for (term, entry) in &doc.terms {
            if term.is_empty() {
                return Err(Error::invalid_argument("terms must not be empty"));
            }
            if entry.positions.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::invalid_argument(format!(
                    "positions of '{}' are not strictly increasing",
                    term
                )));
            }
        }
        TermList::from_document(doc)
    }

    fn index_document(&mut self, did: DocId, doc: &Document, termlist: &TermList) -> Result<()> {
        for (term, entry) in &doc.terms {
            self.buffer.add_posting(term, did, entry.wdf);
            if !entry.positions.is_empty() {
                set_position_list(&mut self.working.position, did, term, &entry.positions)?;
            }
        }
        self.buffer.add_posting(DOC_LENGTH_TERM, did, termlist.doc_length);
        self.buffer.doc_lengths.insert(did, termlist.doc_length);

        for (&slot, value) in &doc.values {
            let value_table = &self.working.value;
            self.buffer.set_value(slot, did, value, || get_value_stats(value_table, slot))?;
        }

        set_termlist(&mut self.working.termlist, did, termlist)?;
        self.last_docid = self.last_docid.max(did.0);
        Ok(())
    }

    fn unindex_document(&mut self, did: DocId, old: &TermList) -> Result<()> {
        for (term, wdf) in &old.terms {
            self.buffer.delete_posting(term, did, *wdf);
            delete_position_list(&mut self.working.position, did, term)?;
        }
        self.buffer.delete_posting(DOC_LENGTH_TERM, did, old.doc_length);
        self.buffer.doc_lengths.remove(&did);

        for &slot in &old.slots {
            let value_table = &self.working.value;
            self.buffer.remove_value(slot, did, || get_value_stats(value_table, slot))?;
        }

        delete_termlist(&mut self.working.termlist, did)?;
        Ok(())
    }

    fn note_change(&mut self) -> Result<()> {
        self.buffer.change_count += 1;
        if self.buffer.change_count >= self.config.flush_threshold {
            debug!(changes = self.buffer.change_count, "flush threshold reached");
            self.commit()?;
        }
        Ok(())
    }

    /// Term frequency including buffered changes.
    pub fn term_frequency(&self, term: &str) -> Result<u32> {
        let stored = get_term_frequency(&self.working.postlist, term)?;
        Ok((stored as i64 + self.buffer.freq_delta(term).term_frequency).max(0) as u32)
    }

    /// Collection frequency including buffered changes.
    pub fn collection_frequency(&self, term: &str) -> Result<u32> {
        let stored = get_collection_frequency(&self.working.postlist, term)?;
        Ok((stored as i64 + self.buffer.freq_delta(term).collection_frequency).max(0) as u32)
    }

    pub fn doc_count(&self) -> Result<u32> {
        self.term_frequency(DOC_LENGTH_TERM)
    }

    /// Merge buffered changes into the working tables.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() && self.buffer.change_count == 0 {
            return Ok(());
        }
        debug!(
            terms = self.buffer.postings.len(),
            changes = self.buffer.change_count,
            "merging buffered changes"
        );
        merge_changes(
            &mut self.working.postlist,
            &self.buffer.postings,
            &self.buffer.doc_lengths,
            &self.buffer.freq_deltas,
            self.config.chunk_size_threshold,
        )?;
        for (&slot, changes) in &self.buffer.values {
            update_slot(&mut self.working.value, slot, changes, self.config.value_chunk_size_threshold)?;
        }
        for (&slot, stats) in &self.buffer.value_stats {
            set_value_stats(&mut self.working.value, slot, stats)?;
        }
        self.buffer.clear();
        self.uncommitted = true;
        Ok(())
    }

    /// Flush, then publish the working tables as a new revision and
    /// persist it when the database lives on disk. Returns the revision.
    pub fn commit(&mut self) -> Result<u64> {
        self.flush()?;
        if !self.uncommitted {
            return Ok(self.base.number);
        }
        self.working.set_last_docid(self.last_docid)?;

        let revision = self.mvcc.publish(self.working.clone());
        if let Some(storage) = &self.storage {
            save_revision(storage, revision.number, revision.committed_at, &revision.tables)?;
        }
        debug!(revision = revision.number, last_docid = self.last_docid, "committed");
        self.base = revision;
        self.uncommitted = false;
        Ok(self.base.number)
    }

    /// Drop everything since the last commit.
    pub fn cancel(&mut self) -> Result<()> {
        self.buffer.clear();
        self.working = self.base.tables.clone();
        self.last_docid = self.working.last_docid()?;
        self.uncommitted = false;
        Ok(())
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        if self.has_pending_changes() {
            warn!(
                changes = self.buffer.change_count,
                "index writer dropped with uncommitted changes"
            );
        }
        self.active.store(false, Ordering::Release);
    }
}

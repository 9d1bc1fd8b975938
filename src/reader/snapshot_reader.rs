use std::sync::Arc;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, TermTotals};
use crate::index::positions::{get_position_count, get_position_list};
use crate::index::termlist::{get_termlist, TermList};
use crate::index::values::{get_value, get_value_stats, value_stream, ValueStats};
use crate::mvcc::controller::Revision;
use crate::postlist::iterator::PostingListIterator;
use crate::postlist::merge::term_totals;
use crate::storage::memory::MemoryTable;
use crate::writer::index_writer::DOC_LENGTH_TERM;

pub type PostingList<'a> = PostingListIterator<'a, MemoryTable>;

/// Reader for one committed revision. Later commits are not seen.
#[derive(Clone)]
pub struct DatabaseReader {
    pub snapshot: Arc<Revision>,
}

impl DatabaseReader {
    pub fn new(snapshot: Arc<Revision>) -> Self {
        DatabaseReader { snapshot }
    }

    pub fn revision(&self) -> u64 {
        self.snapshot.number
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.snapshot.committed_at
    }

    pub fn last_docid(&self) -> Result<DocId> {
        Ok(DocId(self.snapshot.tables.last_docid()?))
    }

    fn doc_length_totals(&self) -> Result<TermTotals> {
        Ok(term_totals(&self.snapshot.tables.postlist, DOC_LENGTH_TERM)?.unwrap_or_default())
    }

    pub fn doc_count(&self) -> Result<u32> {
        Ok(self.doc_length_totals()?.term_frequency)
    }

    pub fn total_length(&self) -> Result<u32> {
        Ok(self.doc_length_totals()?.collection_frequency)
    }

    pub fn average_length(&self) -> Result<f64> {
        let totals = self.doc_length_totals()?;
        if totals.term_frequency == 0 {
            return Ok(0.0);
        }
        Ok(totals.collection_frequency as f64 / totals.term_frequency as f64)
    }

    fn check_term(term: &str) -> Result<()> {
        if term.is_empty() {
            return Err(Error::invalid_argument("terms must not be empty"));
        }
        Ok(())
    }

    pub fn term_exists(&self, term: &str) -> Result<bool> {
        Ok(self.get_term_frequency(term)? > 0)
    }

    /// 0 when the term is absent.
    pub fn get_term_frequency(&self, term: &str) -> Result<u32> {
        Self::check_term(term)?;
        Ok(term_totals(&self.snapshot.tables.postlist, term)?.map_or(0, |t| t.term_frequency))
    }

    /// 0 when the term is absent.
    pub fn get_collection_frequency(&self, term: &str) -> Result<u32> {
        Self::check_term(term)?;
        Ok(term_totals(&self.snapshot.tables.postlist, term)?.map_or(0, |t| t.collection_frequency))
    }

    /// Postings of `term` in docid order; empty for an absent term.
    pub fn get_posting_list_iterator(&self, term: &str) -> Result<PostingList<'_>> {
        Self::check_term(term)?;
        let tables = &self.snapshot.tables;
        Ok(PostingListIterator::new(&tables.postlist, term)?.with_positions(&tables.position))
    }

    /// One posting per live document, with wdf and doc length both set to
    /// the document's length.
    pub fn all_documents(&self) -> Result<PostingList<'_>> {
        PostingListIterator::new(&self.snapshot.tables.postlist, DOC_LENGTH_TERM)
    }

    pub fn get_position_list(&self, did: DocId, term: &str) -> Result<Vec<u32>> {
        Self::check_term(term)?;
        get_position_list(&self.snapshot.tables.position, did, term)
    }

    pub fn position_count(&self, did: DocId, term: &str) -> Result<usize> {
        Self::check_term(term)?;
        get_position_count(&self.snapshot.tables.position, did, term)
    }

    pub fn doc_length(&self, did: DocId) -> Result<u32> {
        let mut lengths = self.all_documents()?;
        match lengths.skip_to(did)? {
            Some(posting) if posting.doc_id == did => Ok(posting.doc_length),
            _ => Err(Error::not_found(format!("document {} not found", did))),
        }
    }

    pub fn termlist(&self, did: DocId) -> Result<TermList> {
        get_termlist(&self.snapshot.tables.termlist, did)
    }

    pub fn get_value(&self, did: DocId, slot: u32) -> Result<Option<Bytes>> {
        get_value(&self.snapshot.tables.value, did, slot)
    }

    pub fn value_stream(&self, slot: u32) -> Result<Vec<(DocId, Bytes)>> {
        value_stream(&self.snapshot.tables.value, slot)
    }

    pub fn get_value_stats(&self, slot: u32) -> Result<ValueStats> {
        get_value_stats(&self.snapshot.tables.value, slot)
    }
}

use std::collections::BTreeMap;
use crate::core::error::Result;
use crate::core::types::DocId;
use crate::index::values::ValueStats;
use crate::postlist::merge::{FreqDelta, PostingChange};

/// Changes accepted by the writer but not yet merged into the tables.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    pub postings: BTreeMap<String, BTreeMap<DocId, PostingChange>>,
    pub freq_deltas: BTreeMap<String, FreqDelta>,
    /// New length of every added or modified document
    pub doc_lengths: BTreeMap<DocId, u32>,
    /// Per slot, the new value of each changed document (None removes it)
    pub values: BTreeMap<u32, BTreeMap<DocId, Option<Vec<u8>>>>,
    /// Current statistics of every slot touched
    pub value_stats: BTreeMap<u32, ValueStats>,
    /// Document-level operations since the last flush
    pub change_count: usize,
}

impl WriteBuffer {
    pub fn new() -> Self {
        WriteBuffer::default()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty() && self.values.is_empty() && self.value_stats.is_empty()
    }

    pub fn clear(&mut self) {
        *self = WriteBuffer::default();
    }

    fn delta(&mut self, term: &str) -> &mut FreqDelta {
        self.freq_deltas.entry(term.to_string()).or_default()
    }

    /// A re-add after a buffered delete becomes a modification.
    pub fn add_posting(&mut self, term: &str, did: DocId, wdf: u32) {
        let changes = self.postings.entry(term.to_string()).or_default();
        let change = match changes.get(&did) {
            Some(PostingChange::Deleted) | Some(PostingChange::Modified(_)) => PostingChange::Modified(wdf),
            Some(PostingChange::Added(_)) | None => PostingChange::Added(wdf),
        };
        changes.insert(did, change);

        let delta = self.delta(term);
        delta.term_frequency += 1;
        delta.collection_frequency += wdf as i64;
    }

    /// Deleting a posting added since the last flush cancels the add.
    pub fn delete_posting(&mut self, term: &str, did: DocId, wdf: u32) {
        let changes = self.postings.entry(term.to_string()).or_default();
        match changes.get(&did) {
            Some(PostingChange::Added(_)) => {
                changes.remove(&did);
            }
            _ => {
                changes.insert(did, PostingChange::Deleted);
            }
        }

        let delta = self.delta(term);
        delta.term_frequency -= 1;
        delta.collection_frequency -= wdf as i64;
    }

    /// Buffered adjustment for `term`, zero if untouched.
    pub fn freq_delta(&self, term: &str) -> FreqDelta {
        self.freq_deltas.get(term).copied().unwrap_or_default()
    }

    fn stats_mut(
        &mut self,
        slot: u32,
        load: impl FnOnce() -> Result<ValueStats>,
    ) -> Result<&mut ValueStats> {
        if !self.value_stats.contains_key(&slot) {
            let stats = load()?;
            self.value_stats.insert(slot, stats);
        }
        Ok(self.value_stats.entry(slot).or_default())
    }

    /// `load` supplies the stored statistics the first time `slot` is touched.
    pub fn set_value(
        &mut self,
        slot: u32,
        did: DocId,
        value: &[u8],
        load: impl FnOnce() -> Result<ValueStats>,
    ) -> Result<()> {
        self.stats_mut(slot, load)?.add(value);
        self.values.entry(slot).or_default().insert(did, Some(value.to_vec()));
        Ok(())
    }

    pub fn remove_value(
        &mut self,
        slot: u32,
        did: DocId,
        load: impl FnOnce() -> Result<ValueStats>,
    ) -> Result<()> {
        self.stats_mut(slot, load)?.remove();
        self.values.entry(slot).or_default().insert(did, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_then_add_is_a_modification() {
        let mut buffer = WriteBuffer::new();
        buffer.delete_posting("dog", DocId(5), 2);
        buffer.add_posting("dog", DocId(5), 3);
        assert_eq!(buffer.postings["dog"][&DocId(5)], PostingChange::Modified(3));
        assert_eq!(buffer.freq_delta("dog"), FreqDelta { term_frequency: 0, collection_frequency: 1 });
    }

    #[test]
    fn add_then_delete_cancels_out() {
        let mut buffer = WriteBuffer::new();
        buffer.add_posting("dog", DocId(9), 4);
        buffer.delete_posting("dog", DocId(9), 4);
        assert!(buffer.postings["dog"].is_empty());
        assert!(buffer.freq_delta("dog").is_zero());
    }

    #[test]
    fn stats_are_loaded_once_per_slot() {
        let mut buffer = WriteBuffer::new();
        let seeded = ValueStats { freq: 2, lower_bound: b"b".to_vec(), upper_bound: b"m".to_vec() };
        buffer.set_value(1, DocId(3), b"a", || Ok(seeded.clone())).unwrap();
        buffer.set_value(1, DocId(4), b"z", || panic!("stats loaded twice")).unwrap();
        buffer.remove_value(1, DocId(1), || panic!("stats loaded twice")).unwrap();

        let stats = &buffer.value_stats[&1];
        assert_eq!(stats.freq, 3);
        assert_eq!(stats.lower_bound, b"a");
        assert_eq!(stats.upper_bound, b"z");
        assert_eq!(buffer.values[&1][&DocId(1)], None);
    }
}

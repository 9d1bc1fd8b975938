use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::fmt;

/// Document identifier. Valid ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u32);

impl DocId {
    pub fn new(id: u32) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DocId {
    fn from(id: u32) -> Self {
        DocId(id)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub wdf: u32,
    pub doc_length: u32,
}

/// Per-term totals stored at the head of every posting list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermTotals {
    pub term_frequency: u32,
    pub collection_frequency: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    pub wdf: u32,
    pub positions: Vec<u32>,
}

/// A document as handed to the writer: weighted terms with optional
/// positions, plus slot values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub terms: BTreeMap<String, TermEntry>,
    pub values: BTreeMap<u32, Vec<u8>>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn add_term(&mut self, term: &str, wdf_inc: u32) {
        let entry = self.terms.entry(term.to_string()).or_default();
        entry.wdf = entry.wdf.saturating_add(wdf_inc);
    }

    /// Record an occurrence of `term` at `position`, adding `wdf_inc` to its wdf.
    pub fn add_posting(&mut self, term: &str, position: u32, wdf_inc: u32) {
        let entry = self.terms.entry(term.to_string()).or_default();
        entry.wdf = entry.wdf.saturating_add(wdf_inc);
        if let Err(at) = entry.positions.binary_search(&position) {
            entry.positions.insert(at, position);
        }
    }

    pub fn set_value(&mut self, slot: u32, value: impl Into<Vec<u8>>) {
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&slot);
        } else {
            self.values.insert(slot, value);
        }
    }

    /// Sum of all wdfs.
    pub fn length(&self) -> u64 {
        self.terms.values().map(|e| e.wdf as u64).sum()
    }
}

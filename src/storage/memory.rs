use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use bytes::Bytes;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::table::{KeyValueTable, TableCursor, WritableTable};

/// Ordered in-memory table. Clones share storage until one side writes,
/// so a published clone is a stable snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    entries: Arc<BTreeMap<Vec<u8>, Bytes>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        MemoryTable::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k, Bytes::from(v)))
            .collect();
        MemoryTable { entries: Arc::new(entries) }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Bytes)> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// True when both handles point at the same stored map.
    pub fn shares_storage_with(&self, other: &MemoryTable) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl KeyValueTable for MemoryTable {
    type Cursor<'a> = MemoryCursor<'a>;

    fn get_exact(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self.entries.get(key).cloned())
    }

    fn cursor(&self) -> MemoryCursor<'_> {
        MemoryCursor { entries: &self.entries, current: None }
    }
}

impl WritableTable for MemoryTable {
    fn put(&mut self, key: &[u8], tag: Vec<u8>) -> Result<()> {
        Arc::make_mut(&mut self.entries).insert(key.to_vec(), Bytes::from(tag));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        if !self.entries.contains_key(key) {
            return Ok(false);
        }
        Ok(Arc::make_mut(&mut self.entries).remove(key).is_some())
    }
}

pub struct MemoryCursor<'a> {
    entries: &'a BTreeMap<Vec<u8>, Bytes>,
    current: Option<(&'a [u8], &'a Bytes)>,
}

impl<'a> MemoryCursor<'a> {
    fn position(&mut self, found: Option<(&'a Vec<u8>, &'a Bytes)>) {
        self.current = found.map(|(k, v)| (k.as_slice(), v));
    }
}

impl<'a> TableCursor for MemoryCursor<'a> {
    fn seek_ge(&mut self, key: &[u8]) -> bool {
        let found = self
            .entries
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next();
        self.position(found);
        self.current.is_some_and(|(k, _)| k == key)
    }

    fn seek_le(&mut self, key: &[u8]) -> bool {
        let found = self
            .entries
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
            .next_back();
        self.position(found);
        self.current.is_some_and(|(k, _)| k == key)
    }

    fn next(&mut self) -> bool {
        let Some((key, _)) = self.current else {
            return false;
        };
        let found = self
            .entries
            .range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded))
            .next();
        self.position(found);
        self.current.is_some()
    }

    fn at_end(&self) -> bool {
        self.current.is_none()
    }

    fn current_key(&self) -> &[u8] {
        self.current.map_or(&[][..], |(k, _)| k)
    }

    fn read_tag(&self) -> Result<Bytes> {
        self.current
            .map(|(_, v)| v.clone())
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "cursor is not positioned".to_string()))
    }
}

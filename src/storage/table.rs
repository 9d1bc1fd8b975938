use bytes::Bytes;
use crate::core::error::Result;

/// Positioned view over the sorted keys of a table.
///
/// A fresh cursor is unpositioned, which reads as `at_end`.
pub trait TableCursor {
    /// Position on the smallest key `>= key`. Returns true on an exact match.
    fn seek_ge(&mut self, key: &[u8]) -> bool;

    /// Position on the greatest key `<= key`. Returns true on an exact match.
    /// With no such key the cursor ends up `at_end`.
    fn seek_le(&mut self, key: &[u8]) -> bool;

    /// Step to the following key. Returns false once past the last key.
    fn next(&mut self) -> bool;

    fn at_end(&self) -> bool;

    /// Key under the cursor; empty when `at_end`.
    fn current_key(&self) -> &[u8];

    fn read_tag(&self) -> Result<Bytes>;
}

/// Sorted byte-string table with point lookups and cursors.
pub trait KeyValueTable {
    type Cursor<'a>: TableCursor
    where
        Self: 'a;

    fn get_exact(&self, key: &[u8]) -> Result<Option<Bytes>>;

    fn cursor(&self) -> Self::Cursor<'_>;
}

pub trait WritableTable: KeyValueTable {
    fn put(&mut self, key: &[u8], tag: Vec<u8>) -> Result<()>;

    /// Returns whether the key was present.
    fn delete(&mut self, key: &[u8]) -> Result<bool>;
}

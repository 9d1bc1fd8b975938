use crate::compression::sortable;
use crate::compression::vbyte::{pack_string, ByteReader, VByteEncoder};
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document};
use crate::storage::table::{KeyValueTable, WritableTable};

/// What a document contributed to the index, kept so it can be taken out
/// again on delete or replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermList {
    pub doc_length: u32,
    /// (term, wdf) in term order
    pub terms: Vec<(String, u32)>,
    /// Value slots in use, ascending
    pub slots: Vec<u32>,
}

impl TermList {
    pub fn from_document(doc: &Document) -> Result<Self> {
        let doc_length = u32::try_from(doc.length())
            .map_err(|_| Error::invalid_argument("document length exceeds u32"))?;
        Ok(TermList {
            doc_length,
            terms: doc.terms.iter().map(|(t, e)| (t.clone(), e.wdf)).collect(),
            slots: doc.values.keys().copied().collect(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        VByteEncoder::encode_u32(&mut out, self.doc_length);
        VByteEncoder::encode_u64(&mut out, self.terms.len() as u64);
        for (term, wdf) in &self.terms {
            pack_string(&mut out, term.as_bytes());
            VByteEncoder::encode_u32(&mut out, *wdf);
        }
        VByteEncoder::encode_u64(&mut out, self.slots.len() as u64);
        let mut prev = 0u32;
        for (i, &slot) in self.slots.iter().enumerate() {
            VByteEncoder::encode_u32(&mut out, if i == 0 { slot } else { slot - prev - 1 });
            prev = slot;
        }
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::decode_inner(data).map_err(|e| e.at_record("term list"))
    }

    fn decode_inner(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let doc_length = reader.read_u32()?;
        let n_terms = reader.read_u64()?;
        let mut terms = Vec::new();
        for _ in 0..n_terms {
            let term = std::str::from_utf8(reader.read_string()?)
                .map_err(|_| Error::corrupt("term list holds a term that is not UTF-8"))?
                .to_string();
            let wdf = reader.read_u32()?;
            terms.push((term, wdf));
        }
        let n_slots = reader.read_u64()?;
        let mut slots = Vec::new();
        for i in 0..n_slots {
            let delta = reader.read_u32()?;
            let slot = match slots.last() {
                Some(&prev) if i > 0 => u32::checked_add(prev, delta)
                    .and_then(|s| s.checked_add(1))
                    .ok_or_else(|| Error::corrupt("term list slot overflows"))?,
                _ => delta,
            };
            slots.push(slot);
        }
        if !reader.is_empty() {
            return Err(Error::corrupt("trailing bytes after term list"));
        }
        Ok(TermList { doc_length, terms, slots })
    }
}

pub fn termlist_key(did: DocId) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    sortable::encode_uint(&mut key, did.0);
    key
}

pub fn set_termlist<T: WritableTable>(table: &mut T, did: DocId, termlist: &TermList) -> Result<()> {
    table.put(&termlist_key(did), termlist.encode())
}

pub fn get_termlist<T: KeyValueTable>(table: &T, did: DocId) -> Result<TermList> {
    match table.get_exact(&termlist_key(did))? {
        Some(tag) => TermList::decode(&tag),
        None => Err(Error::not_found(format!("document {} not found", did))),
    }
}

pub fn delete_termlist<T: WritableTable>(table: &mut T, did: DocId) -> Result<bool> {
    table.delete(&termlist_key(did))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::storage::memory::MemoryTable;

    #[test]
    fn document_round_trip() {
        let mut doc = Document::new();
        doc.add_term("dog", 2);
        doc.add_term("cat", 1);
        doc.set_value(3, b"x".to_vec());
        doc.set_value(10, b"y".to_vec());

        let termlist = TermList::from_document(&doc).unwrap();
        assert_eq!(termlist.doc_length, 3);
        assert_eq!(termlist.terms, vec![("cat".to_string(), 1), ("dog".to_string(), 2)]);

        let mut table = MemoryTable::new();
        set_termlist(&mut table, DocId(8), &termlist).unwrap();
        assert_eq!(get_termlist(&table, DocId(8)).unwrap(), termlist);
        assert_eq!(get_termlist(&table, DocId(9)).unwrap_err().kind, ErrorKind::NotFound);
        assert!(delete_termlist(&mut table, DocId(8)).unwrap());
    }

    #[test]
    fn trailing_garbage_is_corrupt() {
        let mut data = TermList::default().encode();
        data.push(1);
        assert_eq!(TermList::decode(&data).unwrap_err().kind, ErrorKind::DatabaseCorrupt);
    }
}

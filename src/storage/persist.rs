use std::fs;
use std::io::Write;
use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::layout::StorageLayout;
use crate::storage::memory::MemoryTable;
use crate::storage::tables::TableSet;

const MAGIC: [u8; 8] = *b"TERMSTOR";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RevisionHeader {
    magic: [u8; 8],
    format_version: u32,
    revision: u64,
    committed_at: DateTime<Utc>,
    checksum: u32,   // crc32 of the payload
}

#[derive(Debug, Serialize, Deserialize)]
struct RevisionFile {
    header: RevisionHeader,
    payload: Vec<u8>,
}

type Entries = Vec<(Vec<u8>, Vec<u8>)>;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedTables {
    postlist: Entries,
    position: Entries,
    termlist: Entries,
    value: Entries,
    meta: Entries,
}

fn entries(table: &MemoryTable) -> Entries {
    table.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect()
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// A revision read back from disk.
#[derive(Debug)]
pub struct LoadedRevision {
    pub revision: u64,
    pub committed_at: DateTime<Utc>,
    pub tables: TableSet,
}

/// Revision number of the file on disk, reading only its header.
pub fn stored_revision(storage: &StorageLayout) -> Result<Option<u64>> {
    let path = storage.tables_path();
    if !path.exists() {
        return Ok(None);
    }
    let file = fs::File::open(&path)?;
    let header: RevisionHeader = bincode::deserialize_from(std::io::BufReader::new(file))
        .map_err(|e| Error::corrupt(format!("{}: {}", path.display(), e)))?;
    if header.magic != MAGIC {
        return Err(Error::corrupt(format!("{} is not a termstore file", path.display())));
    }
    Ok(Some(header.revision))
}

/// Write all tables to a temp file next to the target, sync it, then
/// rename it over the previous revision.
///
/// Fails with `DatabaseModified` unless `revision` is newer than the one on disk.
pub fn save_revision(
    storage: &StorageLayout,
    revision: u64,
    committed_at: DateTime<Utc>,
    tables: &TableSet,
) -> Result<()> {
    if let Some(stored) = stored_revision(storage)? {
        if revision <= stored {
            return Err(Error::new(
                ErrorKind::DatabaseModified,
                format!("revision {} on disk is not older than {}", stored, revision),
            ));
        }
    }
    let payload = bincode::serialize(&PersistedTables {
        postlist: entries(&tables.postlist),
        position: entries(&tables.position),
        termlist: entries(&tables.termlist),
        value: entries(&tables.value),
        meta: entries(&tables.meta),
    })?;
    let file = RevisionFile {
        header: RevisionHeader {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            revision,
            committed_at,
            checksum: checksum(&payload),
        },
        payload,
    };
    let bytes = bincode::serialize(&file)?;

    let mut tmp = NamedTempFile::new_in(&storage.base_dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(storage.tables_path()).map_err(|e| e.error)?;

    debug!(revision, bytes = bytes.len(), "persisted revision");
    Ok(())
}

/// None when nothing has been committed in this directory yet.
pub fn load_revision(storage: &StorageLayout) -> Result<Option<LoadedRevision>> {
    let path = storage.tables_path();
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path)?;
    let file: RevisionFile = bincode::deserialize(&bytes)
        .map_err(|e| Error::corrupt(format!("{}: {}", path.display(), e)))?;

    if file.header.magic != MAGIC {
        return Err(Error::corrupt(format!("{} is not a termstore file", path.display())));
    }
    if file.header.format_version != FORMAT_VERSION {
        return Err(Error::corrupt(format!(
            "{} has format version {}, expected {}",
            path.display(),
            file.header.format_version,
            FORMAT_VERSION
        )));
    }
    if checksum(&file.payload) != file.header.checksum {
        return Err(Error::corrupt(format!("checksum mismatch in {}", path.display())));
    }

    let tables: PersistedTables = bincode::deserialize(&file.payload)
        .map_err(|e| Error::corrupt(format!("{}: {}", path.display(), e)))?;
    debug!(revision = file.header.revision, "loaded revision");
    Ok(Some(LoadedRevision {
        revision: file.header.revision,
        committed_at: file.header.committed_at,
        tables: TableSet {
            postlist: MemoryTable::from_entries(tables.postlist),
            position: MemoryTable::from_entries(tables.position),
            termlist: MemoryTable::from_entries(tables.termlist),
            value: MemoryTable::from_entries(tables.value),
            meta: MemoryTable::from_entries(tables.meta),
        },
    }))
}

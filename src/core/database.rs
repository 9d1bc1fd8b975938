use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::mvcc::controller::{MVCCController, Revision};
use crate::reader::snapshot_reader::DatabaseReader;
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::persist::{load_revision, stored_revision};
use crate::writer::index_writer::IndexWriter;

/// Entry point: one writer at a time, any number of snapshot readers.
pub struct Database {
    config: Config,
    storage: Option<Arc<StorageLayout>>,
    mvcc: Arc<MVCCController>,
    writer_active: Arc<AtomicBool>,
}

impl Database {
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = match &config.storage_path {
            Some(path) => Some(Arc::new(StorageLayout::new(path.clone())?)),
            None => None,
        };

        let initial = match storage.as_deref().map(load_revision).transpose()?.flatten() {
            Some(loaded) => {
                debug!(revision = loaded.revision, "opened existing database");
                Revision {
                    number: loaded.revision,
                    committed_at: loaded.committed_at,
                    tables: loaded.tables,
                }
            }
            None => Revision::empty(),
        };

        Ok(Database {
            mvcc: Arc::new(MVCCController::new(initial, config.max_revisions)),
            storage,
            config,
            writer_active: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Memory-only database with default settings.
    pub fn in_memory() -> Result<Self> {
        Database::open(Config::default())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fails with `DatabaseLocked` while another writer is alive.
    pub fn writer(&self) -> Result<IndexWriter> {
        if self
            .writer_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::new(
                ErrorKind::DatabaseLocked,
                "a writer is already open".to_string(),
            ));
        }

        let lock = match self.storage.as_deref().map(FileLock::acquire).transpose() {
            Ok(lock) => lock,
            Err(e) => {
                self.writer_active.store(false, Ordering::Release);
                return Err(e);
            }
        };
        if let Err(e) = self.catch_up() {
            self.writer_active.store(false, Ordering::Release);
            return Err(e);
        }

        IndexWriter::new(
            self.config.clone(),
            self.mvcc.clone(),
            self.storage.clone(),
            self.writer_active.clone(),
            lock,
        )
        .inspect_err(|_| self.writer_active.store(false, Ordering::Release))
    }

    /// Pick up a revision another handle committed to the same directory.
    /// Only called with the file lock held.
    fn catch_up(&self) -> Result<()> {
        let Some(storage) = self.storage.as_deref() else {
            return Ok(());
        };
        match stored_revision(storage)? {
            Some(stored) if stored > self.mvcc.current_version() => {}
            _ => return Ok(()),
        }
        if let Some(loaded) = load_revision(storage)? {
            let number = loaded.revision;
            if self.mvcc.adopt(Revision {
                number,
                committed_at: loaded.committed_at,
                tables: loaded.tables,
            }) {
                debug!(revision = number, "reloaded revision committed by another handle");
            }
        }
        Ok(())
    }

    /// Reader on the latest committed revision.
    pub fn reader(&self) -> DatabaseReader {
        DatabaseReader::new(self.mvcc.current_snapshot())
    }

    /// Reader on an older revision still inside the retention window.
    pub fn reader_at(&self, revision: u64) -> Result<DatabaseReader> {
        self.mvcc
            .snapshot_at(revision)
            .map(DatabaseReader::new)
            .ok_or_else(|| Error::not_found(format!("revision {} is not retained", revision)))
    }

    pub fn revision(&self) -> u64 {
        self.mvcc.current_version()
    }
}

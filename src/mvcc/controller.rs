use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use crate::storage::tables::TableSet;

/// Immutable, published state of every table.
#[derive(Debug)]
pub struct Revision {
    pub number: u64,
    pub committed_at: DateTime<Utc>,
    pub tables: TableSet,
}

impl Revision {
    pub fn empty() -> Self {
        Revision {
            number: 0,
            committed_at: Utc::now(),
            tables: TableSet::new(),
        }
    }
}

/// Publishes revisions and keeps the most recent ones addressable.
///
/// Readers hold an `Arc<Revision>`, so a revision dropped from the
/// retention window lives on until its last reader goes away.
pub struct MVCCController {
    pub versions: Arc<RwLock<BTreeMap<u64, Arc<Revision>>>>,
    pub current_version: Arc<AtomicU64>,
    pub max_versions: usize,
}

impl MVCCController {
    pub fn new(initial: Revision, max_versions: usize) -> Self {
        let number = initial.number;
        let mut versions = BTreeMap::new();
        versions.insert(number, Arc::new(initial));
        MVCCController {
            versions: Arc::new(RwLock::new(versions)),
            current_version: Arc::new(AtomicU64::new(number)),
            max_versions: max_versions.max(1),
        }
    }

    /// Make `tables` the current revision.
    pub fn publish(&self, tables: TableSet) -> Arc<Revision> {
        let mut versions = self.versions.write();
        let number = self.current_version.load(Ordering::Acquire) + 1;
        let revision = Arc::new(Revision {
            number,
            committed_at: Utc::now(),
            tables,
        });
        versions.insert(number, revision.clone());
        self.current_version.store(number, Ordering::Release);

        self.gc_old_versions(&mut versions);
        revision
    }

    pub fn current_snapshot(&self) -> Arc<Revision> {
        let versions = self.versions.read();
        let current = self.current_version.load(Ordering::Acquire);
        match versions.get(&current) {
            Some(revision) => revision.clone(),
            None => Arc::new(Revision::empty()),
        }
    }

    pub fn snapshot_at(&self, number: u64) -> Option<Arc<Revision>> {
        self.versions.read().get(&number).cloned()
    }

    pub fn current_version(&self) -> u64 {
        self.current_version.load(Ordering::Acquire)
    }

    /// Install a revision committed elsewhere, keeping its number.
    /// Returns false when it is not newer than the current one.
    pub fn adopt(&self, revision: Revision) -> bool {
        let mut versions = self.versions.write();
        let number = revision.number;
        if number <= self.current_version.load(Ordering::Acquire) {
            return false;
        }
        versions.insert(number, Arc::new(revision));
        self.current_version.store(number, Ordering::Release);

        self.gc_old_versions(&mut versions);
        true
    }

    fn gc_old_versions(&self, versions: &mut BTreeMap<u64, Arc<Revision>>) {
        while versions.len() > self.max_versions {
            if versions.pop_first().is_none() {
                break;
            }
        }
    }
}

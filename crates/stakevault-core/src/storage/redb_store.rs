//! # redb-backed Snapshot Storage
//!
//! Stores the encoded session snapshot in a redb database, together with a
//! revision counter and an append-only journal of committed operations.
//!
//! Snapshot, revision and journal entry are written in one write
//! transaction: either all three land or none do.

use crate::VaultError;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for the current snapshot: key -> encoded bytes
const SNAPSHOT: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshot");

/// Table for metadata: key -> u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Table for the journal: revision -> operation label
const JOURNAL: TableDefinition<u64, &str> = TableDefinition::new("journal");

const CURRENT_KEY: &str = "current";
const REVISION_KEY: &str = "revision";

fn io_err(e: impl std::fmt::Display) -> VaultError {
    VaultError::IoError(e.to_string())
}

/// One committed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub revision: u64,
    pub operation: String,
}

/// A disk-backed snapshot store.
pub struct RedbStore {
    db: Database,
    revision: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(SNAPSHOT).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            let _ = write_txn.open_table(JOURNAL).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        let revision = {
            let read_txn = db.begin_read().map_err(io_err)?;
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            table
                .get(REVISION_KEY)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        Ok(Self { db, revision })
    }

    /// Number of committed saves.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Load the current snapshot bytes, if any have been saved.
    pub fn load(&self) -> Result<Option<Vec<u8>>, VaultError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SNAPSHOT).map_err(io_err)?;
        Ok(table
            .get(CURRENT_KEY)
            .map_err(io_err)?
            .map(|v| v.value().to_vec()))
    }

    /// Replace the snapshot and journal `operation` in one transaction.
    pub fn save(&mut self, bytes: &[u8], operation: &str) -> Result<u64, VaultError> {
        let next = self
            .revision
            .checked_add(1)
            .ok_or(VaultError::ArithmeticOverflow)?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut snapshot = write_txn.open_table(SNAPSHOT).map_err(io_err)?;
            snapshot.insert(CURRENT_KEY, bytes).map_err(io_err)?;

            let mut metadata = write_txn.open_table(METADATA).map_err(io_err)?;
            metadata.insert(REVISION_KEY, next).map_err(io_err)?;

            let mut journal = write_txn.open_table(JOURNAL).map_err(io_err)?;
            journal.insert(next, operation).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        self.revision = next;
        Ok(next)
    }

    /// The most recent `limit` journal entries, newest first.
    pub fn journal(&self, limit: usize) -> Result<Vec<JournalEntry>, VaultError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(JOURNAL).map_err(io_err)?;

        let mut entries = Vec::new();
        for item in table.iter().map_err(io_err)?.rev().take(limit) {
            let (revision, operation) = item.map_err(io_err)?;
            entries.push(JournalEntry {
                revision: revision.value(),
                operation: operation.value().to_string(),
            });
        }
        Ok(entries)
    }

    /// Number of journal entries.
    pub fn journal_len(&self) -> Result<u64, VaultError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(JOURNAL).map_err(io_err)?;
        table.len().map_err(io_err)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_store_has_no_snapshot() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        assert_eq!(store.load().expect("load"), None);
        assert_eq!(store.revision(), 0);
        assert_eq!(store.journal_len().expect("len"), 0);
    }

    #[test]
    fn save_bumps_revision_and_journals() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        assert_eq!(store.save(b"one", "initialize").expect("save"), 1);
        assert_eq!(store.save(b"two", "stake").expect("save"), 2);

        assert_eq!(store.load().expect("load"), Some(b"two".to_vec()));
        let journal = store.journal(10).expect("journal");
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].operation, "stake");
        assert_eq!(journal[1].revision, 1);
    }

    #[test]
    fn persistence() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            store.save(b"state", "initialize").expect("save");
        }

        let reopened = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(reopened.revision(), 1);
        assert_eq!(reopened.load().expect("load"), Some(b"state".to_vec()));
    }
}

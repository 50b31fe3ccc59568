//! Engine Module
//!
//! The ordered key-value store a store handle talks to. It lives in a
//! directory of a [`FileTree`] and coordinates the WAL and the MemTable.
//!
//! ## Responsibilities
//! - Replay the WAL into the MemTable on open
//! - Log every mutation before applying it
//! - Apply batches atomically (one WAL entry, one MemTable write lock)
//! - Hand out consistent range snapshots for iterators

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::EngineError;
use crate::memtable::{KvPair, MemTable};
use crate::tree::{FileTree, NodeKind};
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The store engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/write): serialized by the WAL mutex, which is
///   held until the MemTable has been updated, so WAL order matches
///   MemTable order
/// - **Reads** (get/has/snapshot): only take the MemTable read lock
///
/// ## Commit Rule
/// A write is acknowledged only once its WAL entry is complete (and synced,
/// when the strategy calls for it); only then is the MemTable updated. A
/// failed append leaves neither the log nor the MemTable changed.
///
/// ## Log Growth
/// There is no checkpointing: the WAL only grows, and `open` reads the whole
/// log into memory to replay it. Stores are expected to stay small enough for
/// that; a long-lived store with heavy churn pays for every historical write
/// at each open.
pub struct Engine {
    config: Config,

    /// Tree directory holding the WAL
    dir: String,

    /// Write-ahead log (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table (internal RwLock)
    memtable: MemTable,

    closed: AtomicBool,
}

impl Engine {
    /// Open or create an engine rooted at `dir`
    ///
    /// On startup:
    /// 1. Create the directory if it doesn't exist
    /// 2. Recover from the WAL if one exists
    /// 3. Ready to serve requests
    pub fn open(tree: &dyn FileTree, dir: &str, config: Config) -> Result<Self, EngineError> {
        // Step 1: Create the store directory
        tree.ensure_dir(dir)?;

        let wal_path = format!("{}/{}", dir.trim_end_matches('/'), config.wal_file_name);
        let memtable = MemTable::new();

        // Step 2: Replay the WAL
        let next_lsn = match tree.lookup(&wal_path) {
            Ok(NodeKind::File) => {
                let (entries, result) = WalRecovery::recover(tree, &wal_path)?;
                for entry in entries {
                    memtable.apply(entry.operations);
                }
                debug!(
                    dir,
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    entries = memtable.entry_count(),
                    "Replayed WAL"
                );
                result.last_lsn + 1
            }
            _ => 1,
        };

        // Step 3: Open the WAL for appending
        let wal = WalWriter::open_at(tree, &wal_path, config.wal_sync_strategy, next_lsn)?;

        debug!(dir, "Engine opened");

        Ok(Self {
            config,
            dir: dir.to_string(),
            wal: Mutex::new(wal),
            memtable,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        self.ensure_open()?;
        Ok(self.memtable.get(key))
    }

    /// Check whether a key exists
    pub fn has(&self, key: &[u8]) -> Result<bool, EngineError> {
        self.ensure_open()?;
        Ok(self.memtable.contains(key))
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        self.write(vec![Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        }])
    }

    /// Delete a key. Deleting an absent key is not an error.
    pub fn delete(&self, key: &[u8]) -> Result<(), EngineError> {
        self.write(vec![Operation::Delete { key: key.to_vec() }])
    }

    /// Apply operations atomically
    ///
    /// Steps:
    /// 1. Acquire the WAL lock
    /// 2. Append all operations as one WAL entry (durability)
    /// 3. Apply them to the MemTable under one write lock
    pub fn write(&self, operations: Vec<Operation>) -> Result<(), EngineError> {
        self.ensure_open()?;
        if operations.is_empty() {
            return Ok(());
        }

        let mut wal = self.wal.lock();
        // Re-check under the lock so a concurrent close wins cleanly
        self.ensure_open()?;

        let count = operations.len();
        let lsn = wal.append_batch(operations.clone())?;
        self.memtable.apply(operations);

        trace!(dir = %self.dir, lsn, operations = count, "write committed");
        Ok(())
    }

    /// Copy out the entries in `[start, end)` as they are right now
    pub fn snapshot(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Result<Vec<KvPair>, EngineError> {
        self.ensure_open()?;
        Ok(self.memtable.range(start, end))
    }

    /// Close the engine
    ///
    /// Syncs the WAL. Every later call fails with [`EngineError::Closed`].
    pub fn close(&self) -> Result<(), EngineError> {
        let mut wal = self.wal.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(EngineError::Closed);
        }
        wal.sync()?;
        debug!(dir = %self.dir, "Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Tree directory the engine lives in
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Number of live keys
    pub fn entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Approximate size of live data in bytes
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// LSN the next write will receive
    pub fn current_lsn(&self) -> u64 {
        self.wal.lock().current_lsn()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

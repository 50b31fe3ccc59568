//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::io::{self, Seek, SeekFrom, Write};

use tracing::{trace, warn};

use super::{Operation, WalEntry};
use crate::config::WalSyncStrategy;
use crate::error::EngineError;
use crate::tree::{FileDescriptor, FileTree, OpenFlags};

/// Writes entries to the WAL file
///
/// An append either leaves a complete entry at the end of the log or leaves
/// the log as it was. A failed write or sync is rolled back by truncating to
/// the previous end. If the rollback itself fails the writer is poisoned and
/// refuses further appends, since anything written after torn bytes would be
/// cut off by recovery.
pub struct WalWriter {
    file: Box<dyn FileDescriptor>,

    /// Byte offset of the end of the last complete entry
    end: u64,

    /// Set when a failed append could not be rolled back
    poisoned: bool,

    /// LSN the next entry will receive
    current_lsn: u64,

    sync_strategy: WalSyncStrategy,

    /// Entries appended since the last sync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file, numbering new entries from 1
    pub fn open(
        tree: &dyn FileTree,
        path: &str,
        sync_strategy: WalSyncStrategy,
    ) -> Result<Self, EngineError> {
        Self::open_at(tree, path, sync_strategy, 1)
    }

    /// Open or create a WAL file, numbering new entries from `next_lsn`.
    /// Used after recovery so numbering continues past the replayed entries.
    pub fn open_at(
        tree: &dyn FileTree,
        path: &str,
        sync_strategy: WalSyncStrategy,
        next_lsn: u64,
    ) -> Result<Self, EngineError> {
        let mut file = tree.open(path, OpenFlags::create())?;
        let end = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file,
            end,
            poisoned: false,
            current_lsn: next_lsn,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append a single operation
    pub fn append(&mut self, operation: Operation) -> Result<u64, EngineError> {
        self.append_batch(vec![operation])
    }

    /// Append several operations as one entry. Returns the entry's LSN.
    ///
    /// On error nothing of the entry remains in the log and the LSN is not
    /// consumed.
    pub fn append_batch(&mut self, operations: Vec<Operation>) -> Result<u64, EngineError> {
        if self.poisoned {
            return Err(EngineError::WalWrite(
                "log is unusable after a failed rollback".to_string(),
            ));
        }

        let lsn = self.current_lsn;
        let bytes = WalEntry::new(lsn, operations).serialize()?;
        let start = self.end;

        if let Err(e) = self.write_entry(&bytes) {
            self.rollback(start);
            return Err(EngineError::WalWrite(e.to_string()));
        }

        self.end = start + bytes.len() as u64;
        self.current_lsn += 1;
        trace!(lsn, bytes = bytes.len(), "WAL append");
        Ok(lsn)
    }

    /// Write one serialized entry and sync if the strategy says so
    fn write_entry(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count.max(1),
        };
        if due {
            self.sync_file()?;
        } else {
            self.unsynced += 1;
        }
        Ok(())
    }

    /// Cut the log back to `len` bytes and put the cursor there
    fn rollback(&mut self, len: u64) {
        let result = self
            .file
            .truncate(len)
            .and_then(|()| self.file.seek(SeekFrom::Start(len)).map(|_| ()));
        if let Err(e) = result {
            warn!(len, error = %e, "WAL rollback failed, refusing further appends");
            self.poisoned = true;
        }
    }

    fn sync_file(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Force sync to the backing tree
    pub fn sync(&mut self) -> Result<(), EngineError> {
        Ok(self.sync_file()?)
    }

    /// Drop every entry. LSN numbering continues.
    pub fn truncate(&mut self) -> Result<(), EngineError> {
        self.file.truncate(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.end = 0;
        self.poisoned = false;
        self.sync()
    }

    /// Whether a failed rollback has disabled appends
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Get the LSN the next entry will receive
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }
}

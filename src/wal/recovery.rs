//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use tracing::{debug, warn};

use super::{WalEntry, WalReader};
use crate::error::EngineError;
use crate::tree::{FileTree, OpenFlags};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read entries up to the first one that fails validation
    /// 2. Cut the file back to the end of the last valid entry
    /// 3. Return all valid entries in order
    ///
    /// Entries are self-delimiting only through their header, so nothing
    /// after a damaged entry can be trusted and the whole tail is dropped.
    pub fn recover(tree: &dyn FileTree, path: &str) -> Result<(Vec<WalEntry>, RecoveryResult), EngineError> {
        let (entries, mut result, valid_len) = Self::scan(tree, path)?;

        if result.entries_corrupted > 0 {
            let mut file = tree.open(path, OpenFlags::read_write())?;
            file.truncate(valid_len)?;
            file.sync()?;
            result.was_truncated = true;
            warn!(path, valid_len, "Truncated damaged WAL tail");
        }

        debug!(
            path,
            recovered = result.entries_recovered,
            corrupted = result.entries_corrupted,
            last_lsn = result.last_lsn,
            "WAL recovery finished"
        );
        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(tree: &dyn FileTree, path: &str) -> Result<RecoveryResult, EngineError> {
        let (_, result, _) = Self::scan(tree, path)?;
        Ok(result)
    }

    fn scan(tree: &dyn FileTree, path: &str) -> Result<(Vec<WalEntry>, RecoveryResult, u64), EngineError> {
        let mut reader = WalReader::open(tree, path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(EngineError::WalCorruption(reason)) => {
                    warn!(path, offset = reader.position(), %reason, "WAL corruption detected");
                    result.entries_corrupted += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((entries, result, reader.position()))
    }
}

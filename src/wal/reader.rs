//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::io::Read;

use super::WalEntry;
use crate::error::EngineError;
use crate::tree::{FileTree, OpenFlags};

/// Reads entries from the WAL file
pub struct WalReader {
    data: Vec<u8>,

    /// Offset just past the last entry returned
    position: usize,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(tree: &dyn FileTree, path: &str) -> Result<Self, EngineError> {
        let mut file = tree.open(path, OpenFlags::read_only())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Self::from_bytes(data))
    }

    /// Read entries from an in-memory log image
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }

    /// Read the next entry. `Ok(None)` at a clean end of log.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>, EngineError> {
        if self.position >= self.data.len() {
            return Ok(None);
        }
        let (entry, consumed) = WalEntry::deserialize(&self.data[self.position..])?;
        self.position += consumed;
        Ok(Some(entry))
    }

    /// Offset just past the last valid entry read so far
    pub fn position(&self) -> u64 {
        self.position as u64
    }

    /// Total bytes in the log
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over entries; the iterator stops after the first error
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            failed: false,
        }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    failed: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.reader.next_entry().transpose();
        self.failed = matches!(item, Some(Err(_)));
        item
    }
}

//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::KvPair;
use crate::wal::Operation;

/// In-memory ordered table
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,

    /// Sum of key and value lengths
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.data.read().contains_key(key)
    }

    /// Put a key-value pair. Returns the new approximate size.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut data = self.data.write();
        self.put_locked(&mut data, key, value);
        self.size()
    }

    /// Remove a key. Returns the new approximate size.
    pub fn delete(&self, key: &[u8]) -> usize {
        let mut data = self.data.write();
        self.delete_locked(&mut data, key);
        self.size()
    }

    /// Apply operations under one write lock, so readers see all or none
    pub fn apply(&self, operations: Vec<Operation>) -> usize {
        let mut data = self.data.write();
        for operation in operations {
            match operation {
                Operation::Put { key, value } => self.put_locked(&mut data, key, value),
                Operation::Delete { key } => self.delete_locked(&mut data, &key),
            }
        }
        self.size()
    }

    fn put_locked(&self, data: &mut BTreeMap<Vec<u8>, Vec<u8>>, key: Vec<u8>, value: Vec<u8>) {
        let key_len = key.len();
        let value_len = value.len();
        match data.insert(key, value) {
            // Key is already counted; swap the old value's length for the new one
            Some(old) => {
                self.size.fetch_add(value_len, Ordering::Relaxed);
                self.size.fetch_sub(old.len(), Ordering::Relaxed);
            }
            None => {
                self.size.fetch_add(key_len + value_len, Ordering::Relaxed);
            }
        }
    }

    fn delete_locked(&self, data: &mut BTreeMap<Vec<u8>, Vec<u8>>, key: &[u8]) {
        if let Some(old) = data.remove(key) {
            self.size.fetch_sub(key.len() + old.len(), Ordering::Relaxed);
        }
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy out every entry in `[start, end)` order. An unbounded side is
    /// open.
    pub fn range(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Vec<KvPair> {
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Vec::new();
            }
        }
        let lower = start.map_or(Bound::Unbounded, Bound::Included);
        let upper = end.map_or(Bound::Unbounded, Bound::Excluded);
        self.data
            .read()
            .range::<[u8], _>((lower, upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.data.write().clear();
        self.size.store(0, Ordering::Relaxed);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

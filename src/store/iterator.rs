//! Store iterators
//!
//! An iterator walks a snapshot of a key range taken when it was created.
//! Writes made afterwards are not observed and nothing is locked while the
//! iterator is alive.

use tracing::{trace, warn};

use crate::codec;
use crate::error::IteratorError;
use crate::memtable::KvPair;
use crate::value::DynamicValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Fresh: `next` acts as `first`, `prev` as `last`
    Unpositioned,
    At(usize),
    BeforeStart,
    AfterEnd,
}

/// Cursor over an ordered snapshot of encoded keys
pub struct StoreIterator {
    entries: Vec<KvPair>,
    position: Position,
    error: Option<IteratorError>,
    released: bool,
}

impl StoreIterator {
    pub(crate) fn new(entries: Vec<KvPair>) -> Self {
        trace!(entries = entries.len(), "iterator created");
        Self {
            entries,
            position: Position::Unpositioned,
            error: None,
            released: false,
        }
    }

    fn entry(&self) -> Option<&KvPair> {
        match self.position {
            Position::At(i) if !self.released => self.entries.get(i),
            _ => None,
        }
    }

    fn land(&mut self, index: Option<usize>, miss: Position) -> bool {
        if self.released {
            return false;
        }
        self.position = match index {
            Some(i) if i < self.entries.len() => Position::At(i),
            _ => miss,
        };
        self.valid()
    }

    /// Whether the iterator points at an entry
    pub fn valid(&self) -> bool {
        self.entry().is_some()
    }

    /// Move to the smallest key
    pub fn first(&mut self) -> bool {
        self.land(Some(0), Position::AfterEnd)
    }

    /// Move to the largest key
    pub fn last(&mut self) -> bool {
        let last = self.entries.len().checked_sub(1);
        self.land(last, Position::BeforeStart)
    }

    /// Move to the smallest key >= `key`
    pub fn seek(&mut self, key: &DynamicValue) -> Result<bool, IteratorError> {
        let target = codec::encode(key).map_err(IteratorError::KeyEncodeFailed)?;
        let index = self
            .entries
            .partition_point(|(k, _)| k.as_slice() < target.as_slice());
        Ok(self.land(Some(index), Position::AfterEnd))
    }

    /// Step forward
    pub fn next(&mut self) -> bool {
        match self.position {
            Position::Unpositioned | Position::BeforeStart => self.first(),
            Position::At(i) => self.land(Some(i + 1), Position::AfterEnd),
            Position::AfterEnd => false,
        }
    }

    /// Step backward
    pub fn prev(&mut self) -> bool {
        match self.position {
            Position::Unpositioned | Position::AfterEnd => self.last(),
            Position::At(0) => self.land(None, Position::BeforeStart),
            Position::At(i) => self.land(Some(i - 1), Position::BeforeStart),
            Position::BeforeStart => false,
        }
    }

    /// Raw encoded key at the current position
    pub fn raw_key(&self) -> Option<&[u8]> {
        self.entry().map(|(k, _)| k.as_slice())
    }

    /// Raw encoded value at the current position
    pub fn raw_value(&self) -> Option<&[u8]> {
        self.entry().map(|(_, v)| v.as_slice())
    }

    /// Decoded key, or Nil if the iterator is not valid
    pub fn key(&self) -> Result<DynamicValue, IteratorError> {
        match self.raw_key() {
            Some(bytes) => codec::decode(bytes).map_err(IteratorError::DecodeFailure),
            None => Ok(DynamicValue::Nil),
        }
    }

    /// Decoded value, or Nil if the iterator is not valid
    pub fn value(&self) -> Result<DynamicValue, IteratorError> {
        match self.raw_value() {
            Some(bytes) => codec::decode(bytes).map_err(IteratorError::DecodeFailure),
            None => Ok(DynamicValue::Nil),
        }
    }

    /// Pending error, if any. After release this is [`IteratorError::Released`].
    pub fn error(&self) -> Option<&IteratorError> {
        self.error.as_ref()
    }

    /// Drop the snapshot. Every later call reports an invalid iterator.
    pub fn release(&mut self) {
        if self.released {
            warn!("iterator released twice");
            return;
        }
        self.released = true;
        self.entries = Vec::new();
        self.position = Position::AfterEnd;
        self.error = Some(IteratorError::Released);
        trace!("iterator released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

//! Write batches
//!
//! A batch buffers puts and deletes and applies them to its originating store
//! in one atomic write.

use std::sync::Arc;

use tracing::trace;

use crate::codec;
use crate::engine::Engine;
use crate::error::StoreError;
use crate::value::DynamicValue;
use crate::wal::Operation;

/// Buffered mutations, optionally bound to the store that created them
#[derive(Default)]
pub struct Batch {
    operations: Vec<Operation>,
    origin: Option<Arc<Engine>>,
}

impl Batch {
    /// A batch with no originating store. It can be applied with
    /// [`super::Store::write`] but not with [`Batch::write`].
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bound(origin: Arc<Engine>) -> Self {
        Self {
            operations: Vec::new(),
            origin: Some(origin),
        }
    }

    /// Buffer a put. Nothing reaches the store until the batch is written.
    pub fn put(&mut self, key: &DynamicValue, value: &DynamicValue) -> Result<(), StoreError> {
        let key = codec::encode(key).map_err(StoreError::KeyEncodeFailed)?;
        let value = codec::encode(value).map_err(StoreError::ValueEncodeFailed)?;
        self.operations.push(Operation::Put { key, value });
        Ok(())
    }

    /// Buffer a delete
    pub fn delete(&mut self, key: &DynamicValue) -> Result<(), StoreError> {
        let key = codec::encode(key).map_err(StoreError::KeyEncodeFailed)?;
        self.operations.push(Operation::Delete { key });
        Ok(())
    }

    /// Number of buffered operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Drop every buffered operation
    pub fn reset(&mut self) {
        self.operations.clear();
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_bound(&self) -> bool {
        self.origin.is_some()
    }

    /// Apply the buffered operations to the originating store, all or none.
    /// The buffer is kept, so writing twice applies the operations twice.
    pub fn write(&self) -> Result<(), StoreError> {
        let origin = self.origin.as_ref().ok_or(StoreError::Unbound)?;
        trace!(dir = origin.dir(), operations = self.operations.len(), "batch write");
        origin.write(self.operations.clone())?;
        Ok(())
    }
}

//! Store Bridge Module
//!
//! Script-level access to ordered key-value stores. Keys and values are
//! encoded with the codec on the way in and decoded on the way out, so any
//! encodable value can be a key.
//!
//! ## Handles
//! ```text
//!   StoreRegistry ──open(path)──► Store ──newBatch──► Batch
//!        │                          │
//!        │ one Engine per path      └──newIterator──► StoreIterator
//!        ▼                                               (snapshot)
//!   Arc<Engine>  (shared by every Store opened on the path)
//! ```

mod batch;
mod iterator;

pub use batch::Batch;
pub use iterator::StoreIterator;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::codec;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{EngineError, StoreError, TreeError};
use crate::tree::path::namespaced;
use crate::tree::FileTree;
use crate::value::DynamicValue;

/// Opens stores under the namespace root and shares one engine per path
pub struct StoreRegistry {
    tree: Arc<dyn FileTree>,
    config: Config,
    engines: HashMap<String, Arc<Engine>>,
}

impl StoreRegistry {
    pub fn new(tree: Arc<dyn FileTree>, config: Config) -> Self {
        Self {
            tree,
            config,
            engines: HashMap::new(),
        }
    }

    /// Open (or create) the store at `path`.
    ///
    /// Repeat opens of a path share the same backend. If that backend has
    /// been closed a fresh one is opened in its place.
    pub fn open(&mut self, path: &str) -> Result<Store, StoreError> {
        let dir = namespaced(&self.config.namespace_root, path).ok_or_else(|| {
            StoreError::BackendFailure(EngineError::Tree(TreeError::InvalidPath(path.to_string())))
        })?;

        if let Some(engine) = self.engines.get(&dir) {
            if !engine.is_closed() {
                return Ok(Store::new(Arc::clone(engine)));
            }
        }

        let engine = Arc::new(Engine::open(self.tree.as_ref(), &dir, self.config.clone())?);
        debug!(path = %dir, "Opened store");
        self.engines.insert(dir, Arc::clone(&engine));
        Ok(Store::new(engine))
    }

    /// Close every open backend
    pub fn close_all(&mut self) {
        for (dir, engine) in self.engines.drain() {
            if !engine.is_closed() {
                if let Err(e) = engine.close() {
                    debug!(path = %dir, error = %e, "close on shutdown failed");
                }
            }
        }
    }

    /// Number of backends currently open
    pub fn open_count(&self) -> usize {
        self.engines.values().filter(|e| !e.is_closed()).count()
    }
}

/// Handle to an open store
#[derive(Clone)]
pub struct Store {
    engine: Arc<Engine>,
}

impl Store {
    fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Tree directory of the backend
    pub fn path(&self) -> &str {
        self.engine.dir()
    }

    /// Whether two handles share a backend
    pub fn same(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.engine, &other.engine)
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    /// Look up a key
    pub fn get(&self, key: &DynamicValue) -> Result<DynamicValue, StoreError> {
        let key = codec::encode(key).map_err(StoreError::KeyEncodeFailed)?;
        let bytes = self.engine.get(&key)?.ok_or(StoreError::NotFound)?;
        codec::decode(&bytes).map_err(StoreError::ValueDecodeFailed)
    }

    pub fn put(&self, key: &DynamicValue, value: &DynamicValue) -> Result<(), StoreError> {
        let key = codec::encode(key).map_err(StoreError::KeyEncodeFailed)?;
        let value = codec::encode(value).map_err(StoreError::ValueEncodeFailed)?;
        Ok(self.engine.put(&key, &value)?)
    }

    pub fn has(&self, key: &DynamicValue) -> Result<bool, StoreError> {
        let key = codec::encode(key).map_err(StoreError::KeyEncodeFailed)?;
        Ok(self.engine.has(&key)?)
    }

    pub fn delete(&self, key: &DynamicValue) -> Result<(), StoreError> {
        let key = codec::encode(key).map_err(StoreError::KeyEncodeFailed)?;
        Ok(self.engine.delete(&key)?)
    }

    /// Apply any batch to this store, atomically
    pub fn write(&self, batch: &Batch) -> Result<(), StoreError> {
        Ok(self.engine.write(batch.operations().to_vec())?)
    }

    /// Close the backend for every handle sharing it
    pub fn close(&self) -> Result<(), StoreError> {
        self.engine.close()?;
        Ok(())
    }

    /// A new empty batch bound to this store
    pub fn new_batch(&self) -> Result<Batch, StoreError> {
        if self.engine.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(Batch::bound(Arc::clone(&self.engine)))
    }

    /// An iterator over `[start, end)`; a missing bound is open on that side
    pub fn new_iterator(
        &self,
        start: Option<&DynamicValue>,
        end: Option<&DynamicValue>,
    ) -> Result<StoreIterator, StoreError> {
        let encode_bound = |bound: Option<&DynamicValue>| {
            bound
                .map(|value| codec::encode(value).map_err(StoreError::KeyEncodeFailed))
                .transpose()
        };
        let start = encode_bound(start)?;
        let end = encode_bound(end)?;

        let entries = self.engine.snapshot(start.as_deref(), end.as_deref())?;
        Ok(StoreIterator::new(entries))
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.engine.dir())
            .field("closed", &self.engine.is_closed())
            .finish()
    }
}

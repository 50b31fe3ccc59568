//! Capability handles
//!
//! The opaque values scripts hold for files, stores, batches and iterators.
//! Every host entry point checks the kind at runtime.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::store::{Batch, Store, StoreIterator};
use crate::vfile::VirtualFile;

/// Kind of a capability handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    File,
    Store,
    Batch,
    Iterator,
}

impl HandleKind {
    pub fn name(self) -> &'static str {
        match self {
            HandleKind::File => "file",
            HandleKind::Store => "store",
            HandleKind::Batch => "batch",
            HandleKind::Iterator => "iterator",
        }
    }

    /// Method names scripts can call on a handle of this kind
    pub fn methods(self) -> &'static [&'static str] {
        match self {
            HandleKind::File => &["read", "write", "seek", "close", "lines", "size", "__tostring"],
            HandleKind::Store => &[
                "get",
                "put",
                "has",
                "delete",
                "write",
                "close",
                "newBatch",
                "newIterator",
            ],
            HandleKind::Batch => &["put", "delete", "len", "reset", "write"],
            HandleKind::Iterator => &[
                "valid", "first", "last", "seek", "next", "prev", "key", "value", "error", "release",
            ],
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A capability handle held by a script
#[derive(Clone)]
pub enum Handle {
    File(Rc<RefCell<VirtualFile>>),
    Store(Rc<Store>),
    Batch(Rc<RefCell<Batch>>),
    Iterator(Rc<RefCell<StoreIterator>>),
}

impl Handle {
    pub fn file(file: VirtualFile) -> Self {
        Handle::File(Rc::new(RefCell::new(file)))
    }

    pub fn store(store: Store) -> Self {
        Handle::Store(Rc::new(store))
    }

    pub fn batch(batch: Batch) -> Self {
        Handle::Batch(Rc::new(RefCell::new(batch)))
    }

    pub fn iterator(iterator: StoreIterator) -> Self {
        Handle::Iterator(Rc::new(RefCell::new(iterator)))
    }

    pub fn kind(&self) -> HandleKind {
        match self {
            Handle::File(_) => HandleKind::File,
            Handle::Store(_) => HandleKind::Store,
            Handle::Batch(_) => HandleKind::Batch,
            Handle::Iterator(_) => HandleKind::Iterator,
        }
    }

    /// Identity: both values refer to the same handle
    pub fn same(&self, other: &Handle) -> bool {
        match (self, other) {
            (Handle::File(a), Handle::File(b)) => Rc::ptr_eq(a, b),
            (Handle::Store(a), Handle::Store(b)) => Rc::ptr_eq(a, b),
            (Handle::Batch(a), Handle::Batch(b)) => Rc::ptr_eq(a, b),
            (Handle::Iterator(a), Handle::Iterator(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::File(file) => match file.try_borrow() {
                Ok(file) => write!(f, "{}", file),
                Err(_) => write!(f, "file ({:p})", Rc::as_ptr(file)),
            },
            Handle::Store(store) => write!(f, "store ({})", store.path()),
            Handle::Batch(batch) => write!(f, "batch ({:p})", Rc::as_ptr(batch)),
            Handle::Iterator(iterator) => write!(f, "iterator ({:p})", Rc::as_ptr(iterator)),
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self)
    }
}

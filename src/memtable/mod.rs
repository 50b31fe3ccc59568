//! MemTable Module
//!
//! In-memory ordered view of a store: the WAL is replayed into it on open and
//! every committed mutation is applied to it afterwards.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track approximate size
//! - Ordered range snapshots for iterators
//!
//! ## Data Structure Choice
//! `BTreeMap<Vec<u8>, Vec<u8>>` behind a `parking_lot::RwLock`: keys iterate
//! in byte-lexicographic order, which is the order iterators expose.

mod table;

pub use table::MemTable;

/// A key-value pair copied out of the table
pub type KvPair = (Vec<u8>, Vec<u8>);

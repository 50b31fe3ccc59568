//! # PersistBridge
//!
//! Persistence services for sandboxed scripting engines:
//! - A canonical JSON codec for dynamic script values
//! - Seekable virtual files confined to a namespace root
//! - An ordered key-value store with batches and snapshot iterators
//! - A write-ahead log so store contents survive a restart
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Scripting Engine                          │
//! │            (json / io / db libraries, handles)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    ScriptContext                             │
//! │        (argument checks, sentinels, default files)           │
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//!   ┌─────────┐          ┌─────────────┐        ┌─────────────┐
//!   │  Codec  │          │ VirtualFile │        │    Store    │
//!   │ (JSON)  │          │  (cursor)   │        │  Registry   │
//!   └─────────┘          └──────┬──────┘        └──────┬──────┘
//!                               │                      │
//!                               │               ┌──────▼──────┐
//!                               │               │   Engine    │
//!                               │               │ WAL+MemTable│
//!                               │               └──────┬──────┘
//!                               ▼                      ▼
//!                        ┌─────────────────────────────────────┐
//!                        │   FileTree (memory or disk backed)  │
//!                        └─────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod value;
pub mod codec;
pub mod tree;
pub mod vfile;

pub mod wal;
pub mod memtable;
pub mod engine;
pub mod store;

pub mod host;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BridgeError, Result};
pub use config::{Config, ConfigBuilder, WalSyncStrategy};
pub use value::{DynamicValue, NativeFunction, Table, TableKey};
pub use tree::{DiskTree, FileTree, MemoryTree};
pub use vfile::{OpenMode, ReadFormat, VirtualFile, Whence};
pub use engine::Engine;
pub use store::{Batch, Store, StoreIterator, StoreRegistry};
pub use host::{Handle, HandleKind, ScriptContext};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PersistBridge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

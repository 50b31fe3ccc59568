//! File Tree Module
//!
//! The hierarchical filesystem collaborator that virtual files and stores
//! live in.
//!
//! ## Responsibilities
//! - Resolve paths to files and directories
//! - Create directories and files
//! - Hand out short-lived descriptors with an independent cursor
//!
//! ## Implementations
//! - [`MemoryTree`]: everything in memory, used by tests and embedders
//! - [`DiskTree`]: maps the tree onto a host directory
//!
//! A descriptor carries no state anything else depends on: callers open
//! one, seek it, transfer bytes and drop it.

mod disk;
mod memory;
pub mod path;

pub use disk::DiskTree;
pub use memory::MemoryTree;

use std::io::{self, Read, Seek, Write};

use crate::error::TreeError;

/// Kind of node a path resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// How a file node is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,

    /// Create the file if it does not exist (parent must exist)
    pub create: bool,

    /// Cut the file to zero length on open
    pub truncate: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Self::default()
        }
    }

    pub fn create() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: false,
        }
    }
}

/// An open file node. The cursor starts at 0.
pub trait FileDescriptor: Read + Write + Seek + Send {
    /// Current size in bytes
    fn size(&mut self) -> io::Result<u64>;

    /// Resize to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Make written data durable
    fn sync(&mut self) -> io::Result<()>;
}

/// A hierarchical file tree
pub trait FileTree: Send + Sync {
    /// Resolve a path to the kind of node it names
    fn lookup(&self, path: &str) -> Result<NodeKind, TreeError>;

    /// Create a directory; with `parents` missing ancestors are created too
    /// and an existing directory is not an error
    fn mkdir(&self, path: &str, parents: bool) -> Result<(), TreeError>;

    /// Open a file node
    fn open(&self, path: &str, flags: OpenFlags) -> Result<Box<dyn FileDescriptor>, TreeError>;

    /// Names of a directory's children, sorted
    fn list(&self, path: &str) -> Result<Vec<String>, TreeError>;

    /// Resolve a directory, creating it (and its parents) when missing
    fn ensure_dir(&self, path: &str) -> Result<(), TreeError> {
        match self.lookup(path) {
            Ok(NodeKind::Directory) => Ok(()),
            Ok(NodeKind::File) => Err(TreeError::NotADirectory(path.to_string())),
            Err(TreeError::NotFound(_)) => self.mkdir(path, true),
            Err(e) => Err(e),
        }
    }
}

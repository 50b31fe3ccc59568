//! In-memory file tree
//!
//! Nodes are kept in one map keyed by absolute path. File contents are shared
//! between descriptors, so a write through one descriptor is visible to the
//! next open of the same path.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::path::{components, join, split_parent};
use super::{FileDescriptor, FileTree, NodeKind, OpenFlags};
use crate::error::TreeError;

type Contents = Arc<RwLock<Vec<u8>>>;

enum Node {
    Directory,
    File(Contents),
}

/// Hierarchical tree held entirely in memory
pub struct MemoryTree {
    nodes: RwLock<BTreeMap<String, Node>>,
}

impl MemoryTree {
    /// Create a tree containing only the root directory
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Directory);
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Canonical form of `path`
    fn canonical(path: &str) -> Result<String, TreeError> {
        Ok(join(&components(path)?))
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTree for MemoryTree {
    fn lookup(&self, path: &str) -> Result<NodeKind, TreeError> {
        let path = Self::canonical(path)?;
        match self.nodes.read().get(&path) {
            Some(Node::Directory) => Ok(NodeKind::Directory),
            Some(Node::File(_)) => Ok(NodeKind::File),
            None => Err(TreeError::NotFound(path)),
        }
    }

    fn mkdir(&self, path: &str, parents: bool) -> Result<(), TreeError> {
        let parts = components(path)?;
        let mut nodes = self.nodes.write();

        for depth in 1..=parts.len() {
            let current = join(&parts[..depth]);
            let is_target = depth == parts.len();
            match nodes.get(&current) {
                Some(Node::Directory) if is_target && !parents => {
                    return Err(TreeError::AlreadyExists(current))
                }
                Some(Node::Directory) => continue,
                Some(Node::File(_)) => return Err(TreeError::NotADirectory(current)),
                None if !is_target && !parents => return Err(TreeError::NotFound(current)),
                None => {
                    trace!(path = %current, "mkdir");
                    nodes.insert(current, Node::Directory);
                }
            }
        }
        Ok(())
    }

    fn open(&self, path: &str, flags: OpenFlags) -> Result<Box<dyn FileDescriptor>, TreeError> {
        let path = Self::canonical(path)?;

        let contents = {
            let mut nodes = self.nodes.write();
            match nodes.get(&path) {
                Some(Node::File(contents)) => Arc::clone(contents),
                Some(Node::Directory) => return Err(TreeError::NotAFile(path)),
                None if flags.create => {
                    let (parent, _) = split_parent(&path)?;
                    match nodes.get(&parent) {
                        Some(Node::Directory) => {}
                        Some(Node::File(_)) => return Err(TreeError::NotADirectory(parent)),
                        None => return Err(TreeError::NotFound(parent)),
                    }
                    let contents: Contents = Arc::new(RwLock::new(Vec::new()));
                    nodes.insert(path.clone(), Node::File(Arc::clone(&contents)));
                    contents
                }
                None => return Err(TreeError::NotFound(path)),
            }
        };

        if flags.truncate {
            contents.write().clear();
        }

        Ok(Box::new(MemoryFile {
            contents,
            position: 0,
            flags,
        }))
    }

    fn list(&self, path: &str) -> Result<Vec<String>, TreeError> {
        let parts = components(path)?;
        let dir = join(&parts);
        let nodes = self.nodes.read();
        match nodes.get(&dir) {
            Some(Node::Directory) => {}
            Some(Node::File(_)) => return Err(TreeError::NotADirectory(dir)),
            None => return Err(TreeError::NotFound(dir)),
        }

        let prefix = if parts.is_empty() { "/".to_string() } else { format!("{}/", dir) };
        let names = nodes
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect();
        Ok(names)
    }
}

/// Descriptor over a shared in-memory buffer
struct MemoryFile {
    contents: Contents,
    position: u64,
    flags: OpenFlags,
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.flags.read {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "descriptor is not readable"));
        }
        let data = self.contents.read();
        let start = (self.position as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.flags.write {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "descriptor is not writable"));
        }
        let mut data = self.contents.write();
        let start = self.position as usize;
        if data.len() < start {
            data.resize(start, 0);
        }
        let overlap = buf.len().min(data.len() - start);
        data[start..start + overlap].copy_from_slice(&buf[..overlap]);
        data.extend_from_slice(&buf[overlap..]);
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let size = self.contents.read().len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.position as i64 + delta,
            SeekFrom::End(delta) => size + delta,
        };
        if target < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative offset"));
        }
        self.position = target as u64;
        Ok(self.position)
    }
}

impl FileDescriptor for MemoryFile {
    fn size(&mut self) -> io::Result<u64> {
        Ok(self.contents.read().len() as u64)
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        if !self.flags.write {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "descriptor is not writable"));
        }
        self.contents.write().resize(len as usize, 0);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

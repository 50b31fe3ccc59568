//! Host-directory file tree
//!
//! Tree path `/a/b` maps to `<root>/a/b` on the host filesystem.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use super::path::components;
use super::{FileDescriptor, FileTree, NodeKind, OpenFlags};
use crate::error::TreeError;

/// File tree rooted at a host directory
pub struct DiskTree {
    root: PathBuf,
}

impl DiskTree {
    /// Use `root` as the tree root, creating it if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self, TreeError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Host directory backing the tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, path: &str) -> Result<PathBuf, TreeError> {
        let mut host = self.root.clone();
        for part in components(path)? {
            host.push(part);
        }
        Ok(host)
    }
}

/// Map a host error to the tree's vocabulary
fn tree_error(path: &str, e: io::Error) -> TreeError {
    match e.kind() {
        io::ErrorKind::NotFound => TreeError::NotFound(path.to_string()),
        io::ErrorKind::AlreadyExists => TreeError::AlreadyExists(path.to_string()),
        _ => TreeError::Io(e),
    }
}

impl FileTree for DiskTree {
    fn lookup(&self, path: &str) -> Result<NodeKind, TreeError> {
        let host = self.host_path(path)?;
        let meta = fs::metadata(&host).map_err(|e| tree_error(path, e))?;
        if meta.is_dir() {
            Ok(NodeKind::Directory)
        } else {
            Ok(NodeKind::File)
        }
    }

    fn mkdir(&self, path: &str, parents: bool) -> Result<(), TreeError> {
        let host = self.host_path(path)?;
        trace!(path, host = %host.display(), "mkdir");
        let result = if parents {
            fs::create_dir_all(&host)
        } else {
            fs::create_dir(&host)
        };
        result.map_err(|e| match self.lookup(path) {
            Ok(NodeKind::File) => TreeError::NotADirectory(path.to_string()),
            _ => tree_error(path, e),
        })
    }

    fn open(&self, path: &str, flags: OpenFlags) -> Result<Box<dyn FileDescriptor>, TreeError> {
        let host = self.host_path(path)?;
        if host.is_dir() {
            return Err(TreeError::NotAFile(path.to_string()));
        }
        let file = OpenOptions::new()
            .read(flags.read)
            .write(flags.write || flags.create || flags.truncate)
            .create(flags.create)
            .truncate(flags.truncate)
            .open(&host)
            .map_err(|e| tree_error(path, e))?;
        Ok(Box::new(DiskFile { file }))
    }

    fn list(&self, path: &str) -> Result<Vec<String>, TreeError> {
        let host = self.host_path(path)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&host).map_err(|e| tree_error(path, e))? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// Descriptor over a host file
struct DiskFile {
    file: File,
}

impl Read for DiskFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for DiskFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for DiskFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl FileDescriptor for DiskFile {
    fn size(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

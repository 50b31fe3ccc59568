//! Virtual File Module
//!
//! Sequential, seekable file handles over a [`FileTree`] whose descriptors
//! are only opened for the duration of one call.
//!
//! ## Per-call cycle
//! ```text
//!   read / write / seek
//!          │
//!          ▼
//!   open descriptor ──► seek to cursor ──► check cursor <= size
//!          │
//!          ▼
//!   transfer bytes ──► cursor += n ──► drop descriptor
//! ```
//!
//! The handle itself only records the path, the cursor and its flags.

mod read;

pub use read::{ReadFormat, ReadValue};

use std::fmt;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{FileError, TreeError};
use crate::tree::path::{base_name, namespaced};
use crate::tree::{FileDescriptor, FileTree, OpenFlags};

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// `r`: read only, file must exist
    #[default]
    Read,
    /// `w`: write only, create, truncate
    Write,
    /// `a`: write only, create, every write at end of file
    Append,
    /// `r+`: read and write, file must exist
    ReadUpdate,
    /// `w+`: read and write, create, truncate
    WriteUpdate,
    /// `a+`: read and write, create, every write at end of file
    AppendUpdate,
}

impl OpenMode {
    /// Parse a mode token. The binary marker `b` is accepted and ignored.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "r" | "rb" => Some(OpenMode::Read),
            "w" | "wb" => Some(OpenMode::Write),
            "a" | "ab" => Some(OpenMode::Append),
            "r+" | "rb+" => Some(OpenMode::ReadUpdate),
            "w+" | "wb+" => Some(OpenMode::WriteUpdate),
            "a+" | "ab+" => Some(OpenMode::AppendUpdate),
            _ => None,
        }
    }

    pub fn readable(self) -> bool {
        !matches!(self, OpenMode::Write | OpenMode::Append)
    }

    pub fn writable(self) -> bool {
        self != OpenMode::Read
    }

    pub fn append(self) -> bool {
        matches!(self, OpenMode::Append | OpenMode::AppendUpdate)
    }

    fn flags(self) -> OpenFlags {
        let create = !matches!(self, OpenMode::Read | OpenMode::ReadUpdate);
        OpenFlags {
            read: true,
            write: self.writable(),
            create,
            truncate: matches!(self, OpenMode::Write | OpenMode::WriteUpdate),
        }
    }
}

/// Reference point for a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Whence {
    Set,
    #[default]
    Cur,
    End,
}

impl Whence {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "set" => Some(Whence::Set),
            "cur" => Some(Whence::Cur),
            "end" => Some(Whence::End),
            _ => None,
        }
    }
}

/// A file handle with its own cursor
pub struct VirtualFile {
    tree: Arc<dyn FileTree>,

    /// Absolute tree path
    path: String,

    /// Last path component
    name: String,

    cursor: u64,
    readable: bool,
    writable: bool,
    append: bool,
    closed: bool,
}

impl VirtualFile {
    /// Open `path` inside the namespace rooted at `root`.
    ///
    /// The path is rewritten under the root whether it is relative or
    /// absolute. Truncating modes cut the file here; append modes start
    /// with the cursor at end of file.
    pub fn open(
        tree: Arc<dyn FileTree>,
        root: &str,
        path: &str,
        mode: OpenMode,
    ) -> Result<Self, FileError> {
        let full = namespaced(root, path).ok_or_else(|| FileError::InvalidPath(path.to_string()))?;

        let mut descriptor = tree
            .open(&full, mode.flags())
            .map_err(|source| FileError::BackendOpenFailed {
                path: path.to_string(),
                source,
            })?;
        let cursor = if mode.append() { descriptor.size()? } else { 0 };
        drop(descriptor);

        debug!(path = %full, ?mode, "Opened virtual file");

        Ok(Self {
            tree,
            name: base_name(&full).to_string(),
            path: full,
            cursor,
            readable: mode.readable(),
            writable: mode.writable(),
            append: mode.append(),
            closed: false,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current cursor offset
    pub fn position(&self) -> u64 {
        self.cursor
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // =========================================================================
    // Descriptor handling
    // =========================================================================

    fn ensure_open(&self) -> Result<(), FileError> {
        if self.closed {
            return Err(FileError::HandleClosed);
        }
        Ok(())
    }

    fn descriptor(&self, write: bool) -> Result<Box<dyn FileDescriptor>, FileError> {
        let flags = if write {
            OpenFlags::read_write()
        } else {
            OpenFlags::read_only()
        };
        self.tree
            .open(&self.path, flags)
            .map_err(|source: TreeError| FileError::BackendOpenFailed {
                path: self.path.clone(),
                source,
            })
    }

    /// Open a descriptor positioned at the cursor. Fails if the cursor is
    /// beyond the current end of file.
    fn positioned(&self, write: bool) -> Result<(Box<dyn FileDescriptor>, u64), FileError> {
        let mut descriptor = self.descriptor(write)?;
        let size = descriptor.size()?;
        if self.cursor > size {
            return Err(FileError::OffsetPastEnd {
                offset: self.cursor as i64,
                size,
            });
        }
        descriptor.seek(SeekFrom::Start(self.cursor))?;
        Ok((descriptor, size))
    }

    // =========================================================================
    // Reading
    // =========================================================================

    fn ensure_readable(&self) -> Result<(), FileError> {
        self.ensure_open()?;
        if !self.readable {
            return Err(FileError::NotReadable(self.name.clone()));
        }
        Ok(())
    }

    /// Perform one read. `Ok(None)` is end of stream.
    pub fn read(&mut self, format: ReadFormat) -> Result<Option<ReadValue>, FileError> {
        let value = match format {
            ReadFormat::Count(n) => self.read_bytes(n)?.map(ReadValue::Bytes),
            ReadFormat::Line => self.read_line()?.map(ReadValue::Bytes),
            ReadFormat::All => Some(ReadValue::Bytes(self.read_all()?)),
            ReadFormat::Number => self.read_number()?.map(ReadValue::Number),
        };
        Ok(value)
    }

    /// Perform several reads, one result per format. Stops after the first
    /// end-of-stream, which is the last element.
    pub fn read_formats(&mut self, formats: &[ReadFormat]) -> Result<Vec<Option<ReadValue>>, FileError> {
        let mut results = Vec::with_capacity(formats.len());
        for format in formats {
            let value = self.read(*format)?;
            let done = value.is_none();
            results.push(value);
            if done {
                break;
            }
        }
        Ok(results)
    }

    /// Read up to `n` bytes. A count of zero tests for end of file.
    pub fn read_bytes(&mut self, n: usize) -> Result<Option<Vec<u8>>, FileError> {
        self.ensure_readable()?;
        let (descriptor, size) = self.positioned(false)?;

        if n == 0 {
            return Ok(if self.cursor >= size { None } else { Some(Vec::new()) });
        }

        let mut buf = Vec::with_capacity(n.min((size - self.cursor) as usize));
        descriptor.take(n as u64).read_to_end(&mut buf)?;
        if buf.is_empty() {
            return Ok(None);
        }
        self.cursor += buf.len() as u64;
        trace!(path = %self.path, bytes = buf.len(), cursor = self.cursor, "read");
        Ok(Some(buf))
    }

    /// Read one line without its trailing newline
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>, FileError> {
        self.ensure_readable()?;
        let (descriptor, _) = self.positioned(false)?;

        let mut line = Vec::new();
        let consumed = BufReader::new(descriptor).read_until(b'\n', &mut line)?;
        if consumed == 0 {
            return Ok(None);
        }
        self.cursor += consumed as u64;
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Read from the cursor to end of file. At end of file this is empty,
    /// never end of stream.
    pub fn read_all(&mut self) -> Result<Vec<u8>, FileError> {
        self.ensure_readable()?;
        let (mut descriptor, _) = self.positioned(false)?;

        let mut buf = Vec::new();
        descriptor.read_to_end(&mut buf)?;
        self.cursor += buf.len() as u64;
        Ok(buf)
    }

    /// Read one numeric token, skipping leading whitespace
    pub fn read_number(&mut self) -> Result<Option<f64>, FileError> {
        self.ensure_readable()?;
        let (mut descriptor, _) = self.positioned(false)?;

        let mut rest = Vec::new();
        descriptor.read_to_end(&mut rest)?;
        match read::scan_number(&rest) {
            Some((value, consumed)) => {
                self.cursor += consumed as u64;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Iterate over the remaining lines
    pub fn lines(&mut self) -> Lines<'_> {
        Lines {
            file: self,
            done: false,
        }
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Write `data` at the cursor (or at end of file in append mode) and
    /// advance the cursor past it
    pub fn write(&mut self, data: &[u8]) -> Result<usize, FileError> {
        self.ensure_open()?;
        if !self.writable {
            return Err(FileError::NotWritable(self.name.clone()));
        }

        let (mut descriptor, start) = if self.append {
            let mut descriptor = self.descriptor(true)?;
            let end = descriptor.seek(SeekFrom::End(0))?;
            (descriptor, end)
        } else {
            (self.positioned(true)?.0, self.cursor)
        };

        // the cursor only moves once the bytes are in
        descriptor.write_all(data)?;
        descriptor.flush()?;
        self.cursor = start + data.len() as u64;
        trace!(path = %self.path, bytes = data.len(), cursor = self.cursor, "write");
        Ok(data.len())
    }

    // =========================================================================
    // Seeking
    // =========================================================================

    /// Move the cursor. The result must lie within `0..=size`.
    pub fn seek(&mut self, whence: Whence, offset: i64) -> Result<u64, FileError> {
        self.ensure_open()?;
        let size = self.size()?;

        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.cursor as i64,
            Whence::End => size as i64,
        };
        let target = base
            .checked_add(offset)
            .ok_or(FileError::OffsetPastEnd { offset, size })?;
        if target < 0 {
            return Err(FileError::NegativeOffset(target));
        }
        if target as u64 > size {
            return Err(FileError::OffsetPastEnd { offset: target, size });
        }

        self.cursor = target as u64;
        Ok(self.cursor)
    }

    /// Current size of the backing file
    pub fn size(&self) -> Result<u64, FileError> {
        self.ensure_open()?;
        Ok(self.descriptor(false)?.size()?)
    }

    /// Mark the handle closed. No backend resource is held, so this only
    /// flips the flag.
    pub fn close(&mut self) -> Result<(), FileError> {
        self.ensure_open()?;
        self.closed = true;
        debug!(path = %self.path, "Closed virtual file");
        Ok(())
    }
}

impl fmt::Display for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.closed { "closed" } else { "opened" };
        write!(f, "file ({}) ({})", self.name, state)
    }
}

impl fmt::Debug for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFile")
            .field("path", &self.path)
            .field("cursor", &self.cursor)
            .field("readable", &self.readable)
            .field("writable", &self.writable)
            .field("append", &self.append)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Iterator over lines, ending at end of file or on the first error
pub struct Lines<'a> {
    file: &'a mut VirtualFile,
    done: bool,
}

impl Iterator for Lines<'_> {
    type Item = Result<Vec<u8>, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.file.read_line().transpose();
        self.done = !matches!(item, Some(Ok(_)));
        item
    }
}

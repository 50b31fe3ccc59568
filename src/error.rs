//! Error types for persistbridge
//!
//! One enum per concern, plus [`BridgeError`] which the host surface returns
//! and which every other error converts into.

use thiserror::Error;

/// Result type alias using BridgeError
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

// =============================================================================
// Codec Errors
// =============================================================================

/// Failure to turn a dynamic value into wire text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("cannot encode recursively nested tables to JSON")]
    Cycle,

    #[error("cannot encode sparse array (expected key {expected}, found {found})")]
    SparseArray { expected: f64, found: f64 },

    #[error("cannot encode mixed or invalid key types ({0} key)")]
    InvalidKeyType(&'static str),

    #[error("cannot encode {0} to JSON")]
    UnsupportedType(&'static str),

    #[error("cannot encode non-finite number {0} to JSON")]
    NonFiniteNumber(f64),
}

/// Failure to turn wire text into a dynamic value
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON input: {0}")]
    MalformedInput(#[from] serde_json::Error),
}

// =============================================================================
// File Tree Errors (collaborator)
// =============================================================================

/// Errors reported by a [`crate::tree::FileTree`] implementation
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("{0}: no such file or directory")]
    NotFound(String),

    #[error("{0} was not a directory")]
    NotADirectory(String),

    #[error("{0} was not a file")]
    NotAFile(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Virtual File Errors
// =============================================================================

/// Errors from [`crate::vfile::VirtualFile`] operations
#[derive(Debug, Error)]
pub enum FileError {
    #[error("{0} is opened for only writing.")]
    NotReadable(String),

    #[error("{0} is opened for only reading.")]
    NotWritable(String),

    #[error("offset was past end of file ({offset} > {size})")]
    OffsetPastEnd { offset: i64, size: u64 },

    #[error("cannot seek to negative offset {0}")]
    NegativeOffset(i64),

    #[error("cannot open {path}: {source}")]
    BackendOpenFailed {
        path: String,
        #[source]
        source: TreeError,
    },

    #[error("file is closed")]
    HandleClosed,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Storage Engine Errors (collaborator)
// =============================================================================

/// Errors from the WAL-backed [`crate::engine::Engine`]
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("store is closed")]
    Closed,
}

// =============================================================================
// Store Bridge Errors
// =============================================================================

/// Errors from store and batch operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("encode key failed: {0}")]
    KeyEncodeFailed(#[source] EncodeError),

    #[error("encode value failed: {0}")]
    ValueEncodeFailed(#[source] EncodeError),

    #[error("decode value failed: {0}")]
    ValueDecodeFailed(#[source] DecodeError),

    #[error("not found")]
    NotFound,

    #[error("store is closed")]
    Closed,

    #[error("batch has no originating store")]
    Unbound,

    #[error("backend failure: {0}")]
    BackendFailure(#[source] EngineError),
}

impl From<EngineError> for StoreError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Closed => StoreError::Closed,
            other => StoreError::BackendFailure(other),
        }
    }
}

/// Errors from iterator operations
#[derive(Debug, Error)]
pub enum IteratorError {
    #[error("iterator backend failure: {0}")]
    BackendFailure(#[source] EngineError),

    #[error("decode failed: {0}")]
    DecodeFailure(#[source] DecodeError),

    #[error("encode key failed: {0}")]
    KeyEncodeFailed(#[source] EncodeError),

    #[error("iterator released")]
    Released,
}

// =============================================================================
// Host Surface Errors
// =============================================================================

/// Top-level error returned by host calls
///
/// An `Err` aborts the current script call. Recoverable conditions are not
/// errors at this level; they come back as `nil, message` results.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bad argument #{position} to '{function}' ({message})")]
    Argument {
        function: String,
        position: usize,
        message: String,
    },

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Iterator(#[from] IteratorError),

    #[error("script error: {0}")]
    Script(String),
}

impl BridgeError {
    /// Build an argument-contract violation
    pub fn argument(function: &str, position: usize, message: impl Into<String>) -> Self {
        BridgeError::Argument {
            function: function.to_string(),
            position,
            message: message.into(),
        }
    }
}

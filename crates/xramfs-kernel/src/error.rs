//! Filesystem error types.

use std::io;
use thiserror::Error;

use crate::types::FileType;

/// Error type for every engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// Path absent where presence was required.
    #[error("not found: {0}")]
    NotFound(String),

    /// Creation collided with a live record of the same path.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Rename target already names a live file or directory.
    #[error("destination exists: {0}")]
    DestinationExists(String),

    /// Directory still has entries.
    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// The root directory cannot be removed or renamed.
    #[error("operation not permitted on root directory")]
    IsRoot,

    /// Non-recursive mkdir whose parent directory does not exist.
    #[error("parent directory does not exist: {0}")]
    AncestorUnreachable(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// No free slot left in a fixed-size table.
    #[error("{kind} table full ({max} slots)")]
    CapacityExceeded { kind: FileType, max: usize },

    /// Buffer growth would exceed the partition capacity.
    #[error("quota exceeded: {requested} bytes requested, {available} available")]
    QuotaExceeded { requested: usize, available: usize },

    /// The memory region refused to hand out more bytes.
    #[error("memory region {region} exhausted: {requested} bytes requested")]
    OutOfMemory { region: String, requested: usize },

    /// Null, relative or otherwise malformed path.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// Handle does not refer to an open file or directory.
    #[error("bad handle: {0}")]
    BadHandle(usize),

    /// Write attempted through a read-only handle.
    #[error("handle {0} is open read-only")]
    NotWritable(usize),

    /// Seek target outside `[0, length]`.
    #[error("seek to {target} outside [0, {length}]")]
    InvalidSeek { target: i64, length: usize },

    /// Invalid mount configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a DestinationExists error.
    pub fn destination_exists(path: impl Into<String>) -> Self {
        Self::DestinationExists(path.into())
    }

    /// Create a NotEmpty error.
    pub fn not_empty(path: impl Into<String>) -> Self {
        Self::NotEmpty(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Slot-table exhaustion is a mount-level fault; everything else is a
    /// per-call failure the caller can recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FsError::CapacityExceeded { .. })
    }

    /// True for failures that freeing space could fix.
    pub fn is_out_of_space(&self) -> bool {
        matches!(
            self,
            FsError::QuotaExceeded { .. } | FsError::OutOfMemory { .. }
        )
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        let kind = match &e {
            FsError::NotFound(_) | FsError::AncestorUnreachable(_) => io::ErrorKind::NotFound,
            FsError::AlreadyExists(_) | FsError::DestinationExists(_) => {
                io::ErrorKind::AlreadyExists
            }
            FsError::NotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            FsError::IsRoot | FsError::NotWritable(_) => io::ErrorKind::PermissionDenied,
            FsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            FsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            FsError::QuotaExceeded { .. } | FsError::CapacityExceeded { .. } => {
                io::ErrorKind::StorageFull
            }
            FsError::OutOfMemory { .. } => io::ErrorKind::OutOfMemory,
            FsError::InvalidPath(_) | FsError::InvalidSeek { .. } | FsError::Config(_) => {
                io::ErrorKind::InvalidInput
            }
            FsError::BadHandle(_) => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, e)
    }
}

/// Engine result type.
pub type FsResult<T> = Result<T, FsError>;

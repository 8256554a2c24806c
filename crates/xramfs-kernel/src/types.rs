//! Core filesystem types.
//!
//! Records are addressed by slot index. A slot index alone is ambiguous
//! (files and directories live in separate tables), so references that may
//! point at either carry the table in an [`Inode`] tag.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Tagged slot reference into the file or directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Inode {
    File(usize),
    Dir(usize),
}

impl Inode {
    /// Slot index within the owning table.
    pub fn slot(&self) -> usize {
        match self {
            Inode::File(slot) | Inode::Dir(slot) => *slot,
        }
    }

    /// Which table the slot lives in.
    pub fn kind(&self) -> FileType {
        match self {
            Inode::File(_) => FileType::File,
            Inode::Dir(_) => FileType::Directory,
        }
    }
}

/// Directory entry: one child of a directory, by basename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Child record.
    pub inode: Inode,
    /// Entry name (basename, not full path).
    pub name: String,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(inode: Inode, name: impl Into<String>) -> Self {
        Self {
            inode,
            name: name.into(),
        }
    }

    /// Entry type.
    pub fn kind(&self) -> FileType {
        self.inode.kind()
    }
}

/// Result of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// Record the path resolved to.
    pub inode: Inode,
    /// Full stored path.
    pub path: String,
    /// Basename.
    pub name: String,
    /// Logical size in bytes (0 for directories).
    pub size: usize,
    /// Allocated buffer bytes (0 for directories).
    pub capacity: usize,
    /// Allocated growth blocks.
    pub blocks: usize,
    /// Growth block size of the mount.
    pub block_size: usize,
}

impl FileAttr {
    /// Entry type.
    pub fn kind(&self) -> FileType {
        self.inode.kind()
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind().is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind().is_dir()
    }
}

/// Filesystem statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatFs {
    /// Partition capacity in bytes (0 = unlimited).
    pub total_bytes: usize,
    /// Sum of every live file's allocated capacity.
    pub used_bytes: usize,
    /// Bytes still available under the quota (`usize::MAX` when unlimited).
    pub free_bytes: usize,
    /// Growth block size.
    pub block_size: usize,
    /// Slots per table.
    pub max_items: usize,
    /// Live files.
    pub files: usize,
    /// Live directories, root included.
    pub dirs: usize,
    /// Set once a slot table ran out of slots.
    pub degraded: bool,
}

/// Internal open mode, the single target of host flag translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum OpenMode {
    /// Read from offset 0; never creates.
    Read,
    /// Drop existing content, create when missing.
    WriteTruncate,
    /// Every write lands at end of file, create when missing.
    WriteAppend,
    /// Keep content, cursor at 0, create when missing.
    ReadWrite,
}

impl OpenMode {
    /// Whether a missing file is created on open.
    pub fn creates(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }

    /// Whether writes are permitted through the handle.
    pub fn writable(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// Handle to an open file. Wraps the file slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileHandle(pub usize);

/// Handle to an open directory. Wraps the directory slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirHandle(pub usize);

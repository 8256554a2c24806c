//! Path resolution.
//!
//! The file table is consulted first, then the directory tree. Creation
//! refuses a path live in the other table, so the order never decides
//! between two matches.

use crate::dirs::DirectoryTree;
use crate::error::{FsError, FsResult};
use crate::files::FileSlotTable;
use crate::path;
use crate::types::{FileAttr, Inode};

/// Which record, if any, a normalized path names.
pub fn resolve(files: &FileSlotTable, tree: &DirectoryTree, path: &str) -> Option<Inode> {
    files
        .find(path)
        .map(Inode::File)
        .or_else(|| tree.find(path).map(Inode::Dir))
}

/// Attributes of the record at `inode`.
pub fn attr_of(files: &FileSlotTable, tree: &DirectoryTree, inode: Inode) -> FsResult<FileAttr> {
    let block_size = files.quota().block_size;
    match inode {
        Inode::File(slot) => {
            let record = files.get(slot).ok_or(FsError::BadHandle(slot))?;
            let path = record.path().unwrap_or_default().to_string();
            Ok(FileAttr {
                inode,
                name: path::basename(&path).to_string(),
                path,
                size: record.len(),
                capacity: record.capacity(),
                blocks: record.capacity() / block_size,
                block_size,
            })
        }
        Inode::Dir(slot) => {
            let record = tree.get(slot).ok_or(FsError::BadHandle(slot))?;
            let path = record.path().unwrap_or_default().to_string();
            Ok(FileAttr {
                inode,
                name: path::basename(&path).to_string(),
                path,
                size: 0,
                capacity: 0,
                blocks: 0,
                block_size,
            })
        }
    }
}

/// Stat a normalized path.
pub fn stat(files: &FileSlotTable, tree: &DirectoryTree, path: &str) -> FsResult<FileAttr> {
    let inode = resolve(files, tree, path).ok_or_else(|| FsError::not_found(path))?;
    attr_of(files, tree, inode)
}

//! Directory tree.
//!
//! A fixed-size arena of directory records. Slot 0 is the root and is never
//! freed. Each record links to its parent by slot index and keeps its
//! children as an insertion-ordered entry list, so listings come straight
//! from the list without scanning the file table.

use tracing::{debug, error, warn};

use crate::error::{FsError, FsResult};
use crate::files::FileSlotTable;
use crate::path::{self, ROOT};
use crate::types::{DirEntry, FileType, Inode};

/// Slot of the root directory.
pub const ROOT_SLOT: usize = 0;

/// One directory slot.
#[derive(Debug, Default)]
pub struct DirRecord {
    slot: usize,
    path: Option<String>,
    parent: Option<usize>,
    entries: Vec<DirEntry>,
    read_cursor: usize,
}

impl DirRecord {
    fn free(slot: usize) -> Self {
        Self {
            slot,
            ..Default::default()
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Stored path; `None` for a free slot.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Parent slot; `None` for the root and for free slots.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Children in insertion order.
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Next `readdir` position.
    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    pub fn is_live(&self) -> bool {
        self.path.is_some()
    }
}

/// Fixed-capacity table of directories.
#[derive(Debug)]
pub struct DirectoryTree {
    slots: Vec<DirRecord>,
}

impl DirectoryTree {
    /// Create a tree with `max_items` slots, root included.
    pub fn new(max_items: usize) -> Self {
        let mut slots: Vec<DirRecord> = (0..max_items.max(1)).map(DirRecord::free).collect();
        slots[ROOT_SLOT].path = Some(ROOT.to_string());
        Self { slots }
    }

    pub fn max_items(&self) -> usize {
        self.slots.len()
    }

    /// Live directories, root included.
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|r| r.is_live()).count()
    }

    /// Live records.
    pub fn iter(&self) -> impl Iterator<Item = &DirRecord> {
        self.slots.iter().filter(|r| r.is_live())
    }

    /// Linear scan for a directory by normalized path.
    pub fn find(&self, path: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|r| r.path.as_deref() == Some(path))
    }

    /// Live record at `slot`.
    pub fn get(&self, slot: usize) -> Option<&DirRecord> {
        self.slots.get(slot).filter(|r| r.is_live())
    }

    fn live_mut(&mut self, slot: usize) -> FsResult<&mut DirRecord> {
        self.slots
            .get_mut(slot)
            .filter(|r| r.is_live())
            .ok_or(FsError::BadHandle(slot))
    }

    fn allocate(&mut self, path: &str, parent: usize) -> FsResult<usize> {
        let max = self.slots.len();
        let Some(record) = self.slots.iter_mut().find(|r| !r.is_live()) else {
            error!(path, max, "directory table full");
            return Err(FsError::CapacityExceeded {
                kind: FileType::Directory,
                max,
            });
        };
        record.path = Some(path.to_string());
        record.parent = Some(parent);
        record.entries.clear();
        record.read_cursor = 0;
        debug!(slot = record.slot, path, "directory slot allocated");
        Ok(record.slot)
    }

    /// Create one directory. The parent must already exist.
    ///
    /// Idempotent: an existing directory returns its slot unchanged.
    pub fn mkdir(&mut self, path: &str, files: &FileSlotTable) -> FsResult<usize> {
        if let Some(slot) = self.find(path) {
            return Ok(slot);
        }
        if files.find(path).is_some() {
            warn!(path, "mkdir refused: a file has this path");
            return Err(FsError::already_exists(path));
        }

        let parent_path = path::dirname(path);
        let parent = match self.find(parent_path) {
            Some(slot) => slot,
            None if files.find(parent_path).is_some() => {
                return Err(FsError::not_a_directory(parent_path));
            }
            None => return Err(FsError::AncestorUnreachable(parent_path.to_string())),
        };

        let slot = self.allocate(path, parent)?;
        self.add_entry(parent, DirEntry::new(Inode::Dir(slot), path::basename(path)))?;
        Ok(slot)
    }

    /// Ensure every ancestor of `path` exists and return the slot of its
    /// immediate parent.
    pub fn mkpath(&mut self, path: &str, files: &FileSlotTable) -> FsResult<usize> {
        let mut parent = ROOT_SLOT;
        for ancestor in path::ancestors(path) {
            parent = match self.mkdir(ancestor, files) {
                Ok(slot) => slot,
                Err(FsError::AlreadyExists(p)) => return Err(FsError::NotADirectory(p)),
                Err(e) => return Err(e),
            };
        }
        Ok(parent)
    }

    /// Append a child entry.
    pub fn add_entry(&mut self, dir: usize, entry: DirEntry) -> FsResult<()> {
        self.live_mut(dir)?.entries.push(entry);
        Ok(())
    }

    /// Remove the entry referencing `inode`, compacting the list. Returns
    /// the number of entries left.
    ///
    /// An entry already handed out by `readdir` pulls the cursor back by one
    /// so iteration neither skips nor repeats.
    pub fn remove_entry(&mut self, dir: usize, inode: Inode) -> FsResult<usize> {
        let record = self.live_mut(dir)?;
        if let Some(idx) = record.entries.iter().position(|e| e.inode == inode) {
            record.entries.remove(idx);
            if idx < record.read_cursor {
                record.read_cursor -= 1;
            }
        }
        Ok(record.entries.len())
    }

    /// Remove an empty directory.
    pub fn rmdir(&mut self, path: &str, files: &FileSlotTable) -> FsResult<()> {
        if path::is_root(path) {
            warn!("rmdir refused on root");
            return Err(FsError::IsRoot);
        }
        let Some(slot) = self.find(path) else {
            if files.find(path).is_some() {
                return Err(FsError::not_a_directory(path));
            }
            return Err(FsError::not_found(path));
        };
        if !self.slots[slot].entries.is_empty() {
            return Err(FsError::not_empty(path));
        }

        if let Some(parent) = self.slots[slot].parent {
            self.remove_entry(parent, Inode::Dir(slot))?;
        }
        self.slots[slot] = DirRecord::free(slot);
        debug!(slot, path, "directory removed");
        Ok(())
    }

    /// Rename a directory in place: same slot, same parent, same children.
    /// The parent's entry takes the new basename, and every file and
    /// directory below it has its stored path moved under `to`.
    pub fn rename_dir(
        &mut self,
        from: &str,
        to: &str,
        files: &mut FileSlotTable,
    ) -> FsResult<()> {
        if path::is_root(from) {
            return Err(FsError::IsRoot);
        }
        let slot = self.find(from).ok_or_else(|| FsError::not_found(from))?;
        if path::strip_dir_prefix(to, from).is_some() {
            warn!(from, to, "rename refused: destination inside source");
            return Err(FsError::invalid_path(to));
        }
        let taken = |p: &str| p == to || path::strip_dir_prefix(p, to).is_some();
        let dir_taken = self.iter().filter_map(DirRecord::path).any(taken);
        if dir_taken || files.iter().filter_map(|r| r.path()).any(taken) {
            return Err(FsError::destination_exists(to));
        }

        self.slots[slot].path = Some(to.to_string());
        let moved = self.rewrite_prefix(from, to) + files.rewrite_prefix(from, to);

        if let Some(parent) = self.slots[slot].parent {
            let name = path::basename(to);
            if let Some(entry) = self
                .live_mut(parent)?
                .entries
                .iter_mut()
                .find(|e| e.inode == Inode::Dir(slot))
            {
                entry.name = name.to_string();
            }
        }
        debug!(slot, from, to, moved, "directory renamed");
        Ok(())
    }

    /// Move every directory stored under `from/` to the same place under
    /// `to/`. Returns how many were moved.
    fn rewrite_prefix(&mut self, from: &str, to: &str) -> usize {
        let mut moved = 0;
        for record in self.slots.iter_mut() {
            let moved_path = record
                .path()
                .and_then(|p| path::strip_dir_prefix(p, from))
                .map(|rest| path::join(to, rest));
            if let Some(new_path) = moved_path {
                record.path = Some(new_path);
                moved += 1;
            }
        }
        moved
    }

    /// Reset iteration to the first entry.
    pub fn rewind(&mut self, dir: usize) -> FsResult<()> {
        self.live_mut(dir)?.read_cursor = 0;
        Ok(())
    }

    /// Next entry, or `None` once every entry has been returned.
    pub fn next_entry(&mut self, dir: usize) -> FsResult<Option<DirEntry>> {
        let record = self.live_mut(dir)?;
        let entry = record.entries.get(record.read_cursor).cloned();
        if entry.is_some() {
            record.read_cursor += 1;
        }
        Ok(entry)
    }

    /// Free every directory except the root and empty the root's list.
    pub fn clear(&mut self) {
        for record in self.slots.iter_mut().skip(1) {
            *record = DirRecord::free(record.slot);
        }
        let root = &mut self.slots[ROOT_SLOT];
        root.entries.clear();
        root.read_cursor = 0;
    }
}

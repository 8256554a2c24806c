//! File slot table.
//!
//! A fixed-size array of file records. Lookup is a linear scan by path;
//! uniqueness comes from the engine refusing to create a path that is
//! already live. The table also owns the quota state, since enforcing it
//! means summing every live file's capacity.

use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::buffer::{FileBuffer, Quota};
use crate::constants::AMPLE_BLOCK_SIZE;
use crate::dirs::DirectoryTree;
use crate::error::{FsError, FsResult};
use crate::path;
use crate::region::{HeapRegion, SharedRegion};
use crate::types::{FileType, Inode, OpenMode};

/// One file slot.
#[derive(Debug, Default)]
pub struct FileRecord {
    slot: usize,
    path: Option<String>,
    buffer: FileBuffer,
    cursor: usize,
    parent_dir: usize,
    open: Option<OpenMode>,
}

impl FileRecord {
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

    /// Logical content size.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Allocated bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Directory slot holding this file's entry.
    pub fn parent_dir(&self) -> usize {
        self.parent_dir
    }

    /// Mode of the current handle, if open.
    pub fn open_mode(&self) -> Option<OpenMode> {
        self.open
    }

    /// Logical content.
    pub fn contents(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn is_live(&self) -> bool {
        self.path.is_some()
    }
}

/// Fixed-capacity table of files plus the quota they share.
#[derive(Debug)]
pub struct FileSlotTable {
    slots: Vec<FileRecord>,
    quota: Quota,
    region: SharedRegion,
}

impl FileSlotTable {
    /// Unlimited table of `max_items` slots on the heap.
    pub fn new(max_items: usize) -> Self {
        Self::with_quota(max_items, Quota::new(0, AMPLE_BLOCK_SIZE), Arc::new(HeapRegion))
    }

    pub fn with_quota(max_items: usize, quota: Quota, region: SharedRegion) -> Self {
        Self {
            slots: (0..max_items).map(FileRecord::free).collect(),
            quota,
            region,
        }
    }

    pub fn max_items(&self) -> usize {
        self.slots.len()
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    /// Live files.
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|r| r.is_live()).count()
    }

    /// Live records.
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.slots.iter().filter(|r| r.is_live())
    }

    /// Sum of every live file's allocated capacity.
    pub fn used_bytes(&self) -> usize {
        self.iter().map(FileRecord::capacity).sum()
    }

    /// Linear scan for a file by normalized path.
    pub fn find(&self, path: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|r| r.path.as_deref() == Some(path))
    }

    /// Live record at `slot`.
    pub fn get(&self, slot: usize) -> Option<&FileRecord> {
        self.slots.get(slot).filter(|r| r.is_live())
    }

    fn live_mut(&mut self, slot: usize) -> FsResult<&mut FileRecord> {
        self.slots
            .get_mut(slot)
            .filter(|r| r.is_live())
            .ok_or(FsError::BadHandle(slot))
    }

    /// Claim the first free slot for `path`.
    pub fn allocate(&mut self, path: &str, parent_dir: usize) -> FsResult<usize> {
        let max = self.slots.len();
        let Some(record) = self.slots.iter_mut().find(|r| !r.is_live()) else {
            error!(path, max, "file table full");
            return Err(FsError::CapacityExceeded {
                kind: FileType::File,
                max,
            });
        };
        record.path = Some(path.to_string());
        record.parent_dir = parent_dir;
        record.cursor = 0;
        record.open = None;
        debug!(slot = record.slot, path, "file slot allocated");
        Ok(record.slot)
    }

    /// Free a slot: path, buffer, counters, and its entry in the parent
    /// directory, all in one step.
    pub fn release(&mut self, slot: usize, tree: &mut DirectoryTree) -> FsResult<()> {
        let region = &*self.region;
        let record = self
            .slots
            .get_mut(slot)
            .filter(|r| r.is_live())
            .ok_or(FsError::BadHandle(slot))?;
        let parent = record.parent_dir;
        record.buffer.release(region);
        *record = FileRecord::free(slot);

        tree.remove_entry(parent, Inode::File(slot))?;
        debug!(slot, "file slot released");
        Ok(())
    }

    /// Release every live file.
    pub fn clear(&mut self, tree: &mut DirectoryTree) -> FsResult<()> {
        let live: Vec<usize> = self.iter().map(FileRecord::slot).collect();
        for slot in live {
            self.release(slot, tree)?;
        }
        Ok(())
    }

    /// Rewrite the stored path. Parent linkage is left alone.
    pub fn set_path(&mut self, slot: usize, path: &str) -> FsResult<()> {
        self.live_mut(slot)?.path = Some(path.to_string());
        Ok(())
    }

    /// Move every file stored under `from/` to the same place under `to/`.
    /// Returns how many were moved.
    pub(crate) fn rewrite_prefix(&mut self, from: &str, to: &str) -> usize {
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

    pub(crate) fn set_open(&mut self, slot: usize, mode: Option<OpenMode>) -> FsResult<()> {
        self.live_mut(slot)?.open = mode;
        Ok(())
    }

    pub(crate) fn set_cursor(&mut self, slot: usize, cursor: usize) -> FsResult<()> {
        let record = self.live_mut(slot)?;
        debug_assert!(cursor <= record.buffer.len());
        record.cursor = cursor;
        Ok(())
    }

    /// Drop content and storage; the next write grows from zero.
    pub fn truncate(&mut self, slot: usize) -> FsResult<()> {
        let region = &*self.region;
        let record = self
            .slots
            .get_mut(slot)
            .filter(|r| r.is_live())
            .ok_or(FsError::BadHandle(slot))?;
        record.buffer.release(region);
        record.cursor = 0;
        Ok(())
    }

    /// Grow a file's buffer block by block until `cursor + additional`
    /// fits. The whole growth is checked against the quota up front, then
    /// every block again with usage recomputed across all files. A refused
    /// growth leaves the buffer at its starting capacity.
    pub fn ensure_capacity(&mut self, slot: usize, additional: usize) -> FsResult<()> {
        let record = self.get(slot).ok_or(FsError::BadHandle(slot))?;
        let target = record.cursor + additional;
        let start = record.capacity();
        if start >= target {
            return Ok(());
        }

        let block = self.quota.block_size;
        let needed = (target - start).div_ceil(block).saturating_mul(block);
        let used = self.used_bytes();
        let available = self.quota.available(used);
        if needed > available {
            warn!(slot, used, target, needed, "buffer growth refused by quota");
            return Err(FsError::QuotaExceeded {
                requested: needed,
                available,
            });
        }

        let grown = self.grow_to(slot, target);
        if grown.is_err() {
            let region = &*self.region;
            self.slots[slot].buffer.shrink_to(start, region);
        }
        grown
    }

    fn grow_to(&mut self, slot: usize, target: usize) -> FsResult<()> {
        while self.slots[slot].capacity() < target {
            let used = self.used_bytes();
            if let Err(e) = self.quota.admit_block(used) {
                warn!(slot, used, target, "buffer growth refused by quota");
                return Err(e);
            }
            let region = &*self.region;
            self.slots[slot].buffer.grow_block(self.quota.block_size, region)?;
        }
        Ok(())
    }

    /// Write at the cursor and advance it.
    pub fn write(&mut self, slot: usize, data: &[u8]) -> FsResult<usize> {
        self.ensure_capacity(slot, data.len())?;
        let record = self.live_mut(slot)?;
        let written = record.buffer.write_at(record.cursor, data);
        record.cursor += written;
        trace!(slot, written, cursor = record.cursor, "write");
        Ok(written)
    }

    /// Read from the cursor and advance it. Returns 0 at end of file.
    pub fn read(&mut self, slot: usize, buf: &mut [u8]) -> FsResult<usize> {
        let record = self.live_mut(slot)?;
        let read = record.buffer.read_at(record.cursor, buf);
        record.cursor += read;
        trace!(slot, read, cursor = record.cursor, "read");
        Ok(read)
    }
}

impl Drop for FileSlotTable {
    fn drop(&mut self) {
        let region = &*self.region;
        for record in self.slots.iter_mut() {
            record.buffer.release(region);
        }
    }
}

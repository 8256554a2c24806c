//! Per-file byte storage that grows in fixed blocks under a global quota.
//!
//! A [`FileBuffer`] only shrinks to undo growth for a refused write;
//! truncation releases the storage outright and the next write starts
//! growing from zero again.
//! The quota itself spans every file, so the check lives with the file table
//! (see [`crate::files::FileSlotTable::ensure_capacity`]); [`Quota`] only
//! holds the limits and the arithmetic.

use tracing::trace;

use crate::error::{FsError, FsResult};
use crate::region::MemoryRegion;

/// Partition limits shared by every buffer of a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Total allocated bytes allowed (0 = unlimited).
    pub partition_capacity: usize,
    /// Growth increment.
    pub block_size: usize,
}

impl Quota {
    pub fn new(partition_capacity: usize, block_size: usize) -> Self {
        Self {
            partition_capacity,
            block_size,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.partition_capacity == 0
    }

    /// Bytes left under the quota given current usage.
    pub fn available(&self, used: usize) -> usize {
        if self.is_unlimited() {
            usize::MAX
        } else {
            self.partition_capacity.saturating_sub(used)
        }
    }

    /// Check whether one more block fits on top of `used`.
    pub fn admit_block(&self, used: usize) -> FsResult<()> {
        if self.is_unlimited() {
            return Ok(());
        }
        match used.checked_add(self.block_size) {
            Some(next) if next <= self.partition_capacity => Ok(()),
            _ => Err(FsError::QuotaExceeded {
                requested: self.block_size,
                available: self.available(used),
            }),
        }
    }
}

/// Growable byte storage for one file.
///
/// `bytes.len()` is the allocated capacity (always a multiple of the block
/// size); `length` is the logical content size.
#[derive(Debug, Default)]
pub struct FileBuffer {
    bytes: Vec<u8>,
    length: usize,
}

impl FileBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocated bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Logical content size.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Logical content.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.length]
    }

    /// Add one block of capacity, reserving it from `region` first.
    pub fn grow_block(&mut self, block_size: usize, region: &dyn MemoryRegion) -> FsResult<()> {
        let out_of_memory = || FsError::OutOfMemory {
            region: region.name().to_string(),
            requested: block_size,
        };

        region.reserve(block_size).map_err(|_| out_of_memory())?;
        if self.bytes.try_reserve_exact(block_size).is_err() {
            region.release(block_size);
            return Err(out_of_memory());
        }

        let capacity = self.bytes.len() + block_size;
        self.bytes.resize(capacity, 0);
        trace!(capacity, "buffer grew");
        Ok(())
    }

    /// Drop capacity back to `capacity`, returning the difference to
    /// `region`. Used to undo growth for a write that could not complete.
    pub fn shrink_to(&mut self, capacity: usize, region: &dyn MemoryRegion) {
        debug_assert!(capacity >= self.length, "shrink below content");
        if capacity < self.bytes.len() {
            region.release(self.bytes.len() - capacity);
            self.bytes.truncate(capacity);
            self.bytes.shrink_to_fit();
            trace!(capacity, "buffer shrank");
        }
    }

    /// Drop all storage and content, returning the bytes to `region`.
    pub fn release(&mut self, region: &dyn MemoryRegion) {
        if !self.bytes.is_empty() {
            region.release(self.bytes.len());
        }
        self.bytes = Vec::new();
        self.length = 0;
    }

    /// Copy `data` in at `offset`. Capacity must already cover the range.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> usize {
        let end = offset + data.len();
        debug_assert!(end <= self.bytes.len(), "write past capacity");
        self.bytes[offset..end].copy_from_slice(data);
        self.length = self.length.max(end);
        data.len()
    }

    /// Copy out up to `buf.len()` bytes from `offset`. Returns 0 at or past
    /// end of file.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        if offset >= self.length {
            return 0;
        }
        let n = buf.len().min(self.length - offset);
        buf[..n].copy_from_slice(&self.bytes[offset..offset + n]);
        n
    }
}

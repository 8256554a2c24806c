//! Memory regions file buffers are drawn from.
//!
//! The host decides which region backs a mount (internal heap, external
//! PSRAM, ...). The engine only asks a region for permission before every
//! buffer growth step and hands bytes back when a buffer is released.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

/// Region refused an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("region {region} cannot provide {requested} bytes ({available} left)")]
pub struct RegionError {
    pub region: String,
    pub requested: usize,
    pub available: usize,
}

/// Allocator backend for file buffers.
pub trait MemoryRegion: Send + Sync + fmt::Debug {
    /// Short name for logs and errors.
    fn name(&self) -> &str;

    /// Bytes still available, or `None` when the region is unbounded.
    fn available(&self) -> Option<usize>;

    /// Account for `bytes` more bytes.
    fn reserve(&self, bytes: usize) -> Result<(), RegionError>;

    /// Return `bytes` previously reserved.
    fn release(&self, bytes: usize);
}

/// Shared region handle.
pub type SharedRegion = Arc<dyn MemoryRegion>;

/// Process heap. Never refuses; real exhaustion is caught by the buffer's
/// fallible reservation instead.
#[derive(Debug, Default)]
pub struct HeapRegion;

impl MemoryRegion for HeapRegion {
    fn name(&self) -> &str {
        "heap"
    }

    fn available(&self) -> Option<usize> {
        None
    }

    fn reserve(&self, _bytes: usize) -> Result<(), RegionError> {
        Ok(())
    }

    fn release(&self, _bytes: usize) {}
}

/// Fixed-size region such as an external RAM chip.
#[derive(Debug)]
pub struct BoundedRegion {
    name: String,
    size: usize,
    used: AtomicUsize,
}

impl BoundedRegion {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            used: AtomicUsize::new(0),
        }
    }

    /// Total region size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes currently reserved.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }
}

impl MemoryRegion for BoundedRegion {
    fn name(&self) -> &str {
        &self.name
    }

    fn available(&self) -> Option<usize> {
        Some(self.size.saturating_sub(self.used()))
    }

    fn reserve(&self, bytes: usize) -> Result<(), RegionError> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|next| *next <= self.size)
            })
            .map(|_| ())
            .map_err(|used| RegionError {
                region: self.name.clone(),
                requested: bytes,
                available: self.size.saturating_sub(used),
            })
    }

    fn release(&self, bytes: usize) {
        // The closure always returns Some, so the update cannot fail.
        let _ = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_sub(bytes))
            });
    }
}

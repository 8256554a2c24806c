//! # xramfs-kernel
//!
//! Capacity-bounded in-memory filesystem for microcontroller boards with
//! expansion RAM.
//!
//! The engine keeps two fixed-size slot tables, one for files and one for
//! directories, and exposes a POSIX-like operation set over them:
//! - File content lives in buffers that grow in whole blocks
//! - A partition quota caps total allocated bytes across every file
//! - Buffers come from a [`MemoryRegion`] (heap or a bounded external region)
//! - Directories keep insertion-ordered entry lists for `readdir`
//!
//! Host integration (flag translation, errno, mount points) lives in the
//! `xramfs-vfs` crate.

pub mod buffer;
pub mod config;
pub mod constants;
pub mod dirs;
pub mod engine;
pub mod error;
pub mod files;
pub mod path;
pub mod region;
pub mod shared;
pub mod stat;
pub mod types;

pub use buffer::{FileBuffer, Quota};
pub use config::{BackendSelector, MountConfig};
pub use dirs::{DirRecord, DirectoryTree, ROOT_SLOT};
pub use engine::Engine;
pub use error::{FsError, FsResult};
pub use files::{FileRecord, FileSlotTable};
pub use region::{BoundedRegion, HeapRegion, MemoryRegion, RegionError, SharedRegion};
pub use shared::{SharedEngine, shared_engine, shared_engine_with_region};
pub use types::{
    DirEntry, DirHandle, FileAttr, FileHandle, FileType, Inode, OpenMode, StatFs,
};

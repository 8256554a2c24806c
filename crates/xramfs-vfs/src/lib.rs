//! # xramfs-vfs
//!
//! Host virtual-filesystem shim for xramfs.
//!
//! Translates descriptor-style calls (`open(2)` flags, integer returns,
//! errno) into engine operations, and routes host paths to mounts by base
//! path.

pub mod errno;
pub mod flags;
pub mod registry;
pub mod shim;

pub use flags::{Access, HostOpenFlags, translate};
pub use registry::{MountInfo, RegistryError, VfsConf, VfsRegistry};
pub use shim::{
    DT_DIR, DT_REG, HostDirent, HostStat, S_IFDIR, S_IFREG, SEEK_CUR, SEEK_END, SEEK_SET, VfsShim,
};

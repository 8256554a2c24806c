//! newlib errno values and the mapping from engine errors.

use xramfs_kernel::FsError;

pub const ENOENT: i32 = 2;
pub const EBADF: i32 = 9;
pub const ENOMEM: i32 = 12;
pub const EACCES: i32 = 13;
pub const EBUSY: i32 = 16;
pub const EEXIST: i32 = 17;
pub const ENOTDIR: i32 = 20;
pub const EISDIR: i32 = 21;
pub const EINVAL: i32 = 22;
pub const ENFILE: i32 = 23;
pub const ENOSPC: i32 = 28;
pub const ENOTEMPTY: i32 = 90;

/// errno a host sees for an engine error.
pub fn from_error(err: &FsError) -> i32 {
    match err {
        FsError::NotFound(_) | FsError::AncestorUnreachable(_) => ENOENT,
        FsError::AlreadyExists(_) | FsError::DestinationExists(_) => EEXIST,
        FsError::NotEmpty(_) => ENOTEMPTY,
        FsError::IsRoot => EBUSY,
        FsError::NotADirectory(_) => ENOTDIR,
        FsError::IsADirectory(_) => EISDIR,
        FsError::CapacityExceeded { .. } => ENFILE,
        FsError::QuotaExceeded { .. } => ENOSPC,
        FsError::OutOfMemory { .. } => ENOMEM,
        FsError::InvalidPath(_) | FsError::InvalidSeek { .. } | FsError::Config(_) => EINVAL,
        FsError::BadHandle(_) => EBADF,
        FsError::NotWritable(_) => EACCES,
    }
}

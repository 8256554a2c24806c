//! Host open flags and their translation into an engine [`OpenMode`].
//!
//! Numeric values follow newlib, which is what the host C library on the
//! target boards uses.

use bitflags::bitflags;
use xramfs_kernel::OpenMode;

bitflags! {
    /// `open(2)` flag bits understood by the shim.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HostOpenFlags: u32 {
        const WRONLY = 0x0001;
        const RDWR   = 0x0002;
        const APPEND = 0x0008;
        const CREAT  = 0x0200;
        const TRUNC  = 0x0400;
        const EXCL   = 0x0800;
    }
}

/// Access-mode field of the flags (`flags & O_ACCMODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    /// Both access bits set.
    Invalid,
}

impl HostOpenFlags {
    /// `O_RDONLY` is the absence of both access bits.
    pub const RDONLY: Self = Self::empty();

    /// Mask of the access-mode field.
    pub const ACCMODE: u32 = 0x0003;

    /// Flags from the raw integer a host passes. Unknown bits are kept.
    pub fn from_raw(raw: i32) -> Self {
        Self::from_bits_retain(raw as u32)
    }

    pub fn access(self) -> Access {
        match self.bits() & Self::ACCMODE {
            0 => Access::ReadOnly,
            1 => Access::WriteOnly,
            2 => Access::ReadWrite,
            _ => Access::Invalid,
        }
    }

    /// `O_CREAT | O_EXCL`: creation must not find an existing path.
    pub fn exclusive_create(self) -> bool {
        self.contains(Self::CREAT | Self::EXCL)
    }
}

/// Map host flags to the single engine mode they mean.
///
/// Read-only access wins over any write-ish bit, append wins over truncate,
/// and an invalid access field opens read-only.
pub fn translate(flags: HostOpenFlags) -> OpenMode {
    match flags.access() {
        Access::ReadOnly | Access::Invalid => OpenMode::Read,
        Access::WriteOnly | Access::ReadWrite => {
            if flags.contains(HostOpenFlags::APPEND) {
                OpenMode::WriteAppend
            } else if flags.contains(HostOpenFlags::TRUNC) {
                OpenMode::WriteTruncate
            } else {
                OpenMode::ReadWrite
            }
        }
    }
}

//! Mount defaults.
//!
//! Two profiles: "ample" when plenty of memory backs the mount, "constrained"
//! otherwise. [`crate::MountConfig::detect`] picks between them.

/// Slots per table on an ample mount.
pub const AMPLE_MAX_ITEMS: usize = 256;

/// Buffer growth increment on an ample mount.
pub const AMPLE_BLOCK_SIZE: usize = 4096;

/// Slots per table on a constrained mount.
pub const CONSTRAINED_MAX_ITEMS: usize = 32;

/// Buffer growth increment on a constrained mount.
pub const CONSTRAINED_BLOCK_SIZE: usize = 512;

/// Available bytes at or above which a region counts as ample (4 MiB).
pub const AMPLE_THRESHOLD_BYTES: usize = 4 * 1024 * 1024;

/// Share of an external region given to the partition when no explicit
/// capacity is configured.
pub const DEFAULT_PARTITION_FRACTION: f64 = 0.5;

/// Region name reported by the external backend.
pub const EXTERNAL_REGION_NAME: &str = "psram";

//! Mount configuration.
//!
//! Applied once at mount time. Every key is optional in TOML:
//!
//! ```toml
//! max_items = 64
//! block_size = 1024
//! partition_capacity_bytes = 102400   # 0 = unlimited
//! backend = "external"                 # "internal" (heap) or "external"
//! region_bytes = 4194304               # size of the external region
//! partition_fraction = 0.5             # used when capacity is 0
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::constants::{
    AMPLE_BLOCK_SIZE, AMPLE_MAX_ITEMS, AMPLE_THRESHOLD_BYTES, CONSTRAINED_BLOCK_SIZE,
    CONSTRAINED_MAX_ITEMS, DEFAULT_PARTITION_FRACTION, EXTERNAL_REGION_NAME,
};
use crate::error::{FsError, FsResult};
use crate::region::{BoundedRegion, HeapRegion, SharedRegion};

/// Which memory region file buffers come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendSelector {
    /// General-purpose heap.
    #[default]
    Internal,
    /// Fixed-size external RAM region.
    External,
}

/// Mount-time configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MountConfig {
    /// Capacity of both slot tables.
    pub max_items: usize,
    /// Buffer growth increment in bytes.
    pub block_size: usize,
    /// Ceiling on total allocated buffer bytes (0 = unlimited).
    pub partition_capacity_bytes: usize,
    /// Region selector.
    pub backend: BackendSelector,
    /// Size of the external region. Required for `backend = "external"`.
    pub region_bytes: Option<usize>,
    /// Derive the partition capacity as this share of the region's free
    /// bytes when `partition_capacity_bytes` is 0.
    pub partition_fraction: Option<f64>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self::ample()
    }
}

impl MountConfig {
    /// Profile for boards with plenty of memory.
    pub fn ample() -> Self {
        Self {
            max_items: AMPLE_MAX_ITEMS,
            block_size: AMPLE_BLOCK_SIZE,
            partition_capacity_bytes: 0,
            backend: BackendSelector::Internal,
            region_bytes: None,
            partition_fraction: None,
        }
    }

    /// Profile for memory-constrained boards.
    pub fn constrained() -> Self {
        Self {
            max_items: CONSTRAINED_MAX_ITEMS,
            block_size: CONSTRAINED_BLOCK_SIZE,
            ..Self::ample()
        }
    }

    /// Pick a profile from the bytes a region reports as available.
    /// Unbounded regions count as ample.
    pub fn detect(available: Option<usize>) -> Self {
        match available {
            Some(bytes) if bytes < AMPLE_THRESHOLD_BYTES => Self::constrained(),
            _ => Self::ample(),
        }
    }

    /// External region of `region_bytes`, half of it given to the partition.
    pub fn external(region_bytes: usize) -> Self {
        Self {
            backend: BackendSelector::External,
            region_bytes: Some(region_bytes),
            partition_fraction: Some(DEFAULT_PARTITION_FRACTION),
            ..Self::detect(Some(region_bytes))
        }
    }

    /// Set the partition capacity.
    pub fn with_partition_capacity(mut self, bytes: usize) -> Self {
        self.partition_capacity_bytes = bytes;
        self
    }

    /// Set the growth block size.
    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    /// Set the slot count of both tables.
    pub fn with_max_items(mut self, items: usize) -> Self {
        self.max_items = items;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> FsResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| FsError::config(format!("parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FsError::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Reject configurations the engine cannot mount.
    pub fn validate(&self) -> FsResult<()> {
        if self.max_items == 0 {
            return Err(FsError::config("max_items must be at least 1"));
        }
        if self.block_size == 0 {
            return Err(FsError::config("block_size must be nonzero"));
        }
        if let Some(fraction) = self.partition_fraction {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(FsError::config(format!(
                    "partition_fraction must be in (0, 1], got {fraction}"
                )));
            }
        }
        if self.backend == BackendSelector::External && self.region_bytes.is_none() {
            return Err(FsError::config("backend = \"external\" requires region_bytes"));
        }
        Ok(())
    }

    /// Build the region selected by `backend`.
    pub fn build_region(&self) -> SharedRegion {
        match (self.backend, self.region_bytes) {
            (BackendSelector::External, Some(bytes)) => {
                Arc::new(BoundedRegion::new(EXTERNAL_REGION_NAME, bytes))
            }
            _ => Arc::new(HeapRegion),
        }
    }

    /// Effective partition capacity for a region. A fraction of a tiny
    /// region still yields one block, never the unlimited 0.
    pub fn partition_capacity(&self, region: &SharedRegion) -> usize {
        if self.partition_capacity_bytes > 0 {
            return self.partition_capacity_bytes;
        }
        match (self.partition_fraction, region.available()) {
            (Some(fraction), Some(available)) => {
                ((available as f64 * fraction) as usize).max(self.block_size)
            }
            _ => 0,
        }
    }
}

//! Engine shared across threads.
//!
//! Every operation takes `&mut Engine`, so sharing is one mutex around the
//! whole mount. Callers lock per operation and never hold the guard across
//! unrelated work.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::MountConfig;
use crate::engine::Engine;
use crate::error::FsResult;
use crate::region::SharedRegion;

/// Thread-safe handle to a mounted engine.
pub type SharedEngine = Arc<Mutex<Engine>>;

/// Mount and wrap for sharing.
pub fn shared_engine(config: MountConfig) -> FsResult<SharedEngine> {
    Ok(Arc::new(Mutex::new(Engine::mount(config)?)))
}

/// Mount on a host-supplied region and wrap for sharing.
pub fn shared_engine_with_region(
    config: MountConfig,
    region: SharedRegion,
) -> FsResult<SharedEngine> {
    Ok(Arc::new(Mutex::new(Engine::mount_with_region(config, region)?)))
}

//! Base-path registration with longest-prefix routing.
//!
//! A host registers each mount under a base path such as `/psram`. Host
//! paths are matched against every base path; the longest match wins and
//! the remainder (always starting with `/`) is what the shim sees.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};
use xramfs_kernel::{FsError, MountConfig, SharedEngine, shared_engine};

use crate::shim::VfsShim;

/// Registration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsConf {
    /// Prefix the mount is reachable under, e.g. `/psram`.
    pub base_path: String,
    /// Optional label for logs and lookup.
    pub partition_label: Option<String>,
    /// Format a degraded engine instead of refusing to register it.
    pub format_if_mount_failed: bool,
}

impl VfsConf {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            partition_label: None,
            format_if_mount_failed: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.partition_label = Some(label.into());
        self
    }

    pub fn format_if_mount_failed(mut self, yes: bool) -> Self {
        self.format_if_mount_failed = yes;
        self
    }
}

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("base path already registered: {0}")]
    AlreadyRegistered(String),

    #[error("base path not registered: {0}")]
    NotRegistered(String),

    #[error("invalid base path: {0:?}")]
    InvalidBasePath(String),

    #[error("no mount point for path: {0}")]
    NoMountPoint(String),

    #[error("mount at {0} is degraded")]
    Degraded(String),

    #[error(transparent)]
    Mount(#[from] FsError),
}

/// Summary of one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub base_path: String,
    pub partition_label: Option<String>,
}

#[derive(Debug)]
struct Registration {
    conf: VfsConf,
    shim: Arc<VfsShim>,
}

/// Registered mounts, keyed by normalized base path.
#[derive(Debug, Default)]
pub struct VfsRegistry {
    mounts: RwLock<BTreeMap<String, Registration>>,
}

impl VfsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip a trailing `/` and require an absolute, non-root base path.
    fn normalize_base_path(path: &str) -> Result<String, RegistryError> {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() || !trimmed.starts_with('/') || trimmed.contains('\0') {
            return Err(RegistryError::InvalidBasePath(path.to_string()));
        }
        Ok(trimmed.to_string())
    }

    /// Mount a fresh engine from `config` and register it.
    pub fn register(
        &self,
        conf: VfsConf,
        config: MountConfig,
    ) -> Result<Arc<VfsShim>, RegistryError> {
        let engine = shared_engine(config)?;
        self.register_engine(conf, engine)
    }

    /// Register an existing engine, e.g. one kept across an unregister.
    ///
    /// A degraded engine is refused unless `format_if_mount_failed` is set,
    /// in which case it is formatted first.
    pub fn register_engine(
        &self,
        conf: VfsConf,
        engine: SharedEngine,
    ) -> Result<Arc<VfsShim>, RegistryError> {
        let base = Self::normalize_base_path(&conf.base_path)?;
        let mut mounts = self.mounts.write();
        if mounts.contains_key(&base) {
            return Err(RegistryError::AlreadyRegistered(base));
        }

        {
            let mut fs = engine.lock();
            if fs.is_degraded() {
                if !conf.format_if_mount_failed {
                    warn!(base_path = %base, "refusing degraded mount");
                    return Err(RegistryError::Degraded(base));
                }
                warn!(base_path = %base, "degraded mount, formatting");
                fs.format()?;
            }
        }

        let shim = Arc::new(VfsShim::new(engine));
        info!(base_path = %base, label = ?conf.partition_label, "registered");
        mounts.insert(
            base.clone(),
            Registration {
                conf: VfsConf {
                    base_path: base,
                    ..conf
                },
                shim: Arc::clone(&shim),
            },
        );
        Ok(shim)
    }

    /// Remove a registration, handing back its engine.
    pub fn unregister(&self, base_path: &str) -> Result<SharedEngine, RegistryError> {
        let base = Self::normalize_base_path(base_path)?;
        let reg = self
            .mounts
            .write()
            .remove(&base)
            .ok_or(RegistryError::NotRegistered(base.clone()))?;
        info!(base_path = %base, "unregistered");
        Ok(Arc::clone(reg.shim.engine()))
    }

    /// Format the mount registered at `base_path`.
    pub fn format(&self, base_path: &str) -> Result<(), RegistryError> {
        let shim = self.get(base_path)?;
        shim.engine().lock().format()?;
        Ok(())
    }

    /// Shim registered at exactly `base_path`.
    pub fn get(&self, base_path: &str) -> Result<Arc<VfsShim>, RegistryError> {
        let base = Self::normalize_base_path(base_path)?;
        self.mounts
            .read()
            .get(&base)
            .map(|reg| Arc::clone(&reg.shim))
            .ok_or(RegistryError::NotRegistered(base))
    }

    /// Shim registered with `label`.
    pub fn find_by_label(&self, label: &str) -> Option<Arc<VfsShim>> {
        self.mounts
            .read()
            .values()
            .find(|reg| reg.conf.partition_label.as_deref() == Some(label))
            .map(|reg| Arc::clone(&reg.shim))
    }

    pub fn list(&self) -> Vec<MountInfo> {
        self.mounts
            .read()
            .values()
            .map(|reg| MountInfo {
                base_path: reg.conf.base_path.clone(),
                partition_label: reg.conf.partition_label.clone(),
            })
            .collect()
    }

    /// Route a host path to its shim and the path within the mount.
    pub fn resolve(&self, host_path: &str) -> Result<(Arc<VfsShim>, String), RegistryError> {
        let mounts = self.mounts.read();

        let best = mounts
            .iter()
            .filter(|(base, _)| {
                host_path == base.as_str()
                    || host_path
                        .strip_prefix(base.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(base, _)| base.len());

        match best {
            Some((base, reg)) => {
                let rest = &host_path[base.len()..];
                let inner = if rest.is_empty() { "/" } else { rest };
                Ok((Arc::clone(&reg.shim), inner.to_string()))
            }
            None => Err(RegistryError::NoMountPoint(host_path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xramfs_kernel::OpenMode;

    fn small() -> MountConfig {
        MountConfig::constrained()
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = VfsRegistry::new();
        registry.register(VfsConf::new("/psram"), small()).unwrap();

        let (_, inner) = registry.resolve("/psram/logs/a.txt").unwrap();
        assert_eq!(inner, "/logs/a.txt");
        let (_, inner) = registry.resolve("/psram").unwrap();
        assert_eq!(inner, "/");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = VfsRegistry::new();
        let outer = registry.register(VfsConf::new("/mnt"), small()).unwrap();
        let inner = registry.register(VfsConf::new("/mnt/ram"), small()).unwrap();

        let (shim, path) = registry.resolve("/mnt/ram/x").unwrap();
        assert!(Arc::ptr_eq(&shim, &inner));
        assert_eq!(path, "/x");

        let (shim, path) = registry.resolve("/mnt/rammer").unwrap();
        assert!(Arc::ptr_eq(&shim, &outer));
        assert_eq!(path, "/rammer");
    }

    #[test]
    fn test_no_mount_point() {
        let registry = VfsRegistry::new();
        registry.register(VfsConf::new("/psram"), small()).unwrap();
        assert!(matches!(
            registry.resolve("/psramx/file"),
            Err(RegistryError::NoMountPoint(_))
        ));
        assert!(matches!(
            registry.resolve("/sdcard"),
            Err(RegistryError::NoMountPoint(_))
        ));
    }

    #[test]
    fn test_duplicate_and_invalid() {
        let registry = VfsRegistry::new();
        registry.register(VfsConf::new("/psram/"), small()).unwrap();
        assert!(matches!(
            registry.register(VfsConf::new("/psram"), small()),
            Err(RegistryError::AlreadyRegistered(_))
        ));
        assert!(matches!(
            registry.register(VfsConf::new("/"), small()),
            Err(RegistryError::InvalidBasePath(_))
        ));
        assert!(matches!(
            registry.register(VfsConf::new("psram2"), small()),
            Err(RegistryError::InvalidBasePath(_))
        ));
        assert!(matches!(
            registry.register(VfsConf::new("/bad"), small().with_block_size(0)),
            Err(RegistryError::Mount(FsError::Config(_)))
        ));
    }

    #[test]
    fn test_unregister_keeps_engine() {
        let registry = VfsRegistry::new();
        let shim = registry
            .register(VfsConf::new("/psram").with_label("ext"), small())
            .unwrap();
        shim.engine().lock().write_all("/keep", b"data").unwrap();
        assert!(registry.find_by_label("ext").is_some());

        let engine = registry.unregister("/psram").unwrap();
        assert!(registry.list().is_empty());
        assert!(matches!(
            registry.unregister("/psram"),
            Err(RegistryError::NotRegistered(_))
        ));

        registry.register_engine(VfsConf::new("/again"), engine).unwrap();
        let (shim, path) = registry.resolve("/again/keep").unwrap();
        assert_eq!(shim.engine().lock().read_all(&path).unwrap(), b"data");
    }

    #[test]
    fn test_degraded_engine() {
        let engine = shared_engine(small().with_max_items(1)).unwrap();
        assert!(engine.lock().open("/a", OpenMode::WriteTruncate).is_ok());
        assert!(engine.lock().open("/b", OpenMode::WriteTruncate).is_err());
        assert!(engine.lock().is_degraded());

        let registry = VfsRegistry::new();
        assert!(matches!(
            registry.register_engine(VfsConf::new("/x"), engine.clone()),
            Err(RegistryError::Degraded(_))
        ));

        registry
            .register_engine(VfsConf::new("/x").format_if_mount_failed(true), engine.clone())
            .unwrap();
        let fs = engine.lock();
        assert!(!fs.is_degraded());
        assert_eq!(fs.statfs().files, 0);
    }

    #[test]
    fn test_format_by_base_path() {
        let registry = VfsRegistry::new();
        let shim = registry.register(VfsConf::new("/psram"), small()).unwrap();
        shim.engine().lock().write_all("/a/b", b"x").unwrap();

        registry.format("/psram").unwrap();
        assert_eq!(shim.engine().lock().statfs().files, 0);
        assert!(matches!(
            registry.format("/none"),
            Err(RegistryError::NotRegistered(_))
        ));
    }
}

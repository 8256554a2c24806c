//! The POSIX-like operation set.
//!
//! [`Engine`] owns both slot tables and the quota, and is the only place
//! that touches them together. File handles are file slots; a slot goes
//! Unopened → Open(mode) → Closed, and I/O through a slot that is not open
//! fails with [`FsError::BadHandle`].

use std::io::SeekFrom;

use tracing::{debug, error, info, warn};

use crate::buffer::Quota;
use crate::config::MountConfig;
use crate::dirs::DirectoryTree;
use crate::error::{FsError, FsResult};
use crate::files::{FileRecord, FileSlotTable};
use crate::path;
use crate::region::SharedRegion;
use crate::stat;
use crate::types::{DirEntry, DirHandle, FileAttr, FileHandle, Inode, OpenMode, StatFs};

/// A mounted in-memory filesystem.
#[derive(Debug)]
pub struct Engine {
    config: MountConfig,
    files: FileSlotTable,
    tree: DirectoryTree,
    degraded: bool,
}

impl Engine {
    /// Mount with the region selected by `config.backend`.
    pub fn mount(config: MountConfig) -> FsResult<Self> {
        let region = config.build_region();
        Self::mount_with_region(config, region)
    }

    /// Mount on a host-supplied region.
    pub fn mount_with_region(config: MountConfig, region: SharedRegion) -> FsResult<Self> {
        config.validate()?;
        let partition = config.partition_capacity(&region);
        let quota = Quota::new(partition, config.block_size);
        info!(
            region = region.name(),
            max_items = config.max_items,
            block_size = config.block_size,
            partition,
            "mounting"
        );
        Ok(Self {
            files: FileSlotTable::with_quota(config.max_items, quota, region),
            tree: DirectoryTree::new(config.max_items),
            config,
            degraded: false,
        })
    }

    /// Tear down the mount, releasing every buffer.
    pub fn unmount(self) {
        info!(files = self.files.count(), "unmounting");
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    pub fn files(&self) -> &FileSlotTable {
        &self.files
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    /// Set once a slot table ran out; cleared by [`Engine::format`].
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn note_fault<T>(&mut self, result: FsResult<T>) -> FsResult<T> {
        if let Err(e) = &result {
            if e.is_fatal() && !self.degraded {
                error!(error = %e, "slot table exhausted, mount degraded");
                self.degraded = true;
            }
        }
        result
    }

    fn open_record(&self, handle: FileHandle) -> FsResult<(&FileRecord, OpenMode)> {
        let record = self
            .files
            .get(handle.0)
            .ok_or(FsError::BadHandle(handle.0))?;
        let mode = record.open_mode().ok_or(FsError::BadHandle(handle.0))?;
        Ok((record, mode))
    }

    fn live_dir(&self, handle: DirHandle) -> FsResult<usize> {
        self.tree
            .get(handle.0)
            .map(|_| handle.0)
            .ok_or(FsError::BadHandle(handle.0))
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Open (and possibly create) a file.
    pub fn open(&mut self, path: &str, mode: OpenMode) -> FsResult<FileHandle> {
        let path = path::normalize(path)?;

        if let Some(slot) = self.files.find(&path) {
            match mode {
                OpenMode::Read | OpenMode::ReadWrite => self.files.set_cursor(slot, 0)?,
                OpenMode::WriteTruncate => self.files.truncate(slot)?,
                OpenMode::WriteAppend => {
                    let len = self.files.get(slot).map(FileRecord::len).unwrap_or(0);
                    self.files.set_cursor(slot, len)?;
                }
            }
            self.files.set_open(slot, Some(mode))?;
            debug!(slot, path, %mode, "opened existing file");
            return Ok(FileHandle(slot));
        }

        if self.tree.find(&path).is_some() {
            return Err(FsError::is_a_directory(path));
        }
        if !mode.creates() {
            return Err(FsError::not_found(path));
        }

        let parent = self.tree.mkpath(&path, &self.files);
        let parent = self.note_fault(parent)?;
        let slot = self.files.allocate(&path, parent);
        let slot = self.note_fault(slot)?;
        self.tree
            .add_entry(parent, DirEntry::new(Inode::File(slot), path::basename(&path)))?;
        self.files.set_open(slot, Some(mode))?;
        debug!(slot, path, %mode, "created file");
        Ok(FileHandle(slot))
    }

    /// Read from the cursor. Returns 0 at end of file.
    pub fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> FsResult<usize> {
        self.open_record(handle)?;
        self.files.read(handle.0, buf)
    }

    /// Write at the cursor (at end of file in append mode). A quota
    /// refusal fails the whole write and leaves the content untouched.
    pub fn write(&mut self, handle: FileHandle, data: &[u8]) -> FsResult<usize> {
        let (record, mode) = self.open_record(handle)?;
        if !mode.writable() {
            return Err(FsError::NotWritable(handle.0));
        }
        if mode == OpenMode::WriteAppend {
            let len = record.len();
            self.files.set_cursor(handle.0, len)?;
        }
        self.files.write(handle.0, data)
    }

    /// Move the cursor. Targets outside `[0, length]` are rejected and the
    /// cursor is left where it was.
    pub fn seek(&mut self, handle: FileHandle, pos: SeekFrom) -> FsResult<usize> {
        let (record, _) = self.open_record(handle)?;
        let length = record.len();
        let len = length as i64;
        let target = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).ok(),
            SeekFrom::Current(delta) => (record.cursor() as i64).checked_add(delta),
            SeekFrom::End(delta) => len.checked_add(delta),
        }
        .unwrap_or(i64::MAX);

        if !(0..=len).contains(&target) {
            warn!(slot = handle.0, target, length, "seek rejected");
            return Err(FsError::InvalidSeek { target, length });
        }
        let cursor = target as usize;
        self.files.set_cursor(handle.0, cursor)?;
        Ok(cursor)
    }

    /// Current cursor.
    pub fn tell(&self, handle: FileHandle) -> FsResult<usize> {
        let (record, _) = self.open_record(handle)?;
        Ok(record.cursor())
    }

    /// Content is memory resident; nothing to flush.
    pub fn flush(&self, handle: FileHandle) -> FsResult<()> {
        self.open_record(handle).map(|_| ())
    }

    /// Close a handle. The cursor resets; content stays until unlink.
    pub fn close(&mut self, handle: FileHandle) -> FsResult<()> {
        self.open_record(handle)?;
        self.files.set_cursor(handle.0, 0)?;
        self.files.set_open(handle.0, None)
    }

    /// Stat through an open handle.
    pub fn fstat(&self, handle: FileHandle) -> FsResult<FileAttr> {
        self.open_record(handle)?;
        stat::attr_of(&self.files, &self.tree, Inode::File(handle.0))
    }

    /// Remove a file, its storage and its directory entry.
    #[tracing::instrument(skip(self), name = "xramfs.unlink")]
    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        let path = path::normalize(path)?;
        let Some(slot) = self.files.find(&path) else {
            if self.tree.find(&path).is_some() {
                return Err(FsError::is_a_directory(path));
            }
            warn!(path, "unlink: no such file");
            return Err(FsError::not_found(path));
        };
        self.files.release(slot, &mut self.tree)?;
        debug!(slot, path, "unlinked");
        Ok(())
    }

    /// Rename a file or directory.
    ///
    /// A file only has its stored path rewritten; it stays listed in the
    /// directory it was created in, under the name it was created with. A
    /// directory keeps its slot, parent and children, its parent's entry
    /// takes the new name, and everything below it moves with it.
    #[tracing::instrument(skip(self), name = "xramfs.rename")]
    pub fn rename(&mut self, from: &str, to: &str) -> FsResult<()> {
        let from = path::normalize(from)?;
        let to = path::normalize(to)?;

        if stat::resolve(&self.files, &self.tree, &to).is_some() {
            return Err(FsError::destination_exists(to));
        }
        if let Some(slot) = self.files.find(&from) {
            self.files.set_path(slot, &to)?;
            debug!(slot, from, to, "file renamed");
            return Ok(());
        }
        if self.tree.find(&from).is_some() {
            return self.tree.rename_dir(&from, &to, &mut self.files);
        }
        if path::is_root(&from) {
            return Err(FsError::IsRoot);
        }
        Err(FsError::not_found(from))
    }

    // ========================================================================
    // Directories
    // ========================================================================

    /// Create one directory; its parent must exist. Idempotent.
    pub fn mkdir(&mut self, path: &str) -> FsResult<usize> {
        let path = path::normalize(path)?;
        let slot = self.tree.mkdir(&path, &self.files);
        self.note_fault(slot)
    }

    /// Create a directory and every missing ancestor.
    pub fn mkdir_all(&mut self, path: &str) -> FsResult<usize> {
        let path = path::normalize(path)?;
        let parent = self.tree.mkpath(&path, &self.files);
        self.note_fault(parent)?;
        let slot = self.tree.mkdir(&path, &self.files);
        self.note_fault(slot)
    }

    /// Remove an empty directory.
    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        let path = path::normalize(path)?;
        self.tree.rmdir(&path, &self.files)
    }

    /// Open a directory for iteration from its first entry.
    pub fn opendir(&mut self, path: &str) -> FsResult<DirHandle> {
        let path = path::normalize(path)?;
        if self.files.find(&path).is_some() {
            return Err(FsError::not_a_directory(path));
        }
        let slot = self.tree.find(&path).ok_or_else(|| FsError::not_found(&path))?;
        self.tree.rewind(slot)?;
        Ok(DirHandle(slot))
    }

    /// Next entry, or `None` when the listing is exhausted.
    pub fn readdir(&mut self, dir: DirHandle) -> FsResult<Option<DirEntry>> {
        let slot = self.live_dir(dir)?;
        self.tree.next_entry(slot)
    }

    /// Restart iteration.
    pub fn rewinddir(&mut self, dir: DirHandle) -> FsResult<()> {
        let slot = self.live_dir(dir)?;
        self.tree.rewind(slot)
    }

    /// End iteration.
    pub fn closedir(&mut self, dir: DirHandle) -> FsResult<()> {
        let slot = self.live_dir(dir)?;
        self.tree.rewind(slot)
    }

    /// Snapshot of a directory's entries, leaving its read cursor alone.
    pub fn list_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let path = path::normalize(path)?;
        if self.files.find(&path).is_some() {
            return Err(FsError::not_a_directory(path));
        }
        let slot = self.tree.find(&path).ok_or_else(|| FsError::not_found(&path))?;
        Ok(self
            .tree
            .get(slot)
            .map(|r| r.entries().to_vec())
            .unwrap_or_default())
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Resolve a path: file table first, then directories.
    pub fn stat(&self, path: &str) -> FsResult<FileAttr> {
        let path = path::normalize(path)?;
        stat::stat(&self.files, &self.tree, &path)
    }

    /// Returns true if the path names a file or directory.
    pub fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    /// Filesystem usage.
    pub fn statfs(&self) -> StatFs {
        let quota = self.files.quota();
        let used_bytes = self.files.used_bytes();
        StatFs {
            total_bytes: quota.partition_capacity,
            used_bytes,
            free_bytes: quota.available(used_bytes),
            block_size: quota.block_size,
            max_items: self.files.max_items(),
            files: self.files.count(),
            dirs: self.tree.count(),
            degraded: self.degraded,
        }
    }

    /// Drop every file and every directory except the root.
    #[tracing::instrument(skip(self), name = "xramfs.format")]
    pub fn format(&mut self) -> FsResult<()> {
        self.files.clear(&mut self.tree)?;
        self.tree.clear();
        self.degraded = false;
        info!("formatted");
        Ok(())
    }

    // ========================================================================
    // Convenience
    // ========================================================================

    /// Whole content of a file, without touching its cursor.
    pub fn read_all(&self, path: &str) -> FsResult<Vec<u8>> {
        let path = path::normalize(path)?;
        match stat::resolve(&self.files, &self.tree, &path) {
            Some(Inode::File(slot)) => Ok(self
                .files
                .get(slot)
                .map(|r| r.contents().to_vec())
                .unwrap_or_default()),
            Some(Inode::Dir(_)) => Err(FsError::is_a_directory(path)),
            None => Err(FsError::not_found(path)),
        }
    }

    /// Create or truncate a file, write `data`, close it.
    pub fn write_all(&mut self, path: &str, data: &[u8]) -> FsResult<()> {
        let handle = self.open(path, OpenMode::WriteTruncate)?;
        let written = self.write(handle, data);
        self.close(handle)?;
        written.map(|_| ())
    }
}

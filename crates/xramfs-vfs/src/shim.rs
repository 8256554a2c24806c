//! Descriptor-level operations in the shape a host C library expects.
//!
//! Every call returns an integer (or `Option` for `readdir`); failures
//! return `-1` and leave an errno readable through [`VfsShim::errno`].
//! Paths are relative to the shim's base path, i.e. already stripped by
//! the registry, and start with `/`.

use std::io::SeekFrom;

use parking_lot::Mutex;
use tracing::debug;
use xramfs_kernel::{
    DirEntry, DirHandle, FileAttr, FileHandle, FileType, FsError, FsResult, SharedEngine,
};

use crate::errno;
use crate::flags::{self, HostOpenFlags};

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;

pub const DT_REG: u8 = 1;
pub const DT_DIR: u8 = 2;

/// Unit of `st_blocks`.
const STAT_BLOCK: usize = 512;

/// `struct stat` fields the shim fills in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostStat {
    pub st_ino: u32,
    pub st_mode: u32,
    pub st_size: i64,
    pub st_blksize: i32,
    pub st_blocks: i32,
}

impl HostStat {
    pub fn is_dir(&self) -> bool {
        self.st_mode & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.st_mode & S_IFMT == S_IFREG
    }
}

impl From<&FileAttr> for HostStat {
    fn from(attr: &FileAttr) -> Self {
        let kind = match attr.kind() {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
        };
        Self {
            st_ino: attr.inode.slot() as u32,
            st_mode: kind | 0o777,
            st_size: attr.size as i64,
            st_blksize: attr.block_size as i32,
            st_blocks: attr.capacity.div_ceil(STAT_BLOCK) as i32,
        }
    }
}

/// `struct dirent` fields the shim fills in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDirent {
    pub d_ino: u32,
    pub d_type: u8,
    pub d_name: String,
}

impl From<DirEntry> for HostDirent {
    fn from(entry: DirEntry) -> Self {
        let d_type = match entry.kind() {
            FileType::File => DT_REG,
            FileType::Directory => DT_DIR,
        };
        Self {
            d_ino: entry.inode.slot() as u32,
            d_type,
            d_name: entry.name,
        }
    }
}

/// One mounted engine seen through descriptor calls.
#[derive(Debug)]
pub struct VfsShim {
    engine: SharedEngine,
    errno: Mutex<i32>,
}

impl VfsShim {
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            errno: Mutex::new(0),
        }
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// errno left by the last failing call.
    pub fn errno(&self) -> i32 {
        *self.errno.lock()
    }

    fn set_errno(&self, value: i32) {
        *self.errno.lock() = value;
    }

    fn check<T>(&self, op: &str, result: FsResult<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                let value = errno::from_error(&e);
                debug!(op, errno = value, error = %e, "host call failed");
                self.set_errno(value);
                None
            }
        }
    }

    fn status(&self, op: &str, result: FsResult<()>) -> i32 {
        self.check(op, result).map_or(-1, |()| 0)
    }

    fn handle(&self, fd: i32) -> FsResult<FileHandle> {
        usize::try_from(fd)
            .map(FileHandle)
            .map_err(|_| FsError::BadHandle(usize::MAX))
    }

    fn dir_handle(&self, dd: i32) -> FsResult<DirHandle> {
        usize::try_from(dd)
            .map(DirHandle)
            .map_err(|_| FsError::BadHandle(usize::MAX))
    }

    /// `open(2)`. Returns a descriptor or -1. The permission argument is
    /// accepted and ignored.
    pub fn open(&self, path: &str, flags: i32, _mode: i32) -> i32 {
        let flags = HostOpenFlags::from_raw(flags);
        let mode = flags::translate(flags);
        let result = {
            let mut engine = self.engine.lock();
            if flags.exclusive_create() && engine.exists(path) {
                Err(FsError::already_exists(path))
            } else {
                engine.open(path, mode)
            }
        };
        self.check("open", result)
            .map_or(-1, |FileHandle(slot)| slot as i32)
    }

    /// `read(2)`. Returns bytes read, 0 at end of file, or -1.
    pub fn read(&self, fd: i32, buf: &mut [u8]) -> isize {
        let result = self
            .handle(fd)
            .and_then(|h| self.engine.lock().read(h, buf));
        self.check("read", result).map_or(-1, |n| n as isize)
    }

    /// `write(2)`. Returns bytes written or -1; a refused write stores
    /// nothing.
    pub fn write(&self, fd: i32, data: &[u8]) -> isize {
        let result = self
            .handle(fd)
            .and_then(|h| self.engine.lock().write(h, data));
        self.check("write", result).map_or(-1, |n| n as isize)
    }

    /// `lseek(2)`. Returns the new offset or -1.
    pub fn lseek(&self, fd: i32, offset: i64, whence: i32) -> i64 {
        let pos = match whence {
            SEEK_SET => match u64::try_from(offset) {
                Ok(start) => Ok(SeekFrom::Start(start)),
                Err(_) => Err(FsError::InvalidSeek {
                    target: offset,
                    length: 0,
                }),
            },
            SEEK_CUR => Ok(SeekFrom::Current(offset)),
            SEEK_END => Ok(SeekFrom::End(offset)),
            _ => Err(FsError::InvalidSeek {
                target: offset,
                length: 0,
            }),
        };
        let result = pos.and_then(|pos| {
            let h = self.handle(fd)?;
            self.engine.lock().seek(h, pos)
        });
        self.check("lseek", result).map_or(-1, |n| n as i64)
    }

    pub fn close(&self, fd: i32) -> i32 {
        let result = self.handle(fd).and_then(|h| self.engine.lock().close(h));
        self.status("close", result)
    }

    pub fn fsync(&self, fd: i32) -> i32 {
        let result = self.handle(fd).and_then(|h| self.engine.lock().flush(h));
        self.status("fsync", result)
    }

    pub fn fstat(&self, fd: i32, st: &mut HostStat) -> i32 {
        let result = self.handle(fd).and_then(|h| self.engine.lock().fstat(h));
        match self.check("fstat", result) {
            Some(attr) => {
                *st = HostStat::from(&attr);
                0
            }
            None => -1,
        }
    }

    pub fn stat(&self, path: &str, st: &mut HostStat) -> i32 {
        let result = self.engine.lock().stat(path);
        match self.check("stat", result) {
            Some(attr) => {
                *st = HostStat::from(&attr);
                0
            }
            None => -1,
        }
    }

    pub fn unlink(&self, path: &str) -> i32 {
        let result = self.engine.lock().unlink(path);
        self.status("unlink", result)
    }

    pub fn rename(&self, from: &str, to: &str) -> i32 {
        let result = self.engine.lock().rename(from, to);
        self.status("rename", result)
    }

    pub fn mkdir(&self, path: &str, _mode: u32) -> i32 {
        let result = self.engine.lock().mkdir(path).map(|_| ());
        self.status("mkdir", result)
    }

    pub fn rmdir(&self, path: &str) -> i32 {
        let result = self.engine.lock().rmdir(path);
        self.status("rmdir", result)
    }

    /// `opendir(3)`. Returns a directory descriptor or -1.
    pub fn opendir(&self, path: &str) -> i32 {
        let result = self.engine.lock().opendir(path);
        self.check("opendir", result)
            .map_or(-1, |DirHandle(slot)| slot as i32)
    }

    /// `readdir(3)`. `None` at the end of the listing (errno untouched) or
    /// on error (errno set).
    pub fn readdir(&self, dd: i32) -> Option<HostDirent> {
        let result = self
            .dir_handle(dd)
            .and_then(|d| self.engine.lock().readdir(d));
        self.check("readdir", result)
            .flatten()
            .map(HostDirent::from)
    }

    pub fn rewinddir(&self, dd: i32) {
        let result = self
            .dir_handle(dd)
            .and_then(|d| self.engine.lock().rewinddir(d));
        self.check("rewinddir", result);
    }

    pub fn closedir(&self, dd: i32) -> i32 {
        let result = self
            .dir_handle(dd)
            .and_then(|d| self.engine.lock().closedir(d));
        self.status("closedir", result)
    }
}

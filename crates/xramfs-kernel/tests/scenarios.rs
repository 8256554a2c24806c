//! End-to-end scenarios against a mounted engine.
//!
//! # Tiers
//!
//! - **Tier 0:** path-level behavior: auto-created ancestors, round trips, unlink
//! - **Tier 1:** structural checks run after mixed workloads: unique paths,
//!   entry lists that agree with both slot tables, quota never exceeded
//! - **Tier 2:** rename, which treats files and directories differently;
//!   a directory carries its whole subtree along
//! - **Tier 3:** external region accounting and TOML-configured mounts

use std::collections::HashSet;
use std::io::{SeekFrom, Write};

use xramfs_kernel::{
    BoundedRegion, DirEntry, Engine, FileType, FsError, Inode, MountConfig, OpenMode,
    ROOT_SLOT,
};

// ============================================================================
// Shared helpers
// ============================================================================

fn mount() -> Engine {
    Engine::mount(MountConfig::ample()).unwrap()
}

fn names(fs: &Engine, dir: &str) -> Vec<String> {
    fs.list_dir(dir)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect()
}

fn readdir_all(fs: &mut Engine, dir: &str) -> Vec<DirEntry> {
    let handle = fs.opendir(dir).unwrap();
    let mut out = Vec::new();
    while let Some(entry) = fs.readdir(handle).unwrap() {
        out.push(entry);
    }
    fs.closedir(handle).unwrap();
    out
}

/// Every live record appears exactly once in its parent's entry list, and
/// every entry points at a live record of the kind it claims.
fn assert_consistent(fs: &Engine) {
    let files = fs.files();
    let tree = fs.tree();

    for record in files.iter() {
        let parent = tree.get(record.parent_dir()).expect("file parent is live");
        let hits = parent
            .entries()
            .iter()
            .filter(|e| e.inode == Inode::File(record.slot()))
            .count();
        assert_eq!(hits, 1, "file {:?} listed {hits} times", record.path());
    }

    for record in tree.iter() {
        if record.slot() == ROOT_SLOT {
            assert_eq!(record.parent(), None);
            continue;
        }
        let parent = tree.get(record.parent().expect("non-root has parent")).unwrap();
        let hits = parent
            .entries()
            .iter()
            .filter(|e| e.inode == Inode::Dir(record.slot()))
            .count();
        assert_eq!(hits, 1, "dir {:?} listed {hits} times", record.path());

        for entry in record.entries() {
            match entry.inode {
                Inode::File(slot) => assert!(files.get(slot).is_some()),
                Inode::Dir(slot) => assert!(tree.get(slot).is_some()),
            }
        }
    }
}

fn assert_unique_paths(fs: &Engine) {
    let mut seen = HashSet::new();
    for path in fs
        .files()
        .iter()
        .filter_map(|r| r.path())
        .chain(fs.tree().iter().filter_map(|r| r.path()))
    {
        assert!(seen.insert(path.to_string()), "duplicate live path {path}");
    }
}

// ============================================================================
// Tier 0: path-level behavior
// ============================================================================

#[test]
fn open_creates_missing_ancestors() {
    let mut fs = mount();
    let h = fs.open("/a/b/c.txt", OpenMode::WriteTruncate).unwrap();
    fs.close(h).unwrap();

    assert_eq!(fs.stat("/a").unwrap().kind(), FileType::Directory);
    assert_eq!(fs.stat("/a/b").unwrap().kind(), FileType::Directory);
    assert_eq!(fs.stat("/a/b/c.txt").unwrap().kind(), FileType::File);
    assert_eq!(names(&fs, "/"), vec!["a"]);
    assert_eq!(names(&fs, "/a"), vec!["b"]);
    assert_eq!(names(&fs, "/a/b"), vec!["c.txt"]);
    assert_consistent(&fs);
}

#[test]
fn written_bytes_read_back_exactly() {
    let mut fs = mount();
    let msg = b"Hello, World!\n";

    let h = fs.open("/hello.txt", OpenMode::WriteTruncate).unwrap();
    assert_eq!(fs.write(h, msg).unwrap(), 14);
    fs.close(h).unwrap();

    let h = fs.open("/hello.txt", OpenMode::Read).unwrap();
    let mut buf = [0u8; 14];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 14);
    assert_eq!(&buf, msg);
    assert_eq!(fs.read(h, &mut buf).unwrap(), 0);
    fs.close(h).unwrap();
}

#[test]
fn read_spanning_blocks() {
    let mut fs = Engine::mount(MountConfig::constrained().with_block_size(16)).unwrap();
    let data: Vec<u8> = (0..100u8).collect();
    fs.write_all("/seq", &data).unwrap();
    assert_eq!(fs.stat("/seq").unwrap().capacity, 112);

    let h = fs.open("/seq", OpenMode::Read).unwrap();
    fs.seek(h, SeekFrom::Start(10)).unwrap();
    let mut buf = [0u8; 40];
    assert_eq!(fs.read(h, &mut buf).unwrap(), 40);
    assert_eq!(&buf[..], &data[10..50]);
}

#[test]
fn quota_stops_the_triggering_write() {
    let config = MountConfig::ample()
        .with_partition_capacity(100 * 1024)
        .with_block_size(4096);
    let mut fs = Engine::mount(config).unwrap();

    let h = fs.open("/big.bin", OpenMode::WriteTruncate).unwrap();
    let chunk = [0xAAu8; 1024];
    let mut written = 0;
    let err = loop {
        match fs.write(h, &chunk) {
            Ok(n) => written += n,
            Err(e) => break e,
        }
        assert!(written <= 100 * 1024);
    };

    assert!(matches!(err, FsError::QuotaExceeded { .. }));
    assert!(err.is_out_of_space());
    assert_eq!(written, 100 * 1024);
    let statfs = fs.statfs();
    assert!(statfs.used_bytes <= 100 * 1024);
    assert_eq!(statfs.free_bytes, 0);
    assert_eq!(fs.stat("/big.bin").unwrap().size, 100 * 1024);
    // quota refusals are not fatal
    assert!(!statfs.degraded);
}

#[test]
fn quota_shared_between_files() {
    let config = MountConfig::constrained()
        .with_partition_capacity(2048)
        .with_block_size(512);
    let mut fs = Engine::mount(config).unwrap();

    fs.write_all("/a", &[1u8; 1500]).unwrap();
    let err = fs.write_all("/b", &[2u8; 600]).unwrap_err();
    assert!(matches!(err, FsError::QuotaExceeded { .. }));
    assert!(fs.statfs().used_bytes <= 2048);

    fs.unlink("/a").unwrap();
    fs.write_all("/b", &[2u8; 600]).unwrap();
    assert_eq!(fs.statfs().used_bytes, 1024);
}

#[test]
fn refused_write_leaves_quota_untouched() {
    let config = MountConfig::ample()
        .with_partition_capacity(8192)
        .with_block_size(4096);
    let mut fs = Engine::mount(config).unwrap();

    let err = fs.write_all("/a", &[0u8; 12288]).unwrap_err();
    assert!(matches!(err, FsError::QuotaExceeded { .. }));
    assert_eq!(fs.stat("/a").unwrap().capacity, 0);
    assert_eq!(fs.statfs().used_bytes, 0);

    fs.write_all("/b", b"x").unwrap();
    assert_eq!(fs.read_all("/b").unwrap(), b"x");
    assert_eq!(fs.statfs().used_bytes, 4096);
}

#[test]
fn unlink_removes_file_and_entry() {
    let mut fs = mount();
    fs.write_all("/docs/a.txt", b"a").unwrap();
    fs.write_all("/docs/b.txt", b"b").unwrap();
    assert_eq!(readdir_all(&mut fs, "/docs").len(), 2);

    fs.unlink("/docs/a.txt").unwrap();
    assert_eq!(fs.stat("/docs/a.txt"), Err(FsError::not_found("/docs/a.txt")));
    let left = readdir_all(&mut fs, "/docs");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].name, "b.txt");
    assert_eq!(fs.statfs().used_bytes, fs.stat("/docs/b.txt").unwrap().capacity);
    assert_consistent(&fs);
}

#[test]
fn root_is_never_removed() {
    let mut fs = mount();
    assert_eq!(fs.rmdir("/"), Err(FsError::IsRoot));

    fs.write_all("/x/y/z", b"").unwrap();
    assert_eq!(fs.rmdir("/"), Err(FsError::IsRoot));

    fs.format().unwrap();
    assert_eq!(fs.rmdir("/"), Err(FsError::IsRoot));
    assert!(fs.stat("/").unwrap().is_dir());
}

#[test]
fn rmdir_requires_empty() {
    let mut fs = mount();
    fs.write_all("/logs/today.log", b"entry").unwrap();
    assert_eq!(fs.rmdir("/logs"), Err(FsError::not_empty("/logs")));

    fs.unlink("/logs/today.log").unwrap();
    fs.rmdir("/logs").unwrap();
    assert!(!fs.exists("/logs"));
    assert!(names(&fs, "/").is_empty());
}

#[test]
fn mkdir_twice_is_a_noop() {
    let mut fs = mount();
    let first = fs.mkdir("/data").unwrap();
    let second = fs.mkdir("/data").unwrap();
    assert_eq!(first, second);
    assert_eq!(names(&fs, "/"), vec!["data"]);
    assert_eq!(fs.statfs().dirs, 2);
}

#[test]
fn mkdir_without_parent() {
    let mut fs = mount();
    assert_eq!(
        fs.mkdir("/a/b"),
        Err(FsError::AncestorUnreachable("/a".to_string()))
    );
    assert!(!fs.exists("/a"));
}

#[test]
fn unlink_during_readdir_neither_skips_nor_repeats() {
    let mut fs = mount();
    for name in ["a", "b", "c", "d"] {
        fs.write_all(&format!("/d/{name}"), b"").unwrap();
    }

    let handle = fs.opendir("/d").unwrap();
    let mut seen = Vec::new();
    while let Some(entry) = fs.readdir(handle).unwrap() {
        seen.push(entry.name.clone());
        fs.unlink(&format!("/d/{}", entry.name)).unwrap();
    }
    assert_eq!(seen, vec!["a", "b", "c", "d"]);
    assert!(names(&fs, "/d").is_empty());
}

#[test]
fn rewinddir_restarts() {
    let mut fs = mount();
    fs.mkdir_all("/r/one").unwrap();
    fs.mkdir_all("/r/two").unwrap();

    let handle = fs.opendir("/r").unwrap();
    assert_eq!(fs.readdir(handle).unwrap().unwrap().name, "one");
    fs.rewinddir(handle).unwrap();
    let entry = fs.readdir(handle).unwrap().unwrap();
    assert_eq!(entry.name, "one");
    assert_eq!(entry.kind(), FileType::Directory);
}

// ============================================================================
// Tier 1: structural checks
// ============================================================================

#[test]
fn mixed_workload_keeps_tables_consistent() {
    let mut fs = Engine::mount(MountConfig::constrained().with_partition_capacity(16 * 1024))
        .unwrap();

    for i in 0..6 {
        fs.write_all(&format!("/set{}/item{i}.dat", i % 3), &vec![i as u8; 300 * i])
            .unwrap();
    }
    fs.unlink("/set1/item4.dat").unwrap();
    fs.mkdir_all("/set2/nested/deeper").unwrap();
    fs.rmdir("/set2/nested/deeper").unwrap();
    fs.write_all("/set0/item0.dat", b"replaced").unwrap();

    let h = fs.open("/set0/log", OpenMode::WriteAppend).unwrap();
    for _ in 0..20 {
        fs.write(h, b"tick\n").unwrap();
    }
    fs.close(h).unwrap();

    assert_consistent(&fs);
    assert_unique_paths(&fs);

    let statfs = fs.statfs();
    assert!(statfs.used_bytes <= statfs.total_bytes);
    assert_eq!(statfs.files, fs.files().iter().count());
    assert_eq!(fs.read_all("/set0/item0.dat").unwrap(), b"replaced");
    assert_eq!(fs.read_all("/set0/log").unwrap().len(), 100);
}

#[test]
fn creation_refuses_cross_table_duplicates() {
    let mut fs = mount();
    fs.mkdir("/shared").unwrap();
    fs.write_all("/plain", b"").unwrap();

    assert_eq!(
        fs.open("/shared", OpenMode::WriteTruncate),
        Err(FsError::is_a_directory("/shared"))
    );
    assert_eq!(fs.mkdir("/plain"), Err(FsError::already_exists("/plain")));
    assert_unique_paths(&fs);
}

#[test]
fn directory_slot_exhaustion_is_fatal() {
    let mut fs = Engine::mount(MountConfig::constrained().with_max_items(3)).unwrap();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/b").unwrap();

    let err = fs.open("/c/file", OpenMode::WriteTruncate).unwrap_err();
    assert_eq!(
        err,
        FsError::CapacityExceeded {
            kind: FileType::Directory,
            max: 3
        }
    );
    assert!(fs.is_degraded());
    assert_consistent(&fs);
}

// ============================================================================
// Tier 2: rename
// ============================================================================

#[test]
fn file_rename_keeps_entry_name() {
    let mut fs = mount();
    fs.write_all("/notes/old.txt", b"body").unwrap();
    let slot = fs.files().find("/notes/old.txt").unwrap();

    fs.rename("/notes/old.txt", "/notes/new.txt").unwrap();

    assert_eq!(fs.read_all("/notes/new.txt").unwrap(), b"body");
    assert!(!fs.exists("/notes/old.txt"));
    assert_eq!(fs.files().find("/notes/new.txt"), Some(slot));
    // the listing still carries the basename the file was created with
    assert_eq!(names(&fs, "/notes"), vec!["old.txt"]);
    assert_consistent(&fs);
}

#[test]
fn file_rename_across_directories_keeps_parent() {
    let mut fs = mount();
    fs.write_all("/src/f", b"x").unwrap();
    fs.mkdir("/dst").unwrap();

    fs.rename("/src/f", "/dst/f").unwrap();
    assert!(fs.exists("/dst/f"));
    assert_eq!(names(&fs, "/src"), vec!["f"]);
    assert!(names(&fs, "/dst").is_empty());
}

#[test]
fn directory_rename_rewrites_parent_entry() {
    let mut fs = mount();
    fs.write_all("/proj/readme", b"hi").unwrap();
    let slot = fs.tree().find("/proj").unwrap();

    fs.rename("/proj", "/project").unwrap();

    assert_eq!(fs.tree().find("/project"), Some(slot));
    assert!(!fs.exists("/proj"));
    assert_eq!(names(&fs, "/"), vec!["project"]);
    assert_eq!(names(&fs, "/project"), vec!["readme"]);
    assert_consistent(&fs);
}

#[test]
fn directory_rename_moves_descendants() {
    let mut fs = mount();
    fs.write_all("/proj/readme", b"hi").unwrap();
    fs.write_all("/proj/src/main.c", b"int main;").unwrap();
    fs.write_all("/projects/other", b"keep").unwrap();

    fs.rename("/proj", "/project").unwrap();

    assert_eq!(fs.stat("/project/readme").unwrap().size, 2);
    assert_eq!(fs.read_all("/project/readme").unwrap(), b"hi");
    assert_eq!(fs.read_all("/project/src/main.c").unwrap(), b"int main;");
    assert_eq!(fs.stat("/project/src").unwrap().kind(), FileType::Directory);
    assert_eq!(fs.stat("/proj/readme"), Err(FsError::not_found("/proj/readme")));
    assert!(!fs.exists("/proj/src"));
    assert_eq!(fs.read_all("/projects/other").unwrap(), b"keep");

    // rewriting through the new path reuses the moved record
    fs.write_all("/project/readme", b"hello").unwrap();
    assert_eq!(names(&fs, "/project"), vec!["readme", "src"]);
    assert_eq!(fs.read_all("/project/readme").unwrap(), b"hello");
    assert_unique_paths(&fs);
    assert_consistent(&fs);
}

#[test]
fn directory_rename_into_itself_refused() {
    let mut fs = mount();
    fs.write_all("/a/f", b"x").unwrap();

    assert_eq!(fs.rename("/a", "/a/b"), Err(FsError::invalid_path("/a/b")));
    assert_eq!(fs.read_all("/a/f").unwrap(), b"x");
    assert!(!fs.exists("/a/b"));
}

#[test]
fn rename_errors() {
    let mut fs = mount();
    fs.write_all("/a", b"").unwrap();
    fs.write_all("/b", b"").unwrap();
    fs.mkdir("/d").unwrap();

    assert_eq!(fs.rename("/a", "/b"), Err(FsError::destination_exists("/b")));
    assert_eq!(fs.rename("/a", "/d"), Err(FsError::destination_exists("/d")));
    assert_eq!(fs.rename("/d", "/a"), Err(FsError::destination_exists("/a")));
    assert_eq!(fs.rename("/zzz", "/y"), Err(FsError::not_found("/zzz")));
    assert_eq!(fs.rename("/", "/root2"), Err(FsError::IsRoot));
}

// ============================================================================
// Tier 3: regions and configuration
// ============================================================================

#[test]
fn external_region_derives_partition() {
    let config = MountConfig::external(64 * 1024);
    let mut fs = Engine::mount(config).unwrap();

    let statfs = fs.statfs();
    assert_eq!(statfs.total_bytes, 32 * 1024);
    assert_eq!(statfs.block_size, 512);

    fs.write_all("/fill", &vec![0u8; 32 * 1024]).unwrap();
    let err = fs.write_all("/more", b"!").unwrap_err();
    assert!(matches!(err, FsError::QuotaExceeded { .. }));
}

#[test]
fn region_refusal_surfaces_as_out_of_memory() {
    let region = std::sync::Arc::new(BoundedRegion::new("psram", 1024));
    let config = MountConfig::constrained().with_block_size(512);
    let mut fs = Engine::mount_with_region(config, region.clone()).unwrap();

    fs.write_all("/a", &[0u8; 1024]).unwrap();
    let err = fs.write_all("/b", b"x").unwrap_err();
    assert!(matches!(err, FsError::OutOfMemory { .. }));
    assert!(err.is_out_of_space());

    fs.unlink("/a").unwrap();
    assert_eq!(region.used(), 0);
}

#[test]
fn mount_from_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_items = 4").unwrap();
    writeln!(file, "block_size = 128").unwrap();
    writeln!(file, "partition_capacity_bytes = 256").unwrap();

    let config = MountConfig::load(file.path()).unwrap();
    let mut fs = Engine::mount(config).unwrap();
    assert_eq!(fs.statfs().max_items, 4);

    fs.write_all("/ok", &[0u8; 256]).unwrap();
    assert!(fs.write_all("/no", b"x").is_err());
}

#[test]
fn format_resets_everything() {
    let mut fs = mount();
    fs.write_all("/a/b/c", b"123").unwrap();
    fs.mkdir("/e").unwrap();

    fs.format().unwrap();
    let statfs = fs.statfs();
    assert_eq!((statfs.files, statfs.dirs, statfs.used_bytes), (0, 1, 0));
    assert!(names(&fs, "/").is_empty());
    fs.write_all("/a/b/c", b"again").unwrap();
    assert_consistent(&fs);
}

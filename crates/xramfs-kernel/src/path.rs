//! Absolute path handling.
//!
//! Paths are plain `/`-separated strings. Records store the normalized form,
//! so lookups compare normalized strings only.

use crate::error::{FsError, FsResult};

/// Path of the root directory.
pub const ROOT: &str = "/";

/// Normalize an absolute path: collapse repeated `/`, strip a trailing `/`.
///
/// Rejects empty and relative paths, NUL bytes, and `.`/`..` components.
pub fn normalize(path: &str) -> FsResult<String> {
    if path.is_empty() || !path.starts_with('/') || path.contains('\0') {
        return Err(FsError::invalid_path(path));
    }

    let mut result = String::with_capacity(path.len());
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if component == "." || component == ".." {
            return Err(FsError::invalid_path(path));
        }
        result.push('/');
        result.push_str(component);
    }

    if result.is_empty() {
        result.push('/');
    }
    Ok(result)
}

/// Returns true for the root path.
pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Parent of a normalized path. The parent of `/` is `/`.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ROOT,
        Some(idx) => &path[..idx],
    }
}

/// Last component of a normalized path. The basename of `/` is `/`.
pub fn basename(path: &str) -> &str {
    if is_root(path) {
        return ROOT;
    }
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Proper ancestors of a normalized path, top-down, root excluded.
///
/// `/a/b/c.txt` yields `/a`, `/a/b`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    let parent = dirname(path);
    parent
        .match_indices('/')
        .skip(1)
        .map(move |(idx, _)| &parent[..idx])
        .chain((!is_root(parent)).then_some(parent))
}

/// Remainder of `path` below directory `dir`, without the leading `/`.
/// `None` when `path` is `dir` itself or lies outside it.
///
/// `/a/b/c` under `/a` gives `b/c`; `/ab` is not under `/a`.
pub fn strip_dir_prefix<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    let rest = if is_root(dir) {
        path.strip_prefix('/')
    } else {
        path.strip_prefix(dir)?.strip_prefix('/')
    };
    rest.filter(|r| !r.is_empty())
}

/// Append a relative remainder to a normalized directory path.
pub fn join(dir: &str, rest: &str) -> String {
    if is_root(dir) {
        format!("/{rest}")
    } else {
        format!("{dir}/{rest}")
    }
}

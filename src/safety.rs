//! Extraction safety: destination path validation and size limits.
//!
//! Entry names come from the archive and cannot be trusted. Before anything
//! is written, [`resolve_extract_path`] maps a name onto a path below the
//! destination directory according to a [`PathSafety`] policy, and
//! [`LimitedReader`] stops an entry from producing more data than its
//! header declares.

use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Policy for validating extraction paths.
///
/// The default is `Strict`, which blocks every form of path traversal.
///
/// ```rust
/// use zipkit::safety::PathSafety;
///
/// assert_eq!(PathSafety::default(), PathSafety::Strict);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathSafety {
    /// Rejects `..` segments and absolute names, and verifies that the
    /// resolved path (symlinks followed) stays inside the destination.
    #[default]
    Strict,
    /// Rejects `..` segments; leading slashes and drive letters are dropped
    /// instead of rejected.
    Relaxed,
    /// No validation at all. A hostile archive can write anywhere the
    /// process can.
    Disabled,
}

fn traversal(name: &str) -> Error {
    Error::PathTraversal {
        path: name.to_string(),
    }
}

fn has_drive_prefix(name: &str) -> bool {
    let b = name.as_bytes();
    b.len() >= 2 && b[1] == b':' && b[0].is_ascii_alphabetic()
}

/// Maps an entry name onto a path below `dest`.
///
/// Backslashes are treated as separators, since archives written on
/// Windows sometimes use them.
pub fn resolve_extract_path(name: &str, dest: &Path, policy: PathSafety) -> Result<PathBuf> {
    let normalized = name.replace('\\', "/");
    if policy == PathSafety::Disabled {
        return Ok(dest.join(normalized.trim_end_matches('/')));
    }

    let absolute = normalized.starts_with('/') || has_drive_prefix(&normalized);
    if absolute && policy == PathSafety::Strict {
        return Err(traversal(name));
    }
    let relative = if has_drive_prefix(&normalized) {
        &normalized[2..]
    } else {
        &normalized[..]
    };

    let mut full = dest.to_path_buf();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(traversal(name)),
            s => full.push(s),
        }
    }
    if full == dest {
        return Err(Error::InvalidArchivePath(format!("entry name '{}' names no file", name)));
    }

    if policy == PathSafety::Strict {
        let canonical_dest = canonicalize_lenient(dest)?;
        if !canonicalize_lenient(&full)?.starts_with(&canonical_dest) {
            return Err(traversal(name));
        }
    }
    Ok(full)
}

/// Canonicalizes the deepest existing ancestor and appends the rest.
fn canonicalize_lenient(path: &Path) -> Result<PathBuf> {
    let mut ancestor = path;
    let mut missing = Vec::new();
    while !ancestor.exists() {
        match (ancestor.file_name(), ancestor.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                ancestor = parent;
            }
            _ => break,
        }
    }
    let mut result = if ancestor.as_os_str().is_empty() {
        std::env::current_dir()?
    } else {
        ancestor.canonicalize()?
    };
    for name in missing.into_iter().rev() {
        result.push(name);
    }
    // A leftover ".." can only come from `dest` itself; resolve it lexically.
    let mut clean = PathBuf::new();
    for component in result.components() {
        match component {
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }
    Ok(clean)
}

/// A reader that fails once more than `limit` bytes come out of it.
///
/// Protects extraction from entries that inflate beyond their declared size.
pub struct LimitedReader<R> {
    inner: R,
    limit: u64,
    bytes_read: u64,
    entry_name: String,
}

impl<R> LimitedReader<R> {
    /// Wraps `inner`, allowing at most `limit` bytes.
    pub fn new(inner: R, limit: u64, entry_name: impl Into<String>) -> Self {
        Self {
            inner,
            limit,
            bytes_read: 0,
            entry_name: entry_name.into(),
        }
    }

    /// Bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        if self.bytes_read > self.limit {
            return Err(io::Error::other(Error::ResourceLimitExceeded(format!(
                "entry '{}' inflates beyond its declared size of {} bytes",
                self.entry_name, self.limit
            ))));
        }
        Ok(n)
    }
}

impl<R> std::fmt::Debug for LimitedReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitedReader")
            .field("limit", &self.limit)
            .field("bytes_read", &self.bytes_read)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::map_io_error;
    use std::io::Cursor;

    #[test]
    fn test_strict_accepts_nested_names() {
        let dest = tempfile::tempdir().unwrap();
        let path = resolve_extract_path("foo/bar.txt", dest.path(), PathSafety::Strict).unwrap();
        assert_eq!(path, dest.path().join("foo").join("bar.txt"));

        let dir = resolve_extract_path("foo/", dest.path(), PathSafety::Strict).unwrap();
        assert_eq!(dir, dest.path().join("foo"));
    }

    #[test]
    fn test_traversal_rejected() {
        let dest = tempfile::tempdir().unwrap();
        for name in ["../evil.txt", "a/../../evil.txt", "a\\..\\..\\evil.txt"] {
            for policy in [PathSafety::Strict, PathSafety::Relaxed] {
                let err = resolve_extract_path(name, dest.path(), policy).unwrap_err();
                assert!(matches!(err, Error::PathTraversal { .. }), "{name} with {policy:?}");
            }
        }
    }

    #[test]
    fn test_strict_with_missing_destination() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("fresh").join("deeper");
        let path = resolve_extract_path("x.txt", &dest, PathSafety::Strict).unwrap();
        assert_eq!(path, dest.join("x.txt"));
        assert!(!dest.exists());
        let err = resolve_extract_path("../x.txt", &dest, PathSafety::Strict).unwrap_err();
        assert!(matches!(err, Error::PathTraversal { .. }));
    }

    #[test]
    fn test_absolute_names() {
        let dest = tempfile::tempdir().unwrap();
        assert!(resolve_extract_path("/etc/passwd", dest.path(), PathSafety::Strict).is_err());
        assert!(resolve_extract_path("C:/boot.ini", dest.path(), PathSafety::Strict).is_err());
        let relaxed = resolve_extract_path("/etc/passwd", dest.path(), PathSafety::Relaxed).unwrap();
        assert_eq!(relaxed, dest.path().join("etc").join("passwd"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_escape() {
        let dest = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dest.path().join("link")).unwrap();
        let err = resolve_extract_path("link/file.txt", dest.path(), PathSafety::Strict).unwrap_err();
        assert!(matches!(err, Error::PathTraversal { .. }));
    }

    #[test]
    fn test_disabled_joins_verbatim() {
        let dest = Path::new("/tmp/out");
        let path = resolve_extract_path("../x", dest, PathSafety::Disabled).unwrap();
        assert_eq!(path, Path::new("/tmp/out/../x"));
    }

    #[test]
    fn test_limited_reader() {
        let mut ok = LimitedReader::new(Cursor::new(vec![0u8; 100]), 100, "a");
        let mut buf = Vec::new();
        ok.read_to_end(&mut buf).unwrap();
        assert_eq!(ok.bytes_read(), 100);

        let mut over = LimitedReader::new(Cursor::new(vec![0u8; 101]), 100, "b");
        let err = over.read_to_end(&mut Vec::new()).unwrap_err();
        assert!(matches!(map_io_error(err), Error::ResourceLimitExceeded(_)));
    }
}

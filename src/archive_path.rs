//! Validated entry names.
//!
//! Names read from an archive are kept verbatim on [`Entry`](crate::Entry),
//! since a hostile archive may contain anything. Names the crate *writes*
//! go through [`ArchivePath`] first so that every archive we produce can be
//! extracted safely on any platform.

use crate::{Error, Result};
use std::fmt;
use std::path::{Component, Path};

/// Maximum length of an entry name: the zip header stores it in a `u16`.
pub const MAX_NAME_LENGTH: usize = u16::MAX as usize;

/// A validated, normalized entry name.
///
/// An `ArchivePath` never carries the trailing `/` that marks a directory in
/// the zip format; directory-ness is a property of the entry and the slash is
/// added by [`to_zip_name`](Self::to_zip_name).
///
/// # Examples
///
/// ```
/// use zipkit::ArchivePath;
///
/// let path = ArchivePath::new("docs/readme.txt").unwrap();
/// assert_eq!(path.file_name(), "readme.txt");
/// assert_eq!(path.to_zip_name(true), "docs/readme.txt/");
///
/// assert!(ArchivePath::new("../secret").is_err());
/// assert!(ArchivePath::new("/etc/passwd").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchivePath(String);

impl ArchivePath {
    /// Creates a new `ArchivePath` from a string, validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArchivePath`] if the name is empty, too long,
    /// absolute, contains NUL or backslash characters, has empty segments, a
    /// trailing slash, or `.`/`..` segments.
    pub fn new(s: &str) -> Result<Self> {
        validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Normalizes a name the way users tend to type it, then validates it.
    ///
    /// Backslashes become `/`, and leading `./`, leading slashes and a
    /// trailing slash are stripped.
    pub fn normalize(s: &str) -> Result<Self> {
        let mut name = s.replace('\\', "/");
        while let Some(rest) = name.strip_prefix("./") {
            name = rest.to_string();
        }
        let trimmed = name.trim_start_matches('/').trim_end_matches('/');
        Self::new(trimmed)
    }

    /// Builds a name from a relative filesystem path.
    ///
    /// Only normal components are accepted.
    pub fn from_relative_path(path: &Path) -> Result<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| {
                        Error::InvalidArchivePath(format!(
                            "non UTF-8 path component in {}",
                            path.display()
                        ))
                    })?;
                    segments.push(part);
                }
                Component::CurDir => {}
                _ => {
                    return Err(Error::InvalidArchivePath(format!(
                        "path {} is not relative",
                        path.display()
                    )));
                }
            }
        }
        Self::new(&segments.join("/"))
    }

    /// Returns the path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name as stored in a zip header.
    pub fn to_zip_name(&self, is_directory: bool) -> String {
        if is_directory {
            format!("{}/", self.0)
        } else {
            self.0.clone()
        }
    }

    /// Joins this path with another segment.
    pub fn join(&self, other: &str) -> Result<Self> {
        Self::new(&format!("{}/{}", self.0, other))
    }

    /// Returns the parent directory of this path, if any.
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rfind('/')
            .map(|idx| Self(self.0[..idx].to_string()))
    }

    /// Returns the last segment of this path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns an iterator over the path segments.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Returns true if this path equals `prefix` or lies underneath it.
    ///
    /// The comparison is segment-wise: `"foo/bar"` starts with `"foo"` but
    /// not with `"fo"`.
    pub fn starts_with(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        match self.0.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

fn validate(s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::InvalidArchivePath("empty path".into()));
    }
    if s.len() > MAX_NAME_LENGTH {
        return Err(Error::InvalidArchivePath(format!(
            "name exceeds maximum length of {} bytes",
            MAX_NAME_LENGTH
        )));
    }
    if s.contains('\0') {
        return Err(Error::InvalidArchivePath("contains NUL byte".into()));
    }
    if s.contains('\\') {
        return Err(Error::InvalidArchivePath(
            "backslash separators not allowed".into(),
        ));
    }
    if s.starts_with('/') {
        return Err(Error::InvalidArchivePath("absolute path not allowed".into()));
    }
    if s.ends_with('/') {
        return Err(Error::InvalidArchivePath("trailing slash not allowed".into()));
    }
    for segment in s.split('/') {
        match segment {
            "" => {
                return Err(Error::InvalidArchivePath(
                    "empty segment (consecutive slashes)".into(),
                ));
            }
            "." => return Err(Error::InvalidArchivePath("'.' segment not allowed".into())),
            ".." => {
                return Err(Error::InvalidArchivePath(
                    "'..' segment not allowed (path traversal)".into(),
                ));
            }
            _ => {}
        }
    }
    // Drive-letter names like "C:foo" are absolute on Windows.
    if s.as_bytes().get(1) == Some(&b':') {
        return Err(Error::InvalidArchivePath(
            "drive-qualified path not allowed".into(),
        ));
    }
    Ok(())
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for ArchivePath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ArchivePath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        validate(&s)?;
        Ok(Self(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_names() {
        for name in ["file.txt", "dir/file.txt", "a/b/c/d", "日本語/файл.txt", ".gitignore", "file..txt", "..."] {
            assert_eq!(ArchivePath::new(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_invalid_names() {
        let cases = [
            ("", "empty"),
            ("file\0.txt", "NUL"),
            ("/etc/passwd", "absolute"),
            ("a//b", "empty segment"),
            ("dir/", "trailing slash"),
            ("./file", "'.'"),
            ("a/../b", ".."),
            ("dir\\file", "backslash"),
            ("C:evil", "drive"),
        ];
        for (name, needle) in cases {
            let err = ArchivePath::new(name).unwrap_err();
            assert!(matches!(err, Error::InvalidArchivePath(_)), "{name:?}");
            assert!(err.to_string().contains(needle), "{name:?}: {err}");
        }
    }

    #[test]
    fn test_too_long() {
        let err = ArchivePath::new(&"a".repeat(MAX_NAME_LENGTH + 1)).unwrap_err();
        assert!(err.to_string().contains("maximum length"));
        assert!(ArchivePath::new(&"a".repeat(MAX_NAME_LENGTH)).is_ok());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(ArchivePath::normalize("dir\\sub\\f.txt").unwrap().as_str(), "dir/sub/f.txt");
        assert_eq!(ArchivePath::normalize("./a/b/").unwrap().as_str(), "a/b");
        assert_eq!(ArchivePath::normalize("/rooted").unwrap().as_str(), "rooted");
        assert!(ArchivePath::normalize("../up").is_err());
    }

    #[test]
    fn test_from_relative_path() {
        let path: PathBuf = ["dir", "sub", "file.txt"].iter().collect();
        assert_eq!(ArchivePath::from_relative_path(&path).unwrap().as_str(), "dir/sub/file.txt");
        assert!(ArchivePath::from_relative_path(Path::new("../x")).is_err());
    }

    #[test]
    fn test_zip_name() {
        let path = ArchivePath::new("dir/sub").unwrap();
        assert_eq!(path.to_zip_name(false), "dir/sub");
        assert_eq!(path.to_zip_name(true), "dir/sub/");
    }

    #[test]
    fn test_parent_and_file_name() {
        let path = ArchivePath::new("a/b/c.txt").unwrap();
        assert_eq!(path.file_name(), "c.txt");
        assert_eq!(path.parent().unwrap().as_str(), "a/b");
        assert!(ArchivePath::new("top").unwrap().parent().is_none());
        assert_eq!(path.components().collect::<Vec<_>>(), vec!["a", "b", "c.txt"]);
    }

    #[test]
    fn test_join() {
        let dir = ArchivePath::new("dir").unwrap();
        assert_eq!(dir.join("file.txt").unwrap().as_str(), "dir/file.txt");
        assert!(dir.join("..").is_err());
    }

    #[test]
    fn test_starts_with() {
        let path = ArchivePath::new("dir/subdir/file.txt").unwrap();
        assert!(path.starts_with("dir"));
        assert!(path.starts_with("dir/"));
        assert!(path.starts_with("dir/subdir"));
        assert!(!path.starts_with("di"));
        assert!(!path.starts_with("other"));
        assert!(path.starts_with(""));
    }

    #[test]
    fn test_try_from() {
        let a: ArchivePath = "x/y".try_into().unwrap();
        let b: ArchivePath = String::from("x/y").try_into().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "x/y");
    }
}

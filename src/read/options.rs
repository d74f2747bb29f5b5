//! Extraction options.

pub use crate::safety::PathSafety;

/// Policy for handling existing files during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Return an error if the file exists.
    Error,
    /// Skip files that already exist.
    Skip,
    /// Overwrite existing files.
    #[default]
    Overwrite,
}

/// Options for extracting entries to disk.
///
/// # Examples
///
/// ```rust
/// use zipkit::read::{ExtractOptions, OverwritePolicy, PathSafety};
///
/// let options = ExtractOptions::new()
///     .overwrite(OverwritePolicy::Skip)
///     .path_safety(PathSafety::Relaxed)
///     .preserve_mtime(false);
/// assert_eq!(options.overwrite, OverwritePolicy::Skip);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Policy for handling existing files.
    pub overwrite: OverwritePolicy,
    /// Path safety validation policy.
    pub path_safety: PathSafety,
    /// Set the modification time of extracted files from the archive.
    pub preserve_mtime: bool,
    /// Apply Unix permission bits stored in the archive.
    pub preserve_permissions: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            overwrite: OverwritePolicy::default(),
            path_safety: PathSafety::default(),
            preserve_mtime: true,
            preserve_permissions: cfg!(unix),
        }
    }
}

impl ExtractOptions {
    /// Creates extraction options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the overwrite policy.
    #[must_use]
    pub fn overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    /// Sets the path safety policy.
    #[must_use]
    pub fn path_safety(mut self, policy: PathSafety) -> Self {
        self.path_safety = policy;
        self
    }

    /// Sets whether modification times are restored.
    #[must_use]
    pub fn preserve_mtime(mut self, preserve: bool) -> Self {
        self.preserve_mtime = preserve;
        self
    }

    /// Sets whether Unix permissions are restored.
    #[must_use]
    pub fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ExtractOptions::default();
        assert_eq!(options.overwrite, OverwritePolicy::Overwrite);
        assert_eq!(options.path_safety, PathSafety::Strict);
        assert!(options.preserve_mtime);
        assert_eq!(options.preserve_permissions, cfg!(unix));
    }
}

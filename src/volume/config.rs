//! Split archive configuration and volume naming.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Smallest accepted volume size.
pub const MIN_VOLUME_SIZE: u64 = 64 * 1024;

/// Most volumes a split archive may have (`.z01` to `.z99` plus `.zip`).
pub const MAX_VOLUMES: u32 = 100;

/// Path of volume `number` (1-based) in the `.zNN` series of `zip_path`.
///
/// ```rust
/// use std::path::Path;
/// use zipkit::volume::split_volume_path;
///
/// assert_eq!(split_volume_path(Path::new("backup.zip"), 1), Path::new("backup.z01"));
/// assert_eq!(split_volume_path(Path::new("backup.zip"), 12), Path::new("backup.z12"));
/// ```
pub fn split_volume_path(zip_path: &Path, number: u32) -> PathBuf {
    zip_path.with_extension(format!("z{:02}", number))
}

/// Path of disk `disk` (0-based) in a set of `total` volumes.
///
/// The last volume always carries the archive's own name.
pub fn volume_path(zip_path: &Path, disk: u32, total: u32) -> PathBuf {
    if disk + 1 >= total {
        zip_path.to_path_buf()
    } else {
        split_volume_path(zip_path, disk + 1)
    }
}

/// Where and how large to write a split archive.
///
/// ```rust
/// use zipkit::volume::SplitConfig;
///
/// let config = SplitConfig::new("backup.zip", 1024 * 1024)?;
/// assert_eq!(config.volume_size(), 1024 * 1024);
/// assert!(SplitConfig::new("backup.zip", 1000).is_err());
/// # Ok::<(), zipkit::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    path: PathBuf,
    volume_size: u64,
}

impl SplitConfig {
    /// Creates a configuration for volumes of at most `volume_size` bytes.
    ///
    /// `path` names the final `.zip` volume.
    pub fn new(path: impl AsRef<Path>, volume_size: u64) -> Result<Self> {
        if volume_size < MIN_VOLUME_SIZE {
            return Err(Error::InvalidParameter(format!(
                "split volume size must be at least {} bytes, got {}",
                MIN_VOLUME_SIZE, volume_size
            )));
        }
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            volume_size,
        })
    }

    /// The final volume's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maximum size of one volume.
    pub fn volume_size(&self) -> u64 {
        self.volume_size
    }

    /// The same configuration targeting another path.
    pub(crate) fn with_path(&self, path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            volume_size: self.volume_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_naming() {
        let zip = Path::new("/data/archive.zip");
        assert_eq!(volume_path(zip, 0, 3), Path::new("/data/archive.z01"));
        assert_eq!(volume_path(zip, 1, 3), Path::new("/data/archive.z02"));
        assert_eq!(volume_path(zip, 2, 3), zip);
        assert_eq!(volume_path(zip, 0, 1), zip);
        assert_eq!(split_volume_path(zip, 99), Path::new("/data/archive.z99"));
    }

    #[test]
    fn test_minimum_size() {
        assert!(SplitConfig::new("a.zip", MIN_VOLUME_SIZE).is_ok());
        let err = SplitConfig::new("a.zip", MIN_VOLUME_SIZE - 1).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_with_path_keeps_size() {
        let config = SplitConfig::new("a.zip", 100_000).unwrap().with_path("b.zip");
        assert_eq!(config.path(), Path::new("b.zip"));
        assert_eq!(config.volume_size(), 100_000);
    }
}

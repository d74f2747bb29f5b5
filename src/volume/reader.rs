//! Split archive reader.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::split_volume_path;
use crate::format::DiskLayout;
use crate::format::eocd::probe_volume_count;
use crate::{Error, Result};

/// The files that make up one archive, in disk order.
///
/// A plain archive is a set of one. A split archive is opened through its
/// final `.zip` volume, whose end record says how many `.zNN` volumes must
/// sit next to it.
#[derive(Debug, Clone)]
pub struct VolumeSet {
    paths: Arc<[PathBuf]>,
    layout: DiskLayout,
}

impl VolumeSet {
    /// Discovers the volume set behind `zip_path`.
    ///
    /// # Errors
    ///
    /// - [`Error::FileNotFound`] if `zip_path` does not exist.
    /// - [`Error::InvalidFormat`] if it has no end of central directory.
    /// - [`Error::VolumeMissing`] if a `.zNN` volume it declares is absent.
    pub fn open(zip_path: impl AsRef<Path>) -> Result<Self> {
        let zip_path = zip_path.as_ref();
        let mut last = File::open(zip_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound {
                path: zip_path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;
        let count = probe_volume_count(&mut last)?;
        let last_len = last.metadata()?.len();

        let mut paths = Vec::with_capacity(count as usize);
        let mut sizes = Vec::with_capacity(count as usize);
        for disk in 0..count.saturating_sub(1) {
            let path = split_volume_path(zip_path, disk + 1);
            let meta = fs::metadata(&path).map_err(|source| Error::VolumeMissing {
                volume: disk,
                path: path.clone(),
                source,
            })?;
            sizes.push(meta.len());
            paths.push(path);
        }
        sizes.push(last_len);
        paths.push(zip_path.to_path_buf());

        if count > 1 {
            log::debug!("{} is the last of {} volumes", zip_path.display(), count);
        }
        Ok(Self {
            paths: paths.into(),
            layout: DiskLayout::from_sizes(&sizes),
        })
    }

    /// Volume paths in disk order; the archive path itself comes last.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Offsets of each volume within the concatenated set.
    pub fn layout(&self) -> &DiskLayout {
        &self.layout
    }

    /// Number of volumes.
    pub fn volume_count(&self) -> u32 {
        self.paths.len() as u32
    }

    /// Returns true for archives spread over more than one file.
    pub fn is_split(&self) -> bool {
        self.paths.len() > 1
    }

    /// Size of the first volume.
    pub fn first_volume_size(&self) -> u64 {
        self.layout.disk_len(0)
    }

    /// Opens a fresh reader over the concatenated volumes.
    pub fn reader(&self) -> VolumeReader {
        VolumeReader {
            paths: Arc::clone(&self.paths),
            layout: self.layout.clone(),
            position: 0,
            open: None,
        }
    }
}

/// Reads the volumes of a [`VolumeSet`] as one continuous stream.
///
/// Each reader owns its own file handle, so independent readers over the
/// same set can be used from different threads.
pub struct VolumeReader {
    paths: Arc<[PathBuf]>,
    layout: DiskLayout,
    position: u64,
    /// Currently open volume and the position of its file cursor.
    open: Option<(u32, File, u64)>,
}

impl VolumeReader {
    fn volume_at(&self, pos: u64) -> (u32, u64) {
        let mut remaining = pos;
        for disk in 0..self.layout.disk_count() {
            let len = self.layout.disk_len(disk);
            if remaining < len {
                return (disk, remaining);
            }
            remaining -= len;
        }
        let last = self.layout.disk_count() - 1;
        (last, self.layout.disk_len(last))
    }

    fn file_at(&mut self, disk: u32, offset: u64) -> io::Result<&mut File> {
        if !matches!(&self.open, Some(open) if open.0 == disk) {
            let path = &self.paths[disk as usize];
            let file = File::open(path).map_err(|source| {
                crate::error::into_io_error(Error::VolumeMissing {
                    volume: disk,
                    path: path.clone(),
                    source,
                })
            })?;
            // Unknown cursor, forces the seek below.
            self.open = Some((disk, file, u64::MAX));
        }
        let Some((_, file, cursor)) = self.open.as_mut() else {
            return Err(io::Error::other("no volume open"));
        };
        if *cursor != offset {
            file.seek(SeekFrom::Start(offset))?;
            *cursor = offset;
        }
        Ok(file)
    }
}

impl Read for VolumeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let total = self.layout.total_len();
        if buf.is_empty() || self.position >= total {
            return Ok(0);
        }
        let (disk, offset) = self.volume_at(self.position);
        let available = self.layout.disk_len(disk) - offset;
        let want = (buf.len() as u64).min(available) as usize;
        let file = self.file_at(disk, offset)?;
        let n = file.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("volume {} is shorter than when the archive was opened", disk),
            ));
        }
        if let Some((_, _, cursor)) = self.open.as_mut() {
            *cursor += n as u64;
        }
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for VolumeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.layout.total_len().checked_add_signed(d),
            SeekFrom::Current(d) => self.position.checked_add_signed(d),
        };
        match target {
            Some(p) => {
                self.position = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot seek before the start of the archive",
            )),
        }
    }
}

impl std::fmt::Debug for VolumeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeReader")
            .field("volumes", &self.paths.len())
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

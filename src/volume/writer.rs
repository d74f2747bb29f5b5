//! Split archive writer.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;

use super::{MAX_VOLUMES, SplitConfig, split_volume_path};
use crate::format::signature;
use crate::write::VolumeSink;
use crate::{Error, Result};

/// Writes an archive across numbered volumes of bounded size.
///
/// Volumes are created as `name.z01`, `name.z02`, ... and the last one is
/// renamed to `name.zip` by [`finish`](Self::finish). Raw [`Write`] calls
/// split freely at the volume boundary; records that must stay whole go
/// through [`VolumeSink::reserve`] first.
///
/// ```rust,no_run
/// use std::io::Write;
/// use zipkit::volume::{SplitConfig, SplitWriter};
///
/// let mut writer = SplitWriter::create(SplitConfig::new("backup.zip", 1 << 20)?)?;
/// writer.write_all(b"...")?;
/// let volumes = writer.finish()?;
/// println!("{} volume(s)", volumes.len());
/// # Ok::<(), zipkit::Error>(())
/// ```
pub struct SplitWriter {
    config: SplitConfig,
    current: BufWriter<File>,
    /// Zero-based disk being written.
    disk: u32,
    /// Bytes written to the current disk.
    written: u64,
    paths: Vec<PathBuf>,
}

impl SplitWriter {
    /// Creates the first volume and writes the split marker.
    pub fn create(config: SplitConfig) -> Result<Self> {
        let path = split_volume_path(config.path(), 1);
        let file = create_volume(&path)?;
        let mut writer = Self {
            config,
            current: BufWriter::with_capacity(crate::WRITE_BUFFER_SIZE, file),
            disk: 0,
            written: 0,
            paths: vec![path],
        };
        writer.write_all(&signature::SPLIT_ARCHIVE.to_le_bytes())?;
        Ok(writer)
    }

    /// Number of volumes created so far.
    pub fn volume_count(&self) -> u32 {
        self.disk + 1
    }

    /// Room left on the current volume.
    pub fn remaining_in_volume(&self) -> u64 {
        self.config.volume_size().saturating_sub(self.written)
    }

    fn next_volume(&mut self) -> Result<()> {
        if self.disk + 1 >= MAX_VOLUMES {
            return Err(Error::ResourceLimitExceeded(format!(
                "split archive needs more than {} volumes of {} bytes",
                MAX_VOLUMES,
                self.config.volume_size()
            )));
        }
        self.current.flush()?;
        self.disk += 1;
        let path = split_volume_path(self.config.path(), self.disk + 1);
        log::debug!("volume {} full at {} bytes, continuing in {}", self.disk, self.written, path.display());
        self.current = BufWriter::with_capacity(crate::WRITE_BUFFER_SIZE, create_volume(&path)?);
        self.written = 0;
        self.paths.push(path);
        Ok(())
    }

    /// Flushes, renames the last volume to the archive name and returns all
    /// volume paths in disk order.
    ///
    /// An archive that fit in one volume is marked `PK00` instead of split.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        self.current.flush()?;
        drop(self.current);

        if self.paths.len() == 1 {
            let mut first = OpenOptions::new().write(true).open(&self.paths[0])?;
            first.seek(SeekFrom::Start(0))?;
            first.write_all(&signature::SINGLE_SEGMENT_SPLIT.to_le_bytes())?;
            first.sync_all()?;
        }

        let last = self.paths.len() - 1;
        fs::rename(&self.paths[last], self.config.path())?;
        self.paths[last] = self.config.path().to_path_buf();
        Ok(self.paths)
    }

    /// Removes every volume written so far.
    pub fn discard(self) {
        drop(self.current);
        for path in &self.paths {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("could not remove partial volume {}: {}", path.display(), e);
            }
        }
    }
}

fn create_volume(path: &std::path::Path) -> Result<File> {
    File::create(path).map_err(|e| {
        Error::Io(io::Error::new(
            e.kind(),
            format!("failed to create volume {}: {}", path.display(), e),
        ))
    })
}

impl Write for SplitWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining_in_volume() == 0 {
            self.next_volume().map_err(crate::error::into_io_error)?;
        }
        let n = (buf.len() as u64).min(self.remaining_in_volume()) as usize;
        let n = self.current.write(&buf[..n])?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.current.flush()
    }
}

impl VolumeSink for SplitWriter {
    fn position(&self) -> (u32, u64) {
        (self.disk, self.written)
    }

    fn reserve(&mut self, len: u64) -> Result<()> {
        if len > self.config.volume_size() {
            return Err(Error::ResourceLimitExceeded(format!(
                "a {} byte record does not fit in volumes of {} bytes",
                len,
                self.config.volume_size()
            )));
        }
        if self.written > 0 && len > self.remaining_in_volume() {
            self.next_volume()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SplitWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitWriter")
            .field("config", &self.config)
            .field("disk", &self.disk)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

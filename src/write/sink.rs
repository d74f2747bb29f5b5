//! Output targets for [`ZipWriter`](super::ZipWriter).
//!
//! Every record a writer emits has to know where it lands: entries record
//! the disk and offset of their local header, the end records the disk and
//! offset of the central directory. A [`VolumeSink`] answers that, and lets
//! the writer ask for room so that no record straddles two volumes.

use std::io::{self, BufWriter, Write};

use crate::Result;

/// A byte sink that knows its position within a (possibly split) archive.
pub trait VolumeSink: Write {
    /// Current `(disk, offset)` of the next byte written.
    fn position(&self) -> (u32, u64);

    /// Makes sure the next `len` bytes land on a single volume.
    ///
    /// Single-file sinks have nothing to do. Split sinks move to a fresh
    /// volume when the current one cannot hold `len` more bytes.
    fn reserve(&mut self, len: u64) -> Result<()>;
}

/// A single-file sink over any writer.
pub struct FileSink<W: Write> {
    inner: BufWriter<W>,
    written: u64,
}

impl<W: Write> FileSink<W> {
    /// Wraps `inner`, counting from offset 0.
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::with_capacity(crate::WRITE_BUFFER_SIZE, inner),
            written: 0,
        }
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes and returns the inner writer.
    pub fn finish(self) -> Result<W> {
        self.inner.into_inner().map_err(|e| e.into_error().into())
    }
}

impl<W: Write> Write for FileSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> VolumeSink for FileSink<W> {
    fn position(&self) -> (u32, u64) {
        (0, self.written)
    }

    fn reserve(&mut self, _len: u64) -> Result<()> {
        Ok(())
    }
}

impl<S: VolumeSink + ?Sized> VolumeSink for &mut S {
    fn position(&self) -> (u32, u64) {
        (**self).position()
    }

    fn reserve(&mut self, len: u64) -> Result<()> {
        (**self).reserve(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_counts_bytes() {
        let mut sink = FileSink::new(Vec::new());
        sink.write_all(b"hello").unwrap();
        sink.reserve(1_000_000).unwrap();
        sink.write_all(b" world").unwrap();
        assert_eq!(sink.position(), (0, 11));
        assert_eq!(sink.finish().unwrap(), b"hello world");
    }
}

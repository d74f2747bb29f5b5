//! Pass-through codec for stored entries.

use std::io::{self, Read, Write};

use super::{CompressionMethod, Decoder, Encoder};

/// Decoder for stored data, limited to the entry's uncompressed size.
pub struct CopyDecoder<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read + Send> CopyDecoder<R> {
    /// Creates a decoder yielding at most `size` bytes of `inner`.
    pub fn new(inner: R, size: u64) -> Self {
        Self {
            inner,
            remaining: size,
        }
    }
}

impl<R: Read + Send> Read for CopyDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(buf.len());
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stored entry ended before its declared size",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

impl<R: Read + Send> Decoder for CopyDecoder<R> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Store
    }
}

/// Encoder for stored data.
pub struct CopyEncoder<W> {
    inner: W,
}

impl<W: Write + Send> CopyEncoder<W> {
    /// Creates an encoder writing straight into `inner`.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write + Send> Write for CopyEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> Encoder for CopyEncoder<W> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Store
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.inner.flush()
    }
}

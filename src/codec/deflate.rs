//! Deflate codec implementation.

use std::io::{self, BufRead, Read, Write};

use flate2::Compression;
use flate2::bufread::DeflateDecoder as FlateDecoder;
use flate2::write::DeflateEncoder as FlateEncoder;

use super::{CompressionLevel, CompressionMethod, Decoder, Encoder};

/// Raw Deflate decoder.
pub struct DeflateDecoder<R> {
    inner: FlateDecoder<R>,
}

impl<R> std::fmt::Debug for DeflateDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateDecoder").finish_non_exhaustive()
    }
}

impl<R: BufRead + Send> DeflateDecoder<R> {
    /// Creates a new Deflate decoder over compressed `input`.
    pub fn new(input: R) -> Self {
        Self {
            inner: FlateDecoder::new(input),
        }
    }
}

impl<R: BufRead + Send> Read for DeflateDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: BufRead + Send> Decoder for DeflateDecoder<R> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }
}

/// Raw Deflate encoder.
pub struct DeflateEncoder<W: Write> {
    inner: FlateEncoder<W>,
}

impl<W: Write> std::fmt::Debug for DeflateEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateEncoder").finish_non_exhaustive()
    }
}

impl<W: Write + Send> DeflateEncoder<W> {
    /// Creates a new Deflate encoder at the given level.
    pub fn new(output: W, level: CompressionLevel) -> Self {
        Self {
            inner: FlateEncoder::new(output, Compression::new(level.level())),
        }
    }

    /// Finishes encoding and returns the output.
    pub fn try_finish(self) -> io::Result<W> {
        self.inner.finish()
    }
}

impl<W: Write + Send> Write for DeflateEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> Encoder for DeflateEncoder<W> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }

    fn finish(self: Box<Self>) -> io::Result<()> {
        self.inner.finish()?;
        Ok(())
    }
}

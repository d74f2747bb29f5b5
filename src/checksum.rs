//! CRC-32 computation and verification.
//!
//! Zip uses the IEEE 802.3 polynomial for entry checksums. [`Crc32`] wraps
//! `crc32fast`, and [`CrcReader`] checks a stream against an expected value
//! once it reaches end of data.
//!
//! # Example
//!
//! ```rust
//! use zipkit::checksum::Crc32;
//!
//! let mut crc = Crc32::new();
//! crc.update(b"Hello, ");
//! crc.update(b"World!");
//! assert_eq!(crc.finalize(), Crc32::compute(b"Hello, World!"));
//! ```

use std::io::{self, Read};

use crate::READ_BUFFER_SIZE;

/// Incremental CRC-32 hasher.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc32")
            .field("current", &self.finalize())
            .finish()
    }
}

impl Crc32 {
    /// Creates a hasher with an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds more data into the hasher.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Returns the CRC of everything fed so far.
    pub fn finalize(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// One-shot CRC of a byte slice.
    pub fn compute(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    /// Computes the CRC of a reader's remaining contents.
    pub fn compute_reader<R: Read>(reader: &mut R) -> io::Result<u32> {
        let mut hasher = Self::new();
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hasher.finalize())
    }
}

/// Outcome of a finished [`CrcReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcCheck {
    /// The CRC the stream was supposed to have.
    pub expected: u32,
    /// The CRC the stream actually had.
    pub actual: u32,
}

/// Reader adapter that hashes everything passing through it.
///
/// At end of data the computed CRC is compared with the expected one; a
/// mismatch is reported through the `on_mismatch` callback, whose error is
/// returned from `read` in place of the final `Ok(0)`.
pub struct CrcReader<R, F> {
    inner: R,
    crc: Crc32,
    expected: Option<u32>,
    on_mismatch: F,
    done: bool,
}

impl<R, F> CrcReader<R, F>
where
    R: Read,
    F: FnMut(CrcCheck) -> io::Error,
{
    /// Wraps `inner`. With `expected == None` nothing is verified.
    pub fn new(inner: R, expected: Option<u32>, on_mismatch: F) -> Self {
        Self {
            inner,
            crc: Crc32::new(),
            expected,
            on_mismatch,
            done: false,
        }
    }

    /// Returns the CRC of the data read so far.
    pub fn current(&self) -> u32 {
        self.crc.finalize()
    }
}

impl<R, F> Read for CrcReader<R, F>
where
    R: Read,
    F: FnMut(CrcCheck) -> io::Error,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.crc.update(&buf[..n]);
            return Ok(n);
        }
        self.done = true;
        if let Some(expected) = self.expected {
            let actual = self.crc.finalize();
            if actual != expected {
                return Err((self.on_mismatch)(CrcCheck { expected, actual }));
            }
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_known_values() {
        assert_eq!(Crc32::compute(b""), 0);
        assert_eq!(Crc32::compute(b"123456789"), 0xCBF4_3926);
        assert_eq!(Crc32::compute(b"hello"), 0x3610_A686);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let mut crc = Crc32::new();
        for chunk in data.chunks(7) {
            crc.update(chunk);
        }
        assert_eq!(crc.finalize(), Crc32::compute(data));
        assert_eq!(Crc32::compute_reader(&mut Cursor::new(data)).unwrap(), crc.finalize());
    }

    #[test]
    fn test_reader_accepts_matching_crc() {
        let data = b"payload".to_vec();
        let mut reader = CrcReader::new(Cursor::new(data.clone()), Some(Crc32::compute(&data)), |_| {
            io::Error::other("mismatch")
        });
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        // Reading again after EOF keeps returning 0.
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_reader_reports_mismatch() {
        let mut reader = CrcReader::new(Cursor::new(b"payload".to_vec()), Some(0xDEAD_BEEF), |check| {
            assert_eq!(check.expected, 0xDEAD_BEEF);
            io::Error::new(io::ErrorKind::InvalidData, "crc")
        });
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

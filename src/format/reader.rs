//! Little-endian field access for zip records.
//!
//! Records are read into a buffer first and then decoded with
//! [`FieldReader`]; writers use [`FieldWriter`] over any `Write`.

use std::io::{self, Read, Write};

use crate::{Error, Result};

/// Reads a little-endian u16.
pub fn read_u16_le<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Reads a little-endian u32.
pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads exactly `count` bytes.
pub fn read_bytes<R: Read>(r: &mut R, count: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; count];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Cursor over an in-memory record.
///
/// Every accessor fails with [`Error::CorruptHeader`] instead of panicking
/// when the record is shorter than expected. `base` is the absolute offset
/// of the record, used in error messages.
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> FieldReader<'a> {
    /// Wraps `buf`, which starts at absolute offset `base`.
    pub fn new(buf: &'a [u8], base: u64) -> Self {
        Self { buf, pos: 0, base }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(Error::corrupt(
                self.base + self.pos as u64,
                format!("record truncated: need {} bytes, {} left", n, self.remaining()),
            )),
        }
    }

    /// Reads a u8.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian u16.
    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a little-endian u32.
    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a little-endian u64.
    pub fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    /// Reads `n` raw bytes.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Absolute offset of the cursor.
    pub fn offset(&self) -> u64 {
        self.base + self.pos as u64
    }
}

/// Little-endian writer helpers.
pub trait FieldWriter: Write {
    /// Writes a little-endian u16.
    fn put_u16(&mut self, v: u16) -> io::Result<()> {
        self.write_all(&v.to_le_bytes())
    }

    /// Writes a little-endian u32.
    fn put_u32(&mut self, v: u32) -> io::Result<()> {
        self.write_all(&v.to_le_bytes())
    }

    /// Writes a little-endian u64.
    fn put_u64(&mut self, v: u64) -> io::Result<()> {
        self.write_all(&v.to_le_bytes())
    }
}

impl<W: Write + ?Sized> FieldWriter for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_field_reader_sequence() {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xAA, 0xBB];
        let mut r = FieldReader::new(&data, 100);
        assert_eq!(r.u8().unwrap(), 1);
        assert_eq!(r.u16().unwrap(), 0x1234);
        assert_eq!(r.u32().unwrap(), 0x1234_5678);
        assert_eq!(r.offset(), 107);
        assert_eq!(r.bytes(2).unwrap(), &[0xAA, 0xBB]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_field_reader_truncation_reports_offset() {
        let mut r = FieldReader::new(&[1, 2, 3], 0x40);
        r.u16().unwrap();
        match r.u32().unwrap_err() {
            Error::CorruptHeader { offset, .. } => assert_eq!(offset, 0x42),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_writer_and_stream_readers() {
        let mut out = Vec::new();
        out.put_u16(0xBEEF).unwrap();
        out.put_u32(0xDEAD_BEEF).unwrap();
        out.put_u64(7).unwrap();
        let mut c = Cursor::new(out);
        assert_eq!(read_u16_le(&mut c).unwrap(), 0xBEEF);
        assert_eq!(read_u32_le(&mut c).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_bytes(&mut c, 8).unwrap(), 7u64.to_le_bytes());
    }
}

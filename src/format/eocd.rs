//! End of central directory records.
//!
//! The EOCD closes every archive. It may be followed by a comment of up to
//! 65535 bytes, so it is found by scanning backwards from the end. When any
//! count, size or offset overflows its field, a Zip64 EOCD record and a
//! 20-byte locator are written immediately in front of it.

use std::io::{Read, Seek, SeekFrom, Write};

use super::reader::{FieldReader, FieldWriter};
use super::{DiskLayout, ZIP64_U16_SENTINEL, ZIP64_U32_SENTINEL, signature, version};
use crate::{Error, Result};

/// Fixed length of the EOCD record, signature included.
pub const EOCD_LEN: usize = 22;
/// Length of the Zip64 EOCD record written by this crate.
pub const ZIP64_EOCD_LEN: usize = 56;
/// Length of the Zip64 EOCD locator.
pub const ZIP64_LOCATOR_LEN: usize = 20;
/// Longest archive comment.
pub const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// The classic end of central directory record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Number of this disk.
    pub disk_number: u16,
    /// Disk where the central directory starts.
    pub cd_disk: u16,
    /// Records on this disk.
    pub entries_on_disk: u16,
    /// Records in total.
    pub total_entries: u16,
    /// Size of the central directory.
    pub cd_size: u32,
    /// Offset of the central directory, relative to `cd_disk`.
    pub cd_offset: u32,
    /// Archive comment.
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    fn parse(buf: &[u8], base: u64) -> Result<Self> {
        let mut r = FieldReader::new(buf, base);
        if r.u32()? != signature::END_OF_CENTRAL_DIRECTORY {
            return Err(Error::corrupt(base, "expected end of central directory signature"));
        }
        let disk_number = r.u16()?;
        let cd_disk = r.u16()?;
        let entries_on_disk = r.u16()?;
        let total_entries = r.u16()?;
        let cd_size = r.u32()?;
        let cd_offset = r.u32()?;
        let comment_len = r.u16()? as usize;
        // A comment cut short by truncation is kept as far as it goes.
        let comment = r.bytes(comment_len.min(r.remaining()))?.to_vec();
        Ok(Self {
            disk_number,
            cd_disk,
            entries_on_disk,
            total_entries,
            cd_size,
            cd_offset,
            comment,
        })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut buf = Vec::with_capacity(EOCD_LEN + self.comment.len());
        buf.put_u32(signature::END_OF_CENTRAL_DIRECTORY)?;
        buf.put_u16(self.disk_number)?;
        buf.put_u16(self.cd_disk)?;
        buf.put_u16(self.entries_on_disk)?;
        buf.put_u16(self.total_entries)?;
        buf.put_u32(self.cd_size)?;
        buf.put_u32(self.cd_offset)?;
        buf.put_u16(self.comment.len() as u16)?;
        buf.extend_from_slice(&self.comment);
        w.write_all(&buf)?;
        Ok(())
    }
}

/// Zip64 end of central directory record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectory {
    /// Version made by.
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// Number of this disk.
    pub disk_number: u32,
    /// Disk where the central directory starts.
    pub cd_disk: u32,
    /// Records on this disk.
    pub entries_on_disk: u64,
    /// Records in total.
    pub total_entries: u64,
    /// Size of the central directory.
    pub cd_size: u64,
    /// Offset of the central directory, relative to `cd_disk`.
    pub cd_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    fn parse(buf: &[u8], base: u64) -> Result<Self> {
        let mut r = FieldReader::new(buf, base);
        if r.u32()? != signature::ZIP64_END_OF_CENTRAL_DIRECTORY {
            return Err(Error::corrupt(base, "expected Zip64 end of central directory signature"));
        }
        let _record_size = r.u64()?;
        Ok(Self {
            version_made_by: r.u16()?,
            version_needed: r.u16()?,
            disk_number: r.u32()?,
            cd_disk: r.u32()?,
            entries_on_disk: r.u64()?,
            total_entries: r.u64()?,
            cd_size: r.u64()?,
            cd_offset: r.u64()?,
        })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut buf = Vec::with_capacity(ZIP64_EOCD_LEN);
        buf.put_u32(signature::ZIP64_END_OF_CENTRAL_DIRECTORY)?;
        buf.put_u64((ZIP64_EOCD_LEN - 12) as u64)?;
        buf.put_u16(self.version_made_by)?;
        buf.put_u16(self.version_needed)?;
        buf.put_u32(self.disk_number)?;
        buf.put_u32(self.cd_disk)?;
        buf.put_u64(self.entries_on_disk)?;
        buf.put_u64(self.total_entries)?;
        buf.put_u64(self.cd_size)?;
        buf.put_u64(self.cd_offset)?;
        w.write_all(&buf)?;
        Ok(())
    }
}

/// Zip64 end of central directory locator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Locator {
    /// Disk holding the Zip64 EOCD record.
    pub eocd64_disk: u32,
    /// Offset of the Zip64 EOCD record, relative to `eocd64_disk`.
    pub eocd64_offset: u64,
    /// Total number of disks.
    pub total_disks: u32,
}

impl Zip64Locator {
    fn parse(buf: &[u8], base: u64) -> Result<Option<Self>> {
        let mut r = FieldReader::new(buf, base);
        if r.u32()? != signature::ZIP64_LOCATOR {
            return Ok(None);
        }
        Ok(Some(Self {
            eocd64_disk: r.u32()?,
            eocd64_offset: r.u64()?,
            total_disks: r.u32()?,
        }))
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut buf = Vec::with_capacity(ZIP64_LOCATOR_LEN);
        buf.put_u32(signature::ZIP64_LOCATOR)?;
        buf.put_u32(self.eocd64_disk)?;
        buf.put_u64(self.eocd64_offset)?;
        buf.put_u32(self.total_disks)?;
        w.write_all(&buf)?;
        Ok(())
    }
}

/// The end records of an archive, resolved against Zip64 when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndRecords {
    /// The classic record.
    pub eocd: EndOfCentralDirectory,
    /// Global offset of the classic record.
    pub eocd_offset: u64,
    /// Zip64 locator and record, when present.
    pub zip64: Option<(Zip64Locator, Zip64EndOfCentralDirectory)>,
}

impl EndRecords {
    /// Finds and reads the end records of the archive behind `reader`.
    pub fn locate<R: Read + Seek>(reader: &mut R, layout: &DiskLayout) -> Result<Self> {
        let (eocd_offset, eocd) = find_eocd(reader, layout.total_len())?;
        let locator = read_locator(reader, eocd_offset)?;
        let zip64 = match locator {
            Some(locator) => {
                let at = layout.global(locator.eocd64_disk, locator.eocd64_offset)?;
                if at + ZIP64_EOCD_LEN as u64 > eocd_offset {
                    return Err(Error::corrupt(at, "Zip64 end record overlaps the end of central directory"));
                }
                let mut buf = [0u8; ZIP64_EOCD_LEN];
                reader.seek(SeekFrom::Start(at))?;
                reader
                    .read_exact(&mut buf)
                    .map_err(|_| Error::corrupt(at, "Zip64 end record is truncated"))?;
                Some((locator, Zip64EndOfCentralDirectory::parse(&buf, at)?))
            }
            None => None,
        };
        Ok(Self {
            eocd,
            eocd_offset,
            zip64,
        })
    }

    /// Number of records in the central directory.
    pub fn total_entries(&self) -> u64 {
        match &self.zip64 {
            Some((_, z)) => z.total_entries,
            None => self.eocd.total_entries as u64,
        }
    }

    /// Size of the central directory.
    pub fn cd_size(&self) -> u64 {
        match &self.zip64 {
            Some((_, z)) => z.cd_size,
            None => self.eocd.cd_size as u64,
        }
    }

    /// Disk where the central directory starts.
    pub fn cd_disk(&self) -> u32 {
        match &self.zip64 {
            Some((_, z)) => z.cd_disk,
            None => self.eocd.cd_disk as u32,
        }
    }

    /// Offset of the central directory on [`cd_disk`](Self::cd_disk).
    pub fn cd_offset(&self) -> u64 {
        match &self.zip64 {
            Some((_, z)) => z.cd_offset,
            None => self.eocd.cd_offset as u64,
        }
    }

    /// Number of volumes the archive declares.
    pub fn volume_count(&self) -> u32 {
        match &self.zip64 {
            Some((locator, z)) => locator.total_disks.max(z.disk_number + 1),
            None => self.eocd.disk_number as u32 + 1,
        }
    }

    /// Global offset where the end records begin.
    ///
    /// The central directory must end at or before this point.
    pub fn start_offset(&self) -> u64 {
        if self.zip64.is_some() {
            self.eocd_offset - (ZIP64_EOCD_LEN + ZIP64_LOCATOR_LEN) as u64
        } else {
            self.eocd_offset
        }
    }
}

/// Reads the number of volumes a split archive declares from its last
/// volume alone.
pub fn probe_volume_count<R: Read + Seek>(reader: &mut R) -> Result<u32> {
    let len = reader.seek(SeekFrom::End(0))?;
    let (eocd_offset, eocd) = find_eocd(reader, len)?;
    Ok(match read_locator(reader, eocd_offset)? {
        Some(locator) => locator.total_disks.max(1),
        None => eocd.disk_number as u32 + 1,
    })
}

fn find_eocd<R: Read + Seek>(reader: &mut R, total_len: u64) -> Result<(u64, EndOfCentralDirectory)> {
    if total_len < EOCD_LEN as u64 {
        return Err(Error::InvalidFormat(format!(
            "file is too small to be a zip archive ({} bytes)",
            total_len
        )));
    }
    let window = total_len.min((EOCD_LEN + MAX_COMMENT_LEN) as u64);
    let window_start = total_len - window;
    let mut tail = vec![0u8; window as usize];
    reader.seek(SeekFrom::Start(window_start))?;
    reader.read_exact(&mut tail)?;

    let sig = signature::END_OF_CENTRAL_DIRECTORY.to_le_bytes();
    let mut fallback = None;
    for pos in (0..=tail.len() - EOCD_LEN).rev() {
        if tail[pos..pos + 4] != sig {
            continue;
        }
        let comment_len = u16::from_le_bytes([tail[pos + 20], tail[pos + 21]]) as usize;
        let available = tail.len() - pos - EOCD_LEN;
        if comment_len == available {
            let offset = window_start + pos as u64;
            return Ok((offset, EndOfCentralDirectory::parse(&tail[pos..], offset)?));
        }
        if fallback.is_none() {
            fallback = Some(pos);
        }
    }

    match fallback {
        Some(pos) => {
            let offset = window_start + pos as u64;
            log::warn!(
                "end of central directory at {:#x} does not match the file length, comment is damaged",
                offset
            );
            Ok((offset, EndOfCentralDirectory::parse(&tail[pos..], offset)?))
        }
        None => Err(Error::InvalidFormat(
            "end of central directory record not found".into(),
        )),
    }
}

fn read_locator<R: Read + Seek>(reader: &mut R, eocd_offset: u64) -> Result<Option<Zip64Locator>> {
    if eocd_offset < ZIP64_LOCATOR_LEN as u64 {
        return Ok(None);
    }
    let at = eocd_offset - ZIP64_LOCATOR_LEN as u64;
    let mut buf = [0u8; ZIP64_LOCATOR_LEN];
    reader.seek(SeekFrom::Start(at))?;
    reader.read_exact(&mut buf)?;
    Zip64Locator::parse(&buf, at)
}

/// What a writer knows about the central directory it just wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CentralDirectorySummary {
    /// Records in total.
    pub total_entries: u64,
    /// Records on the last disk.
    pub entries_on_disk: u64,
    /// Size of the central directory.
    pub cd_size: u64,
    /// Disk where the central directory starts.
    pub cd_disk: u32,
    /// Offset of the central directory on `cd_disk`.
    pub cd_offset: u64,
    /// The disk the end records go on.
    pub disk_number: u32,
    /// Offset on `disk_number` where the end records start.
    pub end_offset: u64,
}

impl CentralDirectorySummary {
    /// Returns true if any value overflows the classic record.
    pub fn needs_zip64(&self) -> bool {
        self.total_entries >= ZIP64_U16_SENTINEL as u64
            || self.entries_on_disk >= ZIP64_U16_SENTINEL as u64
            || self.cd_size >= ZIP64_U32_SENTINEL as u64
            || self.cd_offset >= ZIP64_U32_SENTINEL as u64
            || self.cd_disk >= ZIP64_U16_SENTINEL as u32
            || self.disk_number >= ZIP64_U16_SENTINEL as u32
    }

    /// Bytes [`write_end_records`] will produce for a comment of `comment_len`.
    pub fn end_records_len(&self, comment_len: usize) -> u64 {
        let zip64 = if self.needs_zip64() {
            ZIP64_EOCD_LEN + ZIP64_LOCATOR_LEN
        } else {
            0
        };
        (zip64 + EOCD_LEN + comment_len) as u64
    }
}

/// Writes the end records, Zip64 ones included when needed.
pub fn write_end_records<W: Write>(w: &mut W, summary: &CentralDirectorySummary, comment: &[u8]) -> Result<()> {
    if comment.len() > MAX_COMMENT_LEN {
        return Err(Error::InvalidParameter(format!(
            "archive comment is {} bytes, the limit is {}",
            comment.len(),
            MAX_COMMENT_LEN
        )));
    }
    let zip64 = summary.needs_zip64();
    if zip64 {
        Zip64EndOfCentralDirectory {
            version_made_by: version::MADE_BY,
            version_needed: version::ZIP64,
            disk_number: summary.disk_number,
            cd_disk: summary.cd_disk,
            entries_on_disk: summary.entries_on_disk,
            total_entries: summary.total_entries,
            cd_size: summary.cd_size,
            cd_offset: summary.cd_offset,
        }
        .write(w)?;
        Zip64Locator {
            eocd64_disk: summary.disk_number,
            eocd64_offset: summary.end_offset,
            total_disks: summary.disk_number + 1,
        }
        .write(w)?;
    }

    let clamp16 = |v: u64| v.min(ZIP64_U16_SENTINEL as u64) as u16;
    let clamp32 = |v: u64| v.min(ZIP64_U32_SENTINEL as u64) as u32;
    EndOfCentralDirectory {
        disk_number: clamp16(summary.disk_number as u64),
        cd_disk: clamp16(summary.cd_disk as u64),
        entries_on_disk: clamp16(summary.entries_on_disk),
        total_entries: clamp16(summary.total_entries),
        cd_size: clamp32(summary.cd_size),
        cd_offset: clamp32(summary.cd_offset),
        comment: comment.to_vec(),
    }
    .write(w)
}

//! Local file headers, central directory headers and data descriptors.

use std::io::{Read, Write};

use super::extra::{ExtraFields, Zip64Needs, Zip64Values};
use super::reader::{FieldReader, FieldWriter, read_bytes};
use super::{DOS_DIRECTORY_ATTRIBUTE, ZIP64_U16_SENTINEL, ZIP64_U32_SENTINEL, decode_text, flags, signature, version};
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

/// Fixed part of a local file header, signature included.
pub const LOCAL_HEADER_FIXED_LEN: usize = 30;
/// Fixed part of a central directory header, signature included.
pub const CENTRAL_HEADER_FIXED_LEN: usize = 46;

fn saturate_u32(v: u64) -> u32 {
    if v >= ZIP64_U32_SENTINEL as u64 { ZIP64_U32_SENTINEL } else { v as u32 }
}

fn length_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::InvalidParameter(format!("{} is longer than 65535 bytes", what)))
}

/// Header in front of each entry's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose flags.
    pub flags: u16,
    /// Raw compression method number.
    pub method: u16,
    /// Modification time.
    pub modified: DosDateTime,
    /// CRC-32 of the uncompressed data (0 when deferred to a data descriptor).
    pub crc32: u32,
    /// Size of the payload.
    pub compressed_size: u64,
    /// Size of the data after decompression.
    pub uncompressed_size: u64,
    /// Raw name bytes.
    pub name: Vec<u8>,
    /// Extra fields.
    pub extra: ExtraFields,
}

impl LocalFileHeader {
    /// Reads a header at `base` from `reader`.
    ///
    /// Returns the header and its total length, which is where the payload
    /// begins relative to `base`.
    pub fn read<R: Read>(reader: &mut R, base: u64) -> Result<(Self, u64)> {
        let mut fixed = [0u8; LOCAL_HEADER_FIXED_LEN];
        reader
            .read_exact(&mut fixed)
            .map_err(|_| Error::corrupt(base, "local file header is truncated"))?;
        let mut r = FieldReader::new(&fixed, base);
        if r.u32()? != signature::LOCAL_FILE_HEADER {
            return Err(Error::corrupt(base, "expected local file header signature"));
        }
        let version_needed = r.u16()?;
        let flags = r.u16()?;
        let method = r.u16()?;
        let time = r.u16()?;
        let date = r.u16()?;
        let crc32 = r.u32()?;
        let compressed = r.u32()?;
        let uncompressed = r.u32()?;
        let name_len = r.u16()? as usize;
        let extra_len = r.u16()? as usize;

        let name = read_bytes(reader, name_len).map_err(|_| Error::corrupt(base, "local file name is truncated"))?;
        let extra_raw =
            read_bytes(reader, extra_len).map_err(|_| Error::corrupt(base, "local extra field is truncated"))?;

        // Local Zip64 fields carry both sizes whenever either is saturated.
        let zip64_sizes = compressed == ZIP64_U32_SENTINEL || uncompressed == ZIP64_U32_SENTINEL;
        let needs = Zip64Needs {
            uncompressed: zip64_sizes,
            compressed: zip64_sizes,
            ..Default::default()
        };
        let extra_base = base + (LOCAL_HEADER_FIXED_LEN + name_len) as u64;
        let (extra, zip64) = ExtraFields::parse(&extra_raw, extra_base, needs)?;

        let header = Self {
            version_needed,
            flags,
            method,
            modified: DosDateTime::from_parts(date, time),
            crc32,
            compressed_size: zip64.compressed.unwrap_or(compressed as u64),
            uncompressed_size: zip64.uncompressed.unwrap_or(uncompressed as u64),
            name,
            extra,
        };
        Ok((header, (LOCAL_HEADER_FIXED_LEN + name_len + extra_len) as u64))
    }

    fn zip64_values(&self) -> Zip64Values {
        if self.needs_zip64() {
            Zip64Values {
                uncompressed: Some(self.uncompressed_size),
                compressed: Some(self.compressed_size),
                ..Default::default()
            }
        } else {
            Zip64Values::default()
        }
    }

    /// Returns true when the sizes do not fit the 32-bit fields.
    pub fn needs_zip64(&self) -> bool {
        self.compressed_size >= ZIP64_U32_SENTINEL as u64 || self.uncompressed_size >= ZIP64_U32_SENTINEL as u64
    }

    /// Encoded length of the header.
    pub fn encoded_len(&self) -> u64 {
        (LOCAL_HEADER_FIXED_LEN + self.name.len() + self.extra.encoded_len(&self.zip64_values())) as u64
    }

    /// Writes the header.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let zip64 = self.zip64_values();
        let extra = self.extra.encode(&zip64);
        let (compressed, uncompressed) = if self.needs_zip64() {
            (ZIP64_U32_SENTINEL, ZIP64_U32_SENTINEL)
        } else {
            (self.compressed_size as u32, self.uncompressed_size as u32)
        };
        let version_needed = if self.needs_zip64() {
            self.version_needed.max(version::ZIP64)
        } else {
            self.version_needed
        };

        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        buf.put_u32(signature::LOCAL_FILE_HEADER)?;
        buf.put_u16(version_needed)?;
        buf.put_u16(self.flags)?;
        buf.put_u16(self.method)?;
        buf.put_u16(self.modified.time())?;
        buf.put_u16(self.modified.date())?;
        buf.put_u32(self.crc32)?;
        buf.put_u32(compressed)?;
        buf.put_u32(uncompressed)?;
        buf.put_u16(length_u16(self.name.len(), "entry name")?)?;
        buf.put_u16(length_u16(extra.len(), "extra field")?)?;
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&extra);
        w.write_all(&buf)?;
        Ok(())
    }
}

/// One record of the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    /// Version made by.
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose flags.
    pub flags: u16,
    /// Raw compression method number.
    pub method: u16,
    /// Modification time.
    pub modified: DosDateTime,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Size of the payload, encryption overhead included.
    pub compressed_size: u64,
    /// Size of the data after decompression.
    pub uncompressed_size: u64,
    /// Volume that holds the local header.
    pub disk_number_start: u32,
    /// Internal file attributes.
    pub internal_attributes: u16,
    /// External file attributes (DOS attributes low, Unix mode high).
    pub external_attributes: u32,
    /// Offset of the local header, relative to its volume.
    pub local_header_offset: u64,
    /// Raw name bytes.
    pub name: Vec<u8>,
    /// Extra fields.
    pub extra: ExtraFields,
    /// Raw comment bytes.
    pub comment: Vec<u8>,
}

impl CentralDirectoryHeader {
    /// Parses one record from the in-memory central directory.
    pub fn parse(r: &mut FieldReader<'_>) -> Result<Self> {
        let start = r.offset();
        if r.u32()? != signature::CENTRAL_DIRECTORY {
            return Err(Error::corrupt(start, "expected central directory header signature"));
        }
        let version_made_by = r.u16()?;
        let version_needed = r.u16()?;
        let flags = r.u16()?;
        let method = r.u16()?;
        let time = r.u16()?;
        let date = r.u16()?;
        let crc32 = r.u32()?;
        let compressed = r.u32()?;
        let uncompressed = r.u32()?;
        let name_len = r.u16()? as usize;
        let extra_len = r.u16()? as usize;
        let comment_len = r.u16()? as usize;
        let disk = r.u16()?;
        let internal_attributes = r.u16()?;
        let external_attributes = r.u32()?;
        let offset = r.u32()?;
        let name = r.bytes(name_len)?.to_vec();
        let extra_base = r.offset();
        let extra_raw = r.bytes(extra_len)?;
        let comment = r.bytes(comment_len)?.to_vec();

        let needs = Zip64Needs {
            uncompressed: uncompressed == ZIP64_U32_SENTINEL,
            compressed: compressed == ZIP64_U32_SENTINEL,
            offset: offset == ZIP64_U32_SENTINEL,
            disk: disk == ZIP64_U16_SENTINEL,
        };
        let (extra, zip64) = ExtraFields::parse(extra_raw, extra_base, needs)?;

        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            modified: DosDateTime::from_parts(date, time),
            crc32,
            compressed_size: zip64.compressed.unwrap_or(compressed as u64),
            uncompressed_size: zip64.uncompressed.unwrap_or(uncompressed as u64),
            disk_number_start: zip64.disk.unwrap_or(disk as u32),
            internal_attributes,
            external_attributes,
            local_header_offset: zip64.offset.unwrap_or(offset as u64),
            name,
            extra,
            comment,
        })
    }

    fn zip64_values(&self) -> Zip64Values {
        let big = |v: u64| (v >= ZIP64_U32_SENTINEL as u64).then_some(v);
        Zip64Values {
            uncompressed: big(self.uncompressed_size),
            compressed: big(self.compressed_size),
            offset: big(self.local_header_offset),
            disk: (self.disk_number_start >= ZIP64_U16_SENTINEL as u32).then_some(self.disk_number_start),
        }
    }

    /// Encoded length of the record.
    pub fn encoded_len(&self) -> u64 {
        (CENTRAL_HEADER_FIXED_LEN
            + self.name.len()
            + self.extra.encoded_len(&self.zip64_values())
            + self.comment.len()) as u64
    }

    /// Writes the record.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let zip64 = self.zip64_values();
        let extra = self.extra.encode(&zip64);
        let uses_zip64 = zip64 != Zip64Values::default();
        let version_needed = if uses_zip64 {
            self.version_needed.max(version::ZIP64)
        } else {
            self.version_needed
        };
        let disk = if self.disk_number_start >= ZIP64_U16_SENTINEL as u32 {
            ZIP64_U16_SENTINEL
        } else {
            self.disk_number_start as u16
        };

        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        buf.put_u32(signature::CENTRAL_DIRECTORY)?;
        buf.put_u16(self.version_made_by)?;
        buf.put_u16(version_needed)?;
        buf.put_u16(self.flags)?;
        buf.put_u16(self.method)?;
        buf.put_u16(self.modified.time())?;
        buf.put_u16(self.modified.date())?;
        buf.put_u32(self.crc32)?;
        buf.put_u32(saturate_u32(self.compressed_size))?;
        buf.put_u32(saturate_u32(self.uncompressed_size))?;
        buf.put_u16(length_u16(self.name.len(), "entry name")?)?;
        buf.put_u16(length_u16(extra.len(), "extra field")?)?;
        buf.put_u16(length_u16(self.comment.len(), "entry comment")?)?;
        buf.put_u16(disk)?;
        buf.put_u16(self.internal_attributes)?;
        buf.put_u32(self.external_attributes)?;
        buf.put_u32(saturate_u32(self.local_header_offset))?;
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&extra);
        buf.extend_from_slice(&self.comment);
        w.write_all(&buf)?;
        Ok(())
    }

    /// Decoded entry name.
    pub fn name_str(&self) -> String {
        decode_text(&self.name, self.flags & flags::UTF8 != 0)
    }

    /// Decoded entry comment.
    pub fn comment_str(&self) -> String {
        decode_text(&self.comment, self.flags & flags::UTF8 != 0)
    }

    /// Returns true for directory entries.
    pub fn is_directory(&self) -> bool {
        self.name.last() == Some(&b'/') || self.external_attributes & DOS_DIRECTORY_ATTRIBUTE != 0
    }

    /// Returns true if the encrypted flag is set.
    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    /// Returns true if sizes and CRC follow the payload.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & flags::DATA_DESCRIPTOR != 0
    }

    /// Builds the matching local header.
    ///
    /// Sizes and CRC are always filled in, even when the entry also carries a
    /// data descriptor.
    pub fn local_header(&self) -> LocalFileHeader {
        LocalFileHeader {
            version_needed: self.version_needed,
            flags: self.flags,
            method: self.method,
            modified: self.modified,
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            name: self.name.clone(),
            extra: self.extra.clone(),
        }
    }
}

/// Sizes and CRC written after a payload when flag bit 3 is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Size of the payload.
    pub compressed_size: u64,
    /// Size of the data after decompression.
    pub uncompressed_size: u64,
}

impl DataDescriptor {
    /// Returns true when the sizes need the 8-byte form.
    pub fn needs_zip64(&self) -> bool {
        self.compressed_size >= ZIP64_U32_SENTINEL as u64 || self.uncompressed_size >= ZIP64_U32_SENTINEL as u64
    }

    /// Encoded length, signature included.
    pub fn encoded_len(&self) -> u64 {
        if self.needs_zip64() { 24 } else { 16 }
    }

    /// Writes the descriptor with its optional signature.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        buf.put_u32(signature::DATA_DESCRIPTOR)?;
        buf.put_u32(self.crc32)?;
        if self.needs_zip64() {
            buf.put_u64(self.compressed_size)?;
            buf.put_u64(self.uncompressed_size)?;
        } else {
            buf.put_u32(self.compressed_size as u32)?;
            buf.put_u32(self.uncompressed_size as u32)?;
        }
        w.write_all(&buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_central() -> CentralDirectoryHeader {
        CentralDirectoryHeader {
            version_made_by: version::MADE_BY,
            version_needed: version::DEFLATE,
            flags: flags::UTF8,
            method: 8,
            modified: DosDateTime::new(2024, 5, 6, 7, 8, 10).unwrap(),
            crc32: 0x1234_5678,
            compressed_size: 40,
            uncompressed_size: 100,
            disk_number_start: 0,
            internal_attributes: 0,
            external_attributes: 0o100644 << 16,
            local_header_offset: 1234,
            name: "dir/файл.txt".as_bytes().to_vec(),
            extra: ExtraFields {
                modified_unix: Some(1_714_979_290),
                ..Default::default()
            },
            comment: b"note".to_vec(),
        }
    }

    #[test]
    fn test_central_roundtrip() {
        let header = sample_central();
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, header.encoded_len());
        let parsed = CentralDirectoryHeader::parse(&mut FieldReader::new(&buf, 0)).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.name_str(), "dir/файл.txt");
        assert_eq!(parsed.comment_str(), "note");
        assert!(!parsed.is_directory());
    }

    #[test]
    fn test_central_zip64_roundtrip() {
        let mut header = sample_central();
        header.uncompressed_size = 6_000_000_000;
        header.local_header_offset = 5_000_000_000;
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let parsed = CentralDirectoryHeader::parse(&mut FieldReader::new(&buf, 0)).unwrap();
        assert_eq!(parsed.uncompressed_size, 6_000_000_000);
        assert_eq!(parsed.compressed_size, 40);
        assert_eq!(parsed.local_header_offset, 5_000_000_000);
        assert_eq!(parsed.version_needed, version::ZIP64);
    }

    #[test]
    fn test_local_roundtrip_reports_length() {
        let local = sample_central().local_header();
        let mut buf = Vec::new();
        local.write(&mut buf).unwrap();
        buf.extend_from_slice(b"payload");
        let mut cursor = Cursor::new(&buf);
        let (parsed, len) = LocalFileHeader::read(&mut cursor, 0).unwrap();
        assert_eq!(parsed, local);
        assert_eq!(len, local.encoded_len());
        assert_eq!(&buf[len as usize..], b"payload");
    }

    #[test]
    fn test_local_zip64_sizes() {
        let mut local = sample_central().local_header();
        local.compressed_size = 4_294_967_295;
        let mut buf = Vec::new();
        local.write(&mut buf).unwrap();
        let (parsed, _) = LocalFileHeader::read(&mut Cursor::new(&buf), 0).unwrap();
        assert_eq!(parsed.compressed_size, 4_294_967_295);
        assert_eq!(parsed.uncompressed_size, 100);
    }

    #[test]
    fn test_bad_signature() {
        let buf = [0u8; CENTRAL_HEADER_FIXED_LEN];
        let err = CentralDirectoryHeader::parse(&mut FieldReader::new(&buf, 0x99)).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { offset: 0x99, .. }));
    }

    #[test]
    fn test_directory_detection() {
        let mut header = sample_central();
        header.name = b"folder/".to_vec();
        assert!(header.is_directory());
        header.name = b"folder".to_vec();
        header.external_attributes = DOS_DIRECTORY_ATTRIBUTE;
        assert!(header.is_directory());
    }

    #[test]
    fn test_data_descriptor_lengths() {
        let small = DataDescriptor {
            crc32: 1,
            compressed_size: 2,
            uncompressed_size: 3,
        };
        let mut buf = Vec::new();
        small.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[..4], &signature::DATA_DESCRIPTOR.to_le_bytes());

        let big = DataDescriptor {
            uncompressed_size: u64::from(u32::MAX) + 1,
            ..small
        };
        assert_eq!(big.encoded_len(), 24);
    }
}

//! Archive entry type.

use std::time::SystemTime;

use crate::codec::{CompressionMethod, method};
use crate::crypto::EncryptionMethod;
use crate::format::{CentralDirectoryHeader, DiskLayout};
use crate::timestamp::DosDateTime;
use crate::Result;

/// Host id of Unix in the "version made by" field.
const HOST_UNIX: u16 = 3;

/// An entry in a zip archive, as described by its central directory record.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future versions without breaking downstream code. Pattern matching
/// on `Entry` requires a `..` wildcard.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Entry {
    /// Name as stored in the archive, directories keep their trailing `/`.
    ///
    /// Names come from the archive and are not validated; see
    /// [`safety`](crate::safety) for how extraction treats them.
    pub name: String,
    /// Position in the central directory.
    pub index: usize,
    /// Whether this entry is a directory.
    pub is_directory: bool,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Size of the stored payload, encryption overhead included.
    pub compressed_size: u64,
    /// CRC-32 of the uncompressed data. `0` for AE-2 encrypted entries,
    /// which authenticate their data with a MAC instead.
    pub crc32: u32,
    /// Modification time in DOS format.
    pub modified_dos: DosDateTime,
    /// Modification time from the extended timestamp field, if present.
    pub modified_unix: Option<i64>,
    /// Compression method code of the data, after unwrapping AES.
    pub method: u16,
    /// Encryption method.
    pub encryption: EncryptionMethod,
    /// Entry comment.
    pub comment: String,
    /// External file attributes.
    pub external_attributes: u32,
    pub(crate) record: CentralDirectoryHeader,
    /// Global offset of the local header.
    pub(crate) header_offset: u64,
}

impl Entry {
    /// Builds an entry from its central directory record.
    pub(crate) fn from_record(index: usize, record: CentralDirectoryHeader, layout: &DiskLayout) -> Result<Self> {
        let header_offset = layout.global(record.disk_number_start, record.local_header_offset)?;
        let (method, encryption) = match (&record.extra.aes, record.is_encrypted()) {
            (Some(aes), true) if record.method == method::AES => {
                (aes.compression_method, EncryptionMethod::Aes(aes.strength))
            }
            (_, true) => (record.method, EncryptionMethod::ZipCrypto),
            (_, false) => (record.method, EncryptionMethod::None),
        };
        Ok(Self {
            name: record.name_str(),
            index,
            is_directory: record.is_directory(),
            size: record.uncompressed_size,
            compressed_size: record.compressed_size,
            crc32: record.crc32,
            modified_dos: record.modified,
            modified_unix: record.extra.modified_unix,
            method,
            encryption,
            comment: record.comment_str(),
            external_attributes: record.external_attributes,
            header_offset,
            record,
        })
    }

    /// Returns true if this is a file (not a directory).
    pub fn is_file(&self) -> bool {
        !self.is_directory
    }

    /// Returns true if the entry data is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_encrypted()
    }

    /// Last path segment of the name.
    pub fn file_name(&self) -> &str {
        self.name.trim_end_matches('/').rsplit('/').next().unwrap_or(&self.name)
    }

    /// Modification time, preferring the extended timestamp.
    pub fn modified(&self) -> Option<SystemTime> {
        match self.modified_unix {
            Some(secs) if secs >= 0 => Some(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(secs as u64)),
            Some(secs) => SystemTime::UNIX_EPOCH.checked_sub(std::time::Duration::from_secs(secs.unsigned_abs())),
            None => self.modified_dos.to_system_time(),
        }
    }

    /// Compression method of the data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`](crate::Error::UnsupportedMethod)
    /// for methods other than Store and Deflate.
    pub fn compression_method(&self) -> Result<CompressionMethod> {
        CompressionMethod::from_code(self.method)
    }

    /// Unix mode bits, when the entry was made on a Unix host.
    pub fn unix_mode(&self) -> Option<u32> {
        let mode = self.external_attributes >> 16;
        (self.record.version_made_by >> 8 == HOST_UNIX && mode != 0).then_some(mode)
    }

    /// Compressed size over uncompressed size, `1.0` for empty entries.
    pub fn compression_ratio(&self) -> f64 {
        if self.size == 0 {
            1.0
        } else {
            self.compressed_size as f64 / self.size as f64
        }
    }

    /// Returns true if the stored CRC is meaningful and should be checked.
    pub(crate) fn has_crc(&self) -> bool {
        use crate::crypto::AesVersion;
        match &self.record.extra.aes {
            Some(aes) if self.encryption != EncryptionMethod::ZipCrypto => aes.version == AesVersion::Ae1,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{AesExtraField, AesStrength, AesVersion};
    use crate::format::{ExtraFields, flags, version};

    fn record(name: &str) -> CentralDirectoryHeader {
        CentralDirectoryHeader {
            version_made_by: version::MADE_BY,
            version_needed: version::DEFAULT,
            flags: flags::UTF8,
            method: method::DEFLATED,
            modified: DosDateTime::MIN,
            crc32: 0x1234,
            compressed_size: 50,
            uncompressed_size: 100,
            disk_number_start: 0,
            internal_attributes: 0,
            external_attributes: 0o100640 << 16,
            local_header_offset: 10,
            name: name.as_bytes().to_vec(),
            extra: ExtraFields::default(),
            comment: b"note".to_vec(),
        }
    }

    #[test]
    fn test_plain_entry() {
        let entry = Entry::from_record(3, record("docs/a.txt"), &DiskLayout::single(1000)).unwrap();
        assert_eq!(entry.name, "docs/a.txt");
        assert_eq!(entry.file_name(), "a.txt");
        assert_eq!(entry.index, 3);
        assert_eq!(entry.header_offset, 10);
        assert_eq!(entry.compression_method().unwrap(), CompressionMethod::Deflate);
        assert_eq!(entry.encryption, EncryptionMethod::None);
        assert_eq!(entry.unix_mode(), Some(0o100640));
        assert_eq!(entry.comment, "note");
        assert!((entry.compression_ratio() - 0.5).abs() < f64::EPSILON);
        assert!(entry.has_crc());
    }

    #[test]
    fn test_aes_entry_unwraps_method() {
        let mut rec = record("secret.bin");
        rec.flags |= flags::ENCRYPTED;
        rec.method = method::AES;
        rec.extra.aes = Some(AesExtraField {
            version: AesVersion::Ae2,
            strength: AesStrength::Aes128,
            compression_method: method::STORED,
        });
        let entry = Entry::from_record(0, rec, &DiskLayout::single(1000)).unwrap();
        assert_eq!(entry.encryption, EncryptionMethod::AES_128);
        assert_eq!(entry.compression_method().unwrap(), CompressionMethod::Store);
        assert!(!entry.has_crc());
    }

    #[test]
    fn test_zipcrypto_and_directory() {
        let mut rec = record("dir/");
        rec.flags |= flags::ENCRYPTED;
        let entry = Entry::from_record(0, rec, &DiskLayout::single(1000)).unwrap();
        assert!(entry.is_directory);
        assert_eq!(entry.file_name(), "dir");
        assert_eq!(entry.encryption, EncryptionMethod::ZipCrypto);
    }

    #[test]
    fn test_offset_outside_archive() {
        assert!(Entry::from_record(0, record("a"), &DiskLayout::single(5)).is_err());
    }

    #[test]
    fn test_modified_prefers_unix_time() {
        let mut rec = record("a");
        rec.extra.modified_unix = Some(1_000_000_000);
        let entry = Entry::from_record(0, rec, &DiskLayout::single(1000)).unwrap();
        assert_eq!(
            entry.modified().unwrap(),
            SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000)
        );
    }
}

//! Entry compression and encryption pipeline.
//!
//! Data flows source -> CRC -> encoder -> encryption -> spool. The spool is
//! a [`SpooledTempFile`] that stays in memory for small entries and moves to
//! disk for large ones. Sizes and CRC are therefore known before the local
//! header is written, and no data descriptor is needed.

use std::fs::Metadata;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

use tempfile::SpooledTempFile;

use super::ZipParameters;
use crate::checksum::Crc32;
use crate::codec::{CompressionMethod, build_encoder, method};
use crate::crypto::zipcrypto::{self, ZipCryptoKeys, ZipCryptoWriter};
use crate::crypto::{AesExtraField, EncryptionMethod, Password};
use crate::format::{DOS_DIRECTORY_ATTRIBUTE, flags, version};
use crate::progress::{CHUNK_SIZE, WorkTracker};
use crate::{Error, Result};

/// Entries up to this size are compressed in memory.
const SPOOL_MEMORY_LIMIT: usize = 8 * 1024 * 1024;

/// Unix mode of entries added without a source file.
const DEFAULT_FILE_MODE: u32 = 0o100644;
const DEFAULT_DIR_MODE: u32 = 0o040755;

/// Metadata of an entry being written.
#[derive(Debug, Clone, Default)]
pub struct EntryMeta {
    /// Whether this is a directory.
    pub is_directory: bool,
    /// Expected size, used for progress reporting only.
    pub size: u64,
    /// Modification time; now when absent.
    pub modified: Option<SystemTime>,
    /// Unix mode bits (type and permissions).
    pub unix_mode: Option<u32>,
}

impl EntryMeta {
    /// Metadata for a file of `size` bytes.
    pub fn file(size: u64) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Metadata for a directory.
    pub fn directory() -> Self {
        Self {
            is_directory: true,
            ..Default::default()
        }
    }

    /// Captures metadata of a file on disk.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            is_directory: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified: metadata.modified().ok(),
            unix_mode: unix_mode(metadata),
        }
    }

    pub(crate) fn external_attributes(&self) -> u32 {
        let mode = self.unix_mode.unwrap_or(if self.is_directory {
            DEFAULT_DIR_MODE
        } else {
            DEFAULT_FILE_MODE
        });
        let dos = if self.is_directory { DOS_DIRECTORY_ATTRIBUTE } else { 0 };
        (mode << 16) | dos
    }
}

#[cfg(unix)]
fn unix_mode(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &Metadata) -> Option<u32> {
    None
}

/// A compressed and possibly encrypted payload ready to be written.
pub(crate) struct PreparedEntry {
    pub payload: SpooledTempFile,
    pub crc32: u32,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    /// Method stored in the headers (99 for AES).
    pub header_method: u16,
    pub flags: u16,
    pub version_needed: u16,
    pub aes: Option<AesExtraField>,
}

/// Compresses `source` into `out`, returning CRC and uncompressed size.
fn compress_into<W: Write + Send>(
    source: &mut dyn Read,
    out: &mut W,
    params: &ZipParameters,
    tracker: &mut WorkTracker<'_>,
) -> Result<(u32, u64)> {
    let mut encoder = build_encoder(params.compression_method(), params.compression_level(), out)?;
    let mut crc = Crc32::new();
    let mut total = 0u64;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(crate::error::map_io_error(e)),
        };
        crc.update(&buf[..n]);
        encoder.write_all(&buf[..n])?;
        total += n as u64;
        tracker.advance(n as u64)?;
    }
    encoder.finish()?;
    Ok((crc.finalize(), total))
}

/// Runs `source` through compression and encryption.
pub(crate) fn prepare_entry(
    source: &mut dyn Read,
    params: &ZipParameters,
    password: Option<&Password>,
    tracker: &mut WorkTracker<'_>,
) -> Result<PreparedEntry> {
    let compression = params.compression_method();
    let mut entry_flags = flags::UTF8;
    if compression == CompressionMethod::Deflate {
        entry_flags |= params.compression_level().deflate_flag_bits();
    }
    let base_version = match compression {
        CompressionMethod::Store => version::DEFAULT,
        CompressionMethod::Deflate => version::DEFLATE,
    };

    let encryption = params.encryption_method();
    let password = match (encryption, password) {
        (EncryptionMethod::None, _) => None,
        (_, Some(password)) => Some(password),
        (_, None) => {
            return Err(Error::InvalidParameter(format!(
                "{} encryption requested but no password is set",
                encryption
            )));
        }
    };

    let mut spool = SpooledTempFile::new(SPOOL_MEMORY_LIMIT);
    let prepared = match (encryption, password) {
        (EncryptionMethod::ZipCrypto, Some(password)) => {
            let mut plain = SpooledTempFile::new(SPOOL_MEMORY_LIMIT);
            let (crc32, size) = compress_into(source, &mut plain, params, tracker)?;
            let mut keys = ZipCryptoKeys::new(password.as_bytes());
            let header = zipcrypto::encryption_header(&mut keys, (crc32 >> 24) as u8)?;
            spool.write_all(&header)?;
            plain.seek(SeekFrom::Start(0))?;
            let mut writer = ZipCryptoWriter::new(&mut spool, keys);
            copy_with_checkpoints(&mut plain, &mut writer, tracker)?;
            PreparedEntry {
                payload: spool,
                crc32,
                uncompressed_size: size,
                compressed_size: 0,
                header_method: compression.code(),
                flags: entry_flags | flags::ENCRYPTED,
                version_needed: base_version.max(version::DEFLATE),
                aes: None,
            }
        }
        #[cfg(feature = "aes")]
        (EncryptionMethod::Aes(strength), Some(password)) => {
            use crate::crypto::AesVersion;
            use crate::crypto::winzip_aes::{AesWriter, prepare_encryption};
            let (salt, keys) = prepare_encryption(password.as_bytes(), strength)?;
            spool.write_all(&salt)?;
            spool.write_all(&keys.verifier())?;
            let mut writer = AesWriter::new(&mut spool, &keys)?;
            let (_crc32, size) = compress_into(source, &mut writer, params, tracker)?;
            writer.finish()?;
            // AE-2: the CRC is left out, the authentication code replaces it.
            PreparedEntry {
                payload: spool,
                crc32: 0,
                uncompressed_size: size,
                compressed_size: 0,
                header_method: method::AES,
                flags: entry_flags | flags::ENCRYPTED,
                version_needed: version::AES,
                aes: Some(AesExtraField {
                    version: AesVersion::Ae2,
                    strength,
                    compression_method: compression.code(),
                }),
            }
        }
        #[cfg(not(feature = "aes"))]
        (EncryptionMethod::Aes(_), Some(_)) => {
            return Err(Error::UnsupportedFeature {
                feature: "AES encryption (enable the `aes` feature)",
            });
        }
        _ => {
            let (crc32, size) = compress_into(source, &mut spool, params, tracker)?;
            PreparedEntry {
                payload: spool,
                crc32,
                uncompressed_size: size,
                compressed_size: 0,
                header_method: compression.code(),
                flags: entry_flags,
                version_needed: base_version,
                aes: None,
            }
        }
    };
    finish_spool(prepared)
}

fn finish_spool(mut prepared: PreparedEntry) -> Result<PreparedEntry> {
    prepared.compressed_size = prepared.payload.seek(SeekFrom::End(0))?;
    prepared.payload.seek(SeekFrom::Start(0))?;
    Ok(prepared)
}

fn copy_with_checkpoints<R: Read, W: Write>(reader: &mut R, writer: &mut W, tracker: &WorkTracker<'_>) -> Result<()> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n])?;
        tracker.checkpoint()?;
    }
}

//! Streaming decompression of a single entry.
//!
//! The reader is a stack of adapters over the entry's payload window:
//!
//! ```text
//! volumes -> decryption -> decoder -> size limit -> error mapping -> CRC check
//! ```
//!
//! Encrypted entries are checked before any plaintext is produced: the
//! ZipCrypto check byte or the AES verifier, and for AES the full
//! authentication code.

use std::io::{self, BufReader, Read, Seek, SeekFrom};

use crate::checksum::{CrcCheck, CrcReader};
use crate::codec::build_decoder;
use crate::crypto::zipcrypto::{self, ZipCryptoKeys, ZipCryptoReader};
use crate::crypto::{EncryptionMethod, Password};
use crate::error::{PasswordDetectionMethod, into_io_error, map_io_error};
use crate::format::LocalFileHeader;
use crate::safety::LimitedReader;
use crate::volume::{VolumeReader, VolumeSet};
use crate::{Entry, Error, READ_BUFFER_SIZE, Result};

/// Sequential reader over the decompressed data of one entry.
///
/// Each reader owns its own file handle; several readers over the same
/// archive can be used at the same time. Errors surface as [`io::Error`]
/// wrapping a crate [`Error`]; use [`map_io_error`](crate::error::map_io_error)
/// to recover it.
///
/// After the last byte, `read` returns `Ok(0)` indefinitely. The CRC or
/// authentication failure, if any, is reported by the read that reaches the
/// end of the data.
///
/// ZipCrypto checks the password against a single header byte, so a wrong
/// password slips past that check about once in 256 tries. A streaming
/// caller then receives garbage until the final read reports
/// [`Error::WrongPassword`]; discard everything read when that happens.
/// [`ZipFile::extract_data`](crate::ZipFile::extract_data) and file
/// extraction buffer the data and never hand out unverified bytes.
pub struct EntryReader {
    inner: Box<dyn Read + Send>,
    name: String,
    size: u64,
}

impl EntryReader {
    /// Name of the entry being read.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed size of the entry.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl std::fmt::Debug for EntryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryReader")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

fn require_password<'a>(entry: &Entry, password: Option<&'a Password>) -> Result<&'a Password> {
    match password {
        Some(password) if !password.is_empty() => Ok(password),
        _ => Err(Error::PasswordRequired {
            entry_name: entry.name.clone(),
        }),
    }
}

/// The byte the ZipCrypto header is checked against.
///
/// Writers that stream with a data descriptor do not know the CRC up front
/// and use the high byte of the DOS time instead.
fn zipcrypto_check_byte(entry: &Entry) -> u8 {
    if entry.record.has_data_descriptor() {
        (entry.modified_dos.time() >> 8) as u8
    } else {
        (entry.crc32 >> 24) as u8
    }
}

/// Positions `reader` at the payload and returns its global offset.
fn seek_payload(reader: &mut VolumeReader, entry: &Entry) -> Result<u64> {
    reader.seek(SeekFrom::Start(entry.header_offset))?;
    let (local, header_len) = LocalFileHeader::read(reader, entry.header_offset)?;
    if local.name != entry.record.name {
        log::warn!(
            "local header of '{}' carries a different name '{}'",
            entry.name,
            String::from_utf8_lossy(&local.name)
        );
    }
    let data_start = entry.header_offset + header_len;
    reader.seek(SeekFrom::Start(data_start))?;
    Ok(data_start)
}

/// Opens a decrypting, decompressing reader over `entry`.
///
/// `on_auth_chunk` is called during the AES authentication pass and may
/// abort it.
pub(crate) fn open_entry(
    volumes: &VolumeSet,
    entry: &Entry,
    password: Option<&Password>,
    on_auth_chunk: &mut dyn FnMut(usize) -> Result<()>,
) -> Result<EntryReader> {
    if entry.is_directory {
        return Ok(EntryReader {
            inner: Box::new(io::empty()),
            name: entry.name.clone(),
            size: 0,
        });
    }
    let method = entry.compression_method()?;
    let mut reader = volumes.reader();
    let data_start = seek_payload(&mut reader, entry)?;
    log::debug!(
        "opening '{}' ({}, {}, {} bytes)",
        entry.name,
        method.name(),
        entry.encryption,
        entry.size
    );

    let payload: Box<dyn Read + Send> = match entry.encryption {
        EncryptionMethod::None => Box::new(reader.take(entry.compressed_size)),
        EncryptionMethod::ZipCrypto => {
            let password = require_password(entry, password)?;
            let mut payload = reader.take(entry.compressed_size);
            let mut keys = ZipCryptoKeys::new(password.as_bytes());
            if !zipcrypto::read_and_verify_header(&mut payload, &mut keys, zipcrypto_check_byte(entry))? {
                return Err(Error::wrong_password(
                    &entry.name,
                    PasswordDetectionMethod::VerifierMismatch,
                ));
            }
            Box::new(ZipCryptoReader::new(payload, keys))
        }
        EncryptionMethod::Aes(strength) => {
            let password = require_password(entry, password)?;
            open_aes(reader, data_start, entry, strength, password, on_auth_chunk)?
        }
    };

    let zipcrypto = entry.encryption == EncryptionMethod::ZipCrypto;
    let decoder = build_decoder(method, BufReader::with_capacity(READ_BUFFER_SIZE, payload), entry.size)?;
    let limited = LimitedReader::new(decoder, entry.size, entry.name.clone());
    let mapped = DecodeErrors {
        inner: limited,
        entry_name: entry.name.clone(),
        zipcrypto,
    };
    let name = entry.name.clone();
    let checked = CrcReader::new(mapped, entry.has_crc().then_some(entry.crc32), move |check: CrcCheck| {
        into_io_error(if zipcrypto {
            Error::wrong_password(&name, PasswordDetectionMethod::CrcMismatch)
        } else {
            Error::CrcMismatch {
                entry_name: name.clone(),
                expected: check.expected,
                actual: check.actual,
            }
        })
    });
    Ok(EntryReader {
        inner: Box::new(checked),
        name: entry.name.clone(),
        size: entry.size,
    })
}

#[cfg(feature = "aes")]
fn open_aes(
    mut reader: VolumeReader,
    data_start: u64,
    entry: &Entry,
    strength: crate::crypto::AesStrength,
    password: &Password,
    on_auth_chunk: &mut dyn FnMut(usize) -> Result<()>,
) -> Result<Box<dyn Read + Send>> {
    use crate::crypto::winzip_aes::{AUTH_CODE_LEN, AesKeys, AesReader, VERIFIER_LEN, verify_authentication};

    let salt_len = strength.salt_len();
    let prefix = (salt_len + VERIFIER_LEN) as u64;
    let ciphertext_len = entry
        .compressed_size
        .checked_sub(prefix + AUTH_CODE_LEN as u64)
        .ok_or_else(|| {
            Error::corrupt(
                entry.header_offset,
                format!("AES entry '{}' is shorter than its encryption overhead", entry.name),
            )
        })?;

    let mut header = vec![0u8; salt_len + VERIFIER_LEN];
    reader.read_exact(&mut header)?;
    let keys = AesKeys::derive(password.as_bytes(), &header[..salt_len], strength)?;
    if keys.verifier()[..] != header[salt_len..] {
        return Err(Error::wrong_password(
            &entry.name,
            PasswordDetectionMethod::VerifierMismatch,
        ));
    }

    let mut auth_code = [0u8; AUTH_CODE_LEN];
    reader.seek(SeekFrom::Start(data_start + prefix + ciphertext_len))?;
    reader.read_exact(&mut auth_code)?;
    reader.seek(SeekFrom::Start(data_start + prefix))?;
    if !verify_authentication(&mut reader, ciphertext_len, &keys, &auth_code, |n| on_auth_chunk(n))? {
        return Err(Error::AuthenticationFailed {
            entry_name: entry.name.clone(),
        });
    }
    reader.seek(SeekFrom::Start(data_start + prefix))?;
    Ok(Box::new(AesReader::new(reader.take(ciphertext_len), &keys)?))
}

#[cfg(not(feature = "aes"))]
fn open_aes(
    _reader: VolumeReader,
    _data_start: u64,
    _entry: &Entry,
    _strength: crate::crypto::AesStrength,
    _password: &Password,
    _on_auth_chunk: &mut dyn FnMut(usize) -> Result<()>,
) -> Result<Box<dyn Read + Send>> {
    Err(Error::UnsupportedFeature {
        feature: "AES decryption (enable the `aes` feature)",
    })
}

/// Turns raw decoder failures into archive errors.
///
/// Under ZipCrypto a wrong password that slips past the one-byte check
/// produces garbage the decoder rejects, so those failures mean a wrong
/// password rather than corrupt data.
struct DecodeErrors<R> {
    inner: R,
    entry_name: String,
    zipcrypto: bool,
}

impl<R: Read> Read for DecodeErrors<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|e| {
            let decode_failure = matches!(
                e.kind(),
                io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof
            );
            into_io_error(match map_io_error(e) {
                Error::Io(_) if self.zipcrypto && decode_failure => {
                    Error::wrong_password(&self.entry_name, PasswordDetectionMethod::DecompressionFailure)
                }
                Error::ResourceLimitExceeded(_) if self.zipcrypto => {
                    Error::wrong_password(&self.entry_name, PasswordDetectionMethod::DecompressionFailure)
                }
                Error::Io(io) if decode_failure && io.kind() != io::ErrorKind::UnexpectedEof => {
                    Error::InvalidFormat(format!("entry '{}' has corrupt data: {}", self.entry_name, io))
                }
                other => other,
            })
        })
    }
}

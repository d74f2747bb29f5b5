//! Traditional PKWARE encryption ("ZipCrypto").
//!
//! A byte-oriented stream cipher driven by three 32-bit keys that are
//! updated with the CRC-32 step function. Every encrypted entry starts with
//! a 12-byte header: eleven random bytes and one check byte that lets a
//! reader reject most wrong passwords before decrypting anything else.
//!
//! The cipher is weak and only exists for compatibility. Prefer WinZip AES.

use std::io::{self, Read, Write};

use zeroize::Zeroize;

use crate::crypto::fill_random;
use crate::{Error, Result};

/// Length of the encryption header that precedes the payload.
pub const HEADER_LEN: usize = 12;

const CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
};

#[inline]
fn crc_step(crc: u32, byte: u8) -> u32 {
    CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
}

/// The three-key cipher state.
#[derive(Clone)]
pub struct ZipCryptoKeys {
    key0: u32,
    key1: u32,
    key2: u32,
}

impl std::fmt::Debug for ZipCryptoKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipCryptoKeys").finish_non_exhaustive()
    }
}

impl Drop for ZipCryptoKeys {
    fn drop(&mut self) {
        self.key0.zeroize();
        self.key1.zeroize();
        self.key2.zeroize();
    }
}

impl ZipCryptoKeys {
    /// Initializes the keys from a password.
    pub fn new(password: &[u8]) -> Self {
        let mut keys = Self {
            key0: 0x1234_5678,
            key1: 0x2345_6789,
            key2: 0x3456_7890,
        };
        for &b in password {
            keys.update(b);
        }
        keys
    }

    fn update(&mut self, plain: u8) {
        self.key0 = crc_step(self.key0, plain);
        self.key1 = self
            .key1
            .wrapping_add(self.key0 & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.key2 = crc_step(self.key2, (self.key1 >> 24) as u8);
    }

    #[inline]
    fn keystream_byte(&self) -> u8 {
        let t = (self.key2 | 2) as u16;
        (t.wrapping_mul(t ^ 1) >> 8) as u8
    }

    /// Decrypts one byte.
    #[inline]
    pub fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.keystream_byte();
        self.update(plain);
        plain
    }

    /// Encrypts one byte.
    #[inline]
    pub fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.keystream_byte();
        self.update(plain);
        cipher
    }

    /// Decrypts a buffer in place.
    pub fn decrypt(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.decrypt_byte(*b);
        }
    }

    /// Encrypts a buffer in place.
    pub fn encrypt(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.encrypt_byte(*b);
        }
    }
}

/// Builds an encrypted 12-byte header ending in `check_byte`.
///
/// `keys` must be fresh; afterwards they are positioned for the payload.
pub fn encryption_header(keys: &mut ZipCryptoKeys, check_byte: u8) -> Result<[u8; HEADER_LEN]> {
    let mut header = [0u8; HEADER_LEN];
    fill_random(&mut header[..HEADER_LEN - 1])?;
    header[HEADER_LEN - 1] = check_byte;
    keys.encrypt(&mut header);
    Ok(header)
}

/// Decrypts a header and compares its last byte with `check_byte`.
///
/// `keys` must be fresh; afterwards they are positioned for the payload.
pub fn verify_header(keys: &mut ZipCryptoKeys, mut header: [u8; HEADER_LEN], check_byte: u8) -> bool {
    keys.decrypt(&mut header);
    header[HEADER_LEN - 1] == check_byte
}

/// Reads and checks the encryption header from `reader`.
pub(crate) fn read_and_verify_header<R: Read>(
    reader: &mut R,
    keys: &mut ZipCryptoKeys,
    check_byte: u8,
) -> Result<bool> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            Error::InvalidFormat("encrypted entry shorter than its encryption header".into())
        }
        _ => Error::Io(e),
    })?;
    Ok(verify_header(keys, header, check_byte))
}

/// Reader that decrypts a ZipCrypto payload (after the header).
pub struct ZipCryptoReader<R> {
    inner: R,
    keys: ZipCryptoKeys,
}

impl<R: Read> ZipCryptoReader<R> {
    /// Wraps `inner` with keys already positioned past the header.
    pub fn new(inner: R, keys: ZipCryptoKeys) -> Self {
        Self { inner, keys }
    }
}

impl<R: Read> Read for ZipCryptoReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.keys.decrypt(&mut buf[..n]);
        Ok(n)
    }
}

/// Writer that encrypts a payload (after the header).
pub struct ZipCryptoWriter<W> {
    inner: W,
    keys: ZipCryptoKeys,
    scratch: Vec<u8>,
}

impl<W: Write> ZipCryptoWriter<W> {
    /// Wraps `inner` with keys already positioned past the header.
    pub fn new(inner: W, keys: ZipCryptoKeys) -> Self {
        Self {
            inner,
            keys,
            scratch: Vec::new(),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ZipCryptoWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.keys.encrypt(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

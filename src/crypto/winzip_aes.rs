//! WinZip AES encryption (AE-1 / AE-2).
//!
//! Layout of an encrypted payload:
//!
//! ```text
//! salt (8/12/16 bytes) | password verifier (2) | ciphertext | authentication code (10)
//! ```
//!
//! Keys come from PBKDF2-HMAC-SHA1 (1000 iterations) over the password and
//! salt, producing the AES key, the HMAC key and the verifier in one block.
//! Data is encrypted with AES in CTR mode using a little-endian block counter
//! that starts at 1, and authenticated with HMAC-SHA1 over the ciphertext,
//! truncated to ten bytes.

use std::io::{self, Read, Write};

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroizing;

use super::{AesStrength, fill_random};
use crate::{Error, READ_BUFFER_SIZE, Result};

type HmacSha1 = Hmac<Sha1>;

/// Length of the password verifier.
pub const VERIFIER_LEN: usize = 2;

/// Length of the truncated HMAC-SHA1 authentication code.
pub const AUTH_CODE_LEN: usize = 10;

/// PBKDF2 iteration count fixed by the format.
pub const KDF_ITERATIONS: u32 = 1000;

const BLOCK_LEN: usize = 16;

/// Bytes an AES entry adds on top of its compressed data.
pub fn overhead(strength: AesStrength) -> u64 {
    (strength.salt_len() + VERIFIER_LEN + AUTH_CODE_LEN) as u64
}

/// Key material derived from a password and salt.
pub struct AesKeys {
    strength: AesStrength,
    encryption: Zeroizing<Vec<u8>>,
    authentication: Zeroizing<Vec<u8>>,
    verifier: [u8; VERIFIER_LEN],
}

impl std::fmt::Debug for AesKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesKeys")
            .field("strength", &self.strength)
            .finish_non_exhaustive()
    }
}

impl AesKeys {
    /// Derives keys for an entry.
    pub fn derive(password: &[u8], salt: &[u8], strength: AesStrength) -> Result<Self> {
        if salt.len() != strength.salt_len() {
            return Err(Error::InvalidFormat(format!(
                "AES-{} salt must be {} bytes, got {}",
                strength.bits(),
                strength.salt_len(),
                salt.len()
            )));
        }
        let key_len = strength.key_len();
        let mut derived = Zeroizing::new(vec![0u8; 2 * key_len + VERIFIER_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, KDF_ITERATIONS, &mut derived);
        Ok(Self {
            strength,
            encryption: Zeroizing::new(derived[..key_len].to_vec()),
            authentication: Zeroizing::new(derived[key_len..2 * key_len].to_vec()),
            verifier: [derived[2 * key_len], derived[2 * key_len + 1]],
        })
    }

    /// The 2-byte password verifier.
    pub fn verifier(&self) -> [u8; VERIFIER_LEN] {
        self.verifier
    }

    /// Key strength.
    pub fn strength(&self) -> AesStrength {
        self.strength
    }

    fn cipher(&self) -> Result<AesCtr> {
        AesCtr::new(&self.encryption, self.strength)
    }

    fn mac(&self) -> Result<HmacSha1> {
        <HmacSha1 as Mac>::new_from_slice(&self.authentication)
            .map_err(|e| Error::CryptoError(format!("HMAC key setup failed: {e}")))
    }
}

enum BlockCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockCipher {
    fn new(key: &[u8], strength: AesStrength) -> Result<Self> {
        let invalid = |_| Error::CryptoError(format!("invalid AES-{} key length", strength.bits()));
        Ok(match strength {
            AesStrength::Aes128 => Self::Aes128(<Aes128 as KeyInit>::new_from_slice(key).map_err(invalid)?),
            AesStrength::Aes192 => Self::Aes192(<Aes192 as KeyInit>::new_from_slice(key).map_err(invalid)?),
            AesStrength::Aes256 => Self::Aes256(<Aes256 as KeyInit>::new_from_slice(key).map_err(invalid)?),
        })
    }

    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }
}

/// AES in WinZip's CTR mode.
pub struct AesCtr {
    cipher: BlockCipher,
    counter: u128,
    keystream: [u8; BLOCK_LEN],
    used: usize,
}

impl AesCtr {
    fn new(key: &[u8], strength: AesStrength) -> Result<Self> {
        Ok(Self {
            cipher: BlockCipher::new(key, strength)?,
            counter: 0,
            keystream: [0u8; BLOCK_LEN],
            used: BLOCK_LEN,
        })
    }

    /// XORs the keystream into `data`. Encryption and decryption are the same.
    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data {
            if self.used == BLOCK_LEN {
                self.counter = self.counter.wrapping_add(1);
                self.keystream = self.counter.to_le_bytes();
                self.cipher.encrypt_block(&mut self.keystream);
                self.used = 0;
            }
            *byte ^= self.keystream[self.used];
            self.used += 1;
        }
    }
}

/// Generates a salt and derives keys for a new entry.
///
/// Returns the salt to store in front of the ciphertext.
pub fn prepare_encryption(password: &[u8], strength: AesStrength) -> Result<(Vec<u8>, AesKeys)> {
    let mut salt = vec![0u8; strength.salt_len()];
    fill_random(&mut salt)?;
    let keys = AesKeys::derive(password, &salt, strength)?;
    Ok((salt, keys))
}

/// Checks the authentication code of `ciphertext_len` bytes from `reader`.
///
/// `on_chunk` is called after each chunk with its size and may abort the
/// pass by returning an error.
pub fn verify_authentication<R, F>(
    reader: &mut R,
    ciphertext_len: u64,
    keys: &AesKeys,
    auth_code: &[u8],
    mut on_chunk: F,
) -> Result<bool>
where
    R: Read,
    F: FnMut(usize) -> Result<()>,
{
    let mut mac = keys.mac()?;
    let mut remaining = ciphertext_len;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    while remaining > 0 {
        let want = usize::try_from(remaining).unwrap_or(usize::MAX).min(buf.len());
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            return Err(Error::InvalidFormat(
                "AES entry ended before its authentication code".into(),
            ));
        }
        mac.update(&buf[..n]);
        remaining -= n as u64;
        on_chunk(n)?;
    }
    Ok(mac.verify_truncated_left(auth_code).is_ok())
}

/// Reader that decrypts an AES payload (between verifier and auth code).
pub struct AesReader<R> {
    inner: R,
    ctr: AesCtr,
}

impl<R: Read> AesReader<R> {
    /// Wraps `inner`, which must yield exactly the ciphertext.
    pub fn new(inner: R, keys: &AesKeys) -> Result<Self> {
        Ok(Self {
            inner,
            ctr: keys.cipher()?,
        })
    }
}

impl<R: Read> Read for AesReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.ctr.apply(&mut buf[..n]);
        Ok(n)
    }
}

/// Writer that encrypts and authenticates a payload.
///
/// The caller writes salt and verifier first; [`finish`](Self::finish)
/// appends the authentication code.
pub struct AesWriter<W> {
    inner: W,
    ctr: AesCtr,
    mac: HmacSha1,
    scratch: Vec<u8>,
}

impl<W: Write> AesWriter<W> {
    /// Wraps `inner`.
    pub fn new(inner: W, keys: &AesKeys) -> Result<Self> {
        Ok(Self {
            inner,
            ctr: keys.cipher()?,
            mac: keys.mac()?,
            scratch: Vec::new(),
        })
    }

    /// Writes the authentication code and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let tag = self.mac.finalize().into_bytes();
        self.inner.write_all(&tag[..AUTH_CODE_LEN])?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for AesWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.ctr.apply(&mut self.scratch);
        self.mac.update(&self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

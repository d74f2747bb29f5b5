//! Entry encryption.
//!
//! Two schemes are supported:
//!
//! - **ZipCrypto** ([`zipcrypto`]), the traditional PKWARE stream cipher.
//!   Weak, but readable by every zip tool.
//! - **WinZip AES** (`winzip_aes`, requires the `aes` feature): AES-128/256
//!   in CTR mode with PBKDF2-HMAC-SHA1 key derivation and an HMAC-SHA1
//!   authentication code. AES-192 entries can be read but are not written
//!   by default.
//!
//! Encryption wraps the *compressed* payload: data is compressed first,
//! then encrypted.

mod password;
mod properties;
pub mod zipcrypto;

#[cfg(feature = "aes")]
#[cfg_attr(docsrs, doc(cfg(feature = "aes")))]
pub mod winzip_aes;

pub use password::Password;
pub use properties::{AES_EXTRA_FIELD_ID, AES_EXTRA_FIELD_LEN, AesExtraField, AesStrength, AesVersion};

use crate::{Error, Result};

/// How an entry is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncryptionMethod {
    /// Not encrypted.
    #[default]
    None,
    /// Traditional PKWARE encryption.
    ZipCrypto,
    /// WinZip AES with the given key size.
    Aes(AesStrength),
}

impl EncryptionMethod {
    /// AES-128 shorthand.
    pub const AES_128: Self = Self::Aes(AesStrength::Aes128);
    /// AES-256 shorthand.
    pub const AES_256: Self = Self::Aes(AesStrength::Aes256);

    /// Returns true for anything but [`EncryptionMethod::None`].
    pub fn is_encrypted(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Stable integer code: 0 none, 1 standard, 2 AES-128, 3 AES-256, 4 AES-192.
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::ZipCrypto => 1,
            Self::Aes(AesStrength::Aes128) => 2,
            Self::Aes(AesStrength::Aes256) => 3,
            Self::Aes(AesStrength::Aes192) => 4,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::ZipCrypto),
            2 => Ok(Self::AES_128),
            3 => Ok(Self::AES_256),
            4 => Ok(Self::Aes(AesStrength::Aes192)),
            other => Err(Error::InvalidParameter(format!(
                "unknown encryption method code {}",
                other
            ))),
        }
    }

    /// Bytes the scheme adds on top of the compressed data.
    pub fn overhead(self) -> u64 {
        match self {
            Self::None => 0,
            Self::ZipCrypto => zipcrypto::HEADER_LEN as u64,
            Self::Aes(strength) => (strength.salt_len() + 2 + 10) as u64,
        }
    }

    /// Returns true if this build can write entries with the method.
    pub fn is_supported(self) -> bool {
        match self {
            Self::None | Self::ZipCrypto => true,
            Self::Aes(_) => cfg!(feature = "aes"),
        }
    }
}

impl std::fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::ZipCrypto => f.write_str("ZipCrypto"),
            Self::Aes(strength) => write!(f, "AES-{}", strength.bits()),
        }
    }
}

/// Fills `buf` from the operating system RNG.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf).map_err(|e| Error::CryptoError(format!("random source failed: {e}")))
}

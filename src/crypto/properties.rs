//! WinZip AES extra field (`0x9901`) parsing and encoding.
//!
//! The field replaces the real compression method of an AES entry, whose
//! header method is set to `99`:
//!
//! ```text
//! u16 vendor version (1 = AE-1, 2 = AE-2)
//! u8  vendor id "AE"
//! u8  key strength (1 = 128, 2 = 192, 3 = 256 bits)
//! u16 actual compression method
//! ```

use crate::{Error, Result};

/// Extra field header id of the WinZip AES field.
pub const AES_EXTRA_FIELD_ID: u16 = 0x9901;

/// Length of the field data.
pub const AES_EXTRA_FIELD_LEN: usize = 7;

/// AES key size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AesStrength {
    /// 128-bit key, 8-byte salt.
    Aes128,
    /// 192-bit key, 12-byte salt. Read-only.
    Aes192,
    /// 256-bit key, 16-byte salt.
    #[default]
    Aes256,
}

impl AesStrength {
    /// Parses the strength byte of the extra field.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::Aes128),
            2 => Ok(Self::Aes192),
            3 => Ok(Self::Aes256),
            other => Err(Error::InvalidFormat(format!(
                "unknown AES key strength {}",
                other
            ))),
        }
    }

    /// The strength byte of the extra field.
    pub fn code(self) -> u8 {
        match self {
            Self::Aes128 => 1,
            Self::Aes192 => 2,
            Self::Aes256 => 3,
        }
    }

    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Salt length in bytes.
    pub fn salt_len(self) -> usize {
        self.key_len() / 2
    }

    /// Key size in bits.
    pub fn bits(self) -> u16 {
        self.key_len() as u16 * 8
    }
}

/// WinZip AES vendor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AesVersion {
    /// AE-1: the header CRC is valid.
    Ae1,
    /// AE-2: the header CRC is zero and only the authentication code protects the data.
    Ae2,
}

/// Parsed WinZip AES extra field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesExtraField {
    /// Vendor version.
    pub version: AesVersion,
    /// Key strength.
    pub strength: AesStrength,
    /// Compression method applied before encryption.
    pub compression_method: u16,
}

impl AesExtraField {
    /// Parses the field data (without the 4-byte id/length prefix).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < AES_EXTRA_FIELD_LEN {
            return Err(Error::InvalidFormat(format!(
                "AES extra field too short ({} bytes)",
                data.len()
            )));
        }
        let version = match u16::from_le_bytes([data[0], data[1]]) {
            1 => AesVersion::Ae1,
            2 => AesVersion::Ae2,
            other => {
                return Err(Error::InvalidFormat(format!(
                    "unknown AES vendor version {}",
                    other
                )));
            }
        };
        if &data[2..4] != b"AE" {
            return Err(Error::InvalidFormat("AES extra field vendor id is not 'AE'".into()));
        }
        Ok(Self {
            version,
            strength: AesStrength::from_code(data[4])?,
            compression_method: u16::from_le_bytes([data[5], data[6]]),
        })
    }

    /// Encodes the field data.
    pub fn to_bytes(&self) -> [u8; AES_EXTRA_FIELD_LEN] {
        let version: u16 = match self.version {
            AesVersion::Ae1 => 1,
            AesVersion::Ae2 => 2,
        };
        let [v0, v1] = version.to_le_bytes();
        let [m0, m1] = self.compression_method.to_le_bytes();
        [v0, v1, b'A', b'E', self.strength.code(), m0, m1]
    }
}

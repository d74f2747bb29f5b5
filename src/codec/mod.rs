//! Compression codecs for zip entries.
//!
//! Zip identifies the compression of each entry by a 16-bit method number.
//! This crate reads and writes method `0` (stored) and method `8` (Deflate,
//! behind the `deflate` feature). Encryption is layered on top by
//! [`crate::crypto`] and is not a codec.

#[cfg(feature = "deflate")]
pub mod deflate;

mod copy;

use std::io::{self, BufRead, Write};

use crate::{Error, Result};

pub use copy::{CopyDecoder, CopyEncoder};

#[cfg(feature = "deflate")]
pub use deflate::{DeflateDecoder, DeflateEncoder};

/// Zip method numbers.
pub mod method {
    /// No compression.
    pub const STORED: u16 = 0;
    /// Deflate (RFC 1951).
    pub const DEFLATED: u16 = 8;
    /// Placeholder method used by WinZip AES entries.
    pub const AES: u16 = 99;
}

/// Compression method of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionMethod {
    /// Data is stored as-is.
    Store,
    /// Data is Deflate-compressed.
    #[default]
    Deflate,
}

impl CompressionMethod {
    /// Maps a zip method number onto a supported method.
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            method::STORED => Ok(Self::Store),
            method::DEFLATED => Ok(Self::Deflate),
            other => Err(Error::UnsupportedMethod { method: other }),
        }
    }

    /// The zip method number.
    pub fn code(self) -> u16 {
        match self {
            Self::Store => method::STORED,
            Self::Deflate => method::DEFLATED,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Store => "Store",
            Self::Deflate => "Deflate",
        }
    }

    /// Returns true if this build can encode and decode the method.
    pub fn is_supported(self) -> bool {
        match self {
            Self::Store => true,
            Self::Deflate => cfg!(feature = "deflate"),
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Compression level, `0` (no compression) through `9` (maximum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// Level 0.
    pub const NONE: Self = Self(0);
    /// Level 1.
    pub const FASTEST: Self = Self(1);
    /// Level 6, the default.
    pub const NORMAL: Self = Self(6);
    /// Level 9.
    pub const MAXIMUM: Self = Self(9);

    /// Validates a numeric level.
    pub fn new(level: u32) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidCompressionLevel { level });
        }
        Ok(Self(level))
    }

    /// The numeric level.
    pub fn level(self) -> u32 {
        self.0
    }

    /// General-purpose flag bits 1-2 that describe a Deflate level.
    pub(crate) fn deflate_flag_bits(self) -> u16 {
        match self.0 {
            0 | 1 => 0b110,
            2 => 0b100,
            8 | 9 => 0b010,
            _ => 0,
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// A decompressing reader for one entry.
pub trait Decoder: io::Read + Send {
    /// The method this decoder handles.
    fn method(&self) -> CompressionMethod;
}

/// A compressing writer for one entry.
pub trait Encoder: Write + Send {
    /// The method this encoder produces.
    fn method(&self) -> CompressionMethod;

    /// Flushes the remaining compressed data.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Builds a decoder over compressed `input`.
///
/// `uncompressed_size` bounds stored entries so trailing bytes of the
/// payload window are never returned.
pub fn build_decoder<'a, R>(
    compression: CompressionMethod,
    input: R,
    uncompressed_size: u64,
) -> Result<Box<dyn Decoder + 'a>>
where
    R: BufRead + Send + 'a,
{
    match compression {
        CompressionMethod::Store => Ok(Box::new(CopyDecoder::new(input, uncompressed_size))),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate => Ok(Box::new(DeflateDecoder::new(input))),
        #[cfg(not(feature = "deflate"))]
        CompressionMethod::Deflate => Err(Error::UnsupportedMethod {
            method: method::DEFLATED,
        }),
    }
}

/// Builds an encoder writing compressed data into `output`.
pub fn build_encoder<'a, W>(
    compression: CompressionMethod,
    level: CompressionLevel,
    output: W,
) -> Result<Box<dyn Encoder + 'a>>
where
    W: Write + Send + 'a,
{
    match compression {
        CompressionMethod::Store => Ok(Box::new(CopyEncoder::new(output))),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate => Ok(Box::new(DeflateEncoder::new(output, level))),
        #[cfg(not(feature = "deflate"))]
        CompressionMethod::Deflate => {
            let _ = level;
            Err(Error::UnsupportedMethod {
                method: method::DEFLATED,
            })
        }
    }
}

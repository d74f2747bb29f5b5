//! Zip container format: record layouts, constants and parsing.
//!
//! An archive is a sequence of entries (local file header followed by the
//! entry payload), then the central directory, then the end-of-central-
//! directory record (EOCD). Archives that outgrow 32-bit fields add a Zip64
//! EOCD record and locator in front of the EOCD. Split archives spread these
//! across numbered volumes; every offset in the central directory is then
//! relative to the volume (disk) it points into, see [`DiskLayout`].
//!
//! All multi-byte fields are little-endian.

pub mod eocd;
pub mod extra;
pub mod header;
pub mod parser;
pub mod reader;

pub use eocd::{EndOfCentralDirectory, EndRecords, Zip64EndOfCentralDirectory, Zip64Locator};
pub use extra::{ExtraFields, RawExtraField};
pub use header::{CentralDirectoryHeader, DataDescriptor, LocalFileHeader};
pub use parser::{ParsedArchive, parse_archive};

use crate::{Error, Result};

/// Record signatures.
pub mod signature {
    /// Local file header.
    pub const LOCAL_FILE_HEADER: u32 = 0x0403_4B50;
    /// Central directory file header.
    pub const CENTRAL_DIRECTORY: u32 = 0x0201_4B50;
    /// End of central directory.
    pub const END_OF_CENTRAL_DIRECTORY: u32 = 0x0605_4B50;
    /// Zip64 end of central directory record.
    pub const ZIP64_END_OF_CENTRAL_DIRECTORY: u32 = 0x0606_4B50;
    /// Zip64 end of central directory locator.
    pub const ZIP64_LOCATOR: u32 = 0x0706_4B50;
    /// Data descriptor; also the marker at the start of a split archive.
    pub const DATA_DESCRIPTOR: u32 = 0x0807_4B50;
    /// Split archive marker.
    pub const SPLIT_ARCHIVE: u32 = DATA_DESCRIPTOR;
    /// Marker of an archive that was meant to be split but fit in one volume.
    pub const SINGLE_SEGMENT_SPLIT: u32 = 0x3030_4B50;
}

/// General purpose bit flags.
pub mod flags {
    /// Entry is encrypted.
    pub const ENCRYPTED: u16 = 0x0001;
    /// Sizes and CRC follow the payload in a data descriptor.
    pub const DATA_DESCRIPTOR: u16 = 0x0008;
    /// Name and comment are UTF-8.
    pub const UTF8: u16 = 0x0800;
}

/// "Version needed to extract" values.
pub mod version {
    /// Stored data.
    pub const DEFAULT: u16 = 10;
    /// Deflate, directories, ZipCrypto.
    pub const DEFLATE: u16 = 20;
    /// Zip64 structures.
    pub const ZIP64: u16 = 45;
    /// WinZip AES.
    pub const AES: u16 = 51;
    /// "Version made by": Unix host, APPNOTE version 6.3.
    pub const MADE_BY: u16 = (3 << 8) | 63;
}

/// A field holding this value defers to the Zip64 extra field.
pub const ZIP64_U32_SENTINEL: u32 = u32::MAX;
/// 16-bit counterpart of [`ZIP64_U32_SENTINEL`].
pub const ZIP64_U16_SENTINEL: u16 = u16::MAX;

/// MS-DOS directory attribute bit in external attributes.
pub const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

/// Maps volume-relative offsets onto offsets in the concatenated volume set.
///
/// A single-file archive has one volume starting at 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskLayout {
    starts: Vec<u64>,
    total: u64,
}

impl DiskLayout {
    /// Layout of a single-file archive of `len` bytes.
    pub fn single(len: u64) -> Self {
        Self {
            starts: vec![0],
            total: len,
        }
    }

    /// Layout from per-volume sizes, in disk order.
    pub fn from_sizes(sizes: &[u64]) -> Self {
        let mut starts = Vec::with_capacity(sizes.len());
        let mut total = 0u64;
        for &size in sizes {
            starts.push(total);
            total += size;
        }
        if starts.is_empty() {
            starts.push(0);
        }
        Self { starts, total }
    }

    /// Number of volumes.
    pub fn disk_count(&self) -> u32 {
        self.starts.len() as u32
    }

    /// Total length of all volumes.
    pub fn total_len(&self) -> u64 {
        self.total
    }

    /// Length of one volume, 0 for disks past the end.
    pub fn disk_len(&self, disk: u32) -> u64 {
        let disk = disk as usize;
        match self.starts.get(disk) {
            Some(&start) => self.starts.get(disk + 1).copied().unwrap_or(self.total) - start,
            None => 0,
        }
    }

    /// Converts a `(disk, offset)` pair into a global offset.
    pub fn global(&self, disk: u32, offset: u64) -> Result<u64> {
        let start = self.starts.get(disk as usize).ok_or_else(|| {
            Error::InvalidFormat(format!(
                "reference to disk {} but the archive has {} volume(s)",
                disk,
                self.starts.len()
            ))
        })?;
        let global = start.checked_add(offset).filter(|&g| g <= self.total);
        global.ok_or_else(|| {
            Error::InvalidFormat(format!(
                "offset {:#x} on disk {} lies outside the archive",
                offset, disk
            ))
        })
    }

    /// Converts a global offset into `(disk, offset)`.
    pub fn locate(&self, global: u64) -> (u32, u64) {
        let disk = match self.starts.binary_search(&global) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        (disk as u32, global - self.starts[disk])
    }
}

const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', 'É', 'æ', 'Æ',
    'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', 'á', 'í', 'ó', 'ú', 'ñ', 'Ñ',
    'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕',
    '╣', '║', '╗', '╝', '╜', '╛', '┐', '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦',
    '╠', '═', '╬', '╧', '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐',
    '▀', 'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', '≡', '±',
    '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

/// Decodes a name or comment.
///
/// Text flagged UTF-8 or that happens to be valid UTF-8 is taken as is,
/// anything else is read as IBM code page 437.
pub fn decode_text(bytes: &[u8], utf8_flag: bool) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) if utf8_flag => String::from_utf8_lossy(bytes).into_owned(),
        Err(_) => bytes
            .iter()
            .map(|&b| if b < 0x80 { b as char } else { CP437_HIGH[(b - 0x80) as usize] })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_single() {
        let layout = DiskLayout::single(100);
        assert_eq!(layout.disk_count(), 1);
        assert_eq!(layout.global(0, 40).unwrap(), 40);
        assert!(layout.global(1, 0).is_err());
        assert!(layout.global(0, 101).is_err());
    }

    #[test]
    fn test_layout_multi() {
        let layout = DiskLayout::from_sizes(&[64, 64, 10]);
        assert_eq!(layout.total_len(), 138);
        assert_eq!(layout.global(1, 4).unwrap(), 68);
        assert_eq!(layout.global(2, 10).unwrap(), 138);
        assert_eq!(layout.disk_len(0), 64);
        assert_eq!(layout.disk_len(2), 10);
        assert_eq!(layout.disk_len(3), 0);
        assert_eq!(layout.locate(0), (0, 0));
        assert_eq!(layout.locate(63), (0, 63));
        assert_eq!(layout.locate(64), (1, 0));
        assert_eq!(layout.locate(130), (2, 2));
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"plain.txt", false), "plain.txt");
        assert_eq!(decode_text("naïve".as_bytes(), true), "naïve");
        assert_eq!(decode_text(&[0x81, b'x'], false), "üx");
    }
}

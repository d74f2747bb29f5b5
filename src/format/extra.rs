//! Extra fields attached to local and central headers.
//!
//! Each field is `id: u16, len: u16, data[len]`. The crate understands:
//!
//! - `0x0001` Zip64 extended information (sizes, offset, disk number)
//! - `0x9901` WinZip AES parameters
//! - `0x5455` extended timestamp (Unix modification time)
//!
//! Everything else is preserved verbatim so that rewriting an archive does
//! not lose foreign metadata.

use super::reader::FieldReader;
use crate::crypto::{AES_EXTRA_FIELD_ID, AesExtraField};
use crate::{Error, Result};

/// Zip64 extended information.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Info-ZIP extended timestamp.
pub const EXTENDED_TIMESTAMP_ID: u16 = 0x5455;

/// An extra field the crate does not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExtraField {
    /// Header id.
    pub id: u16,
    /// Field data.
    pub data: Vec<u8>,
}

/// Which header fields were saturated and must come from the Zip64 field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Needs {
    /// Uncompressed size was `0xFFFFFFFF`.
    pub uncompressed: bool,
    /// Compressed size was `0xFFFFFFFF`.
    pub compressed: bool,
    /// Local header offset was `0xFFFFFFFF`.
    pub offset: bool,
    /// Disk number was `0xFFFF`.
    pub disk: bool,
}

impl Zip64Needs {
    /// Returns true if any field is needed.
    pub fn any(&self) -> bool {
        self.uncompressed || self.compressed || self.offset || self.disk
    }
}

/// Values carried by (or to be written into) a Zip64 field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Values {
    /// Uncompressed size.
    pub uncompressed: Option<u64>,
    /// Compressed size.
    pub compressed: Option<u64>,
    /// Local header offset.
    pub offset: Option<u64>,
    /// Disk number.
    pub disk: Option<u32>,
}

impl Zip64Values {
    fn is_empty(&self) -> bool {
        self.uncompressed.is_none()
            && self.compressed.is_none()
            && self.offset.is_none()
            && self.disk.is_none()
    }

    fn encoded_len(&self) -> usize {
        8 * (self.uncompressed.is_some() as usize
            + self.compressed.is_some() as usize
            + self.offset.is_some() as usize)
            + 4 * self.disk.is_some() as usize
    }
}

/// Interpreted extra fields of one header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFields {
    /// WinZip AES parameters.
    pub aes: Option<AesExtraField>,
    /// Modification time in Unix seconds.
    pub modified_unix: Option<i64>,
    /// Fields kept verbatim.
    pub other: Vec<RawExtraField>,
}

impl ExtraFields {
    /// Parses an extra block.
    ///
    /// `needs` tells which Zip64 values must be present; a missing one is an
    /// error. `base` is the absolute offset of the block for error messages.
    pub fn parse(data: &[u8], base: u64, needs: Zip64Needs) -> Result<(Self, Zip64Values)> {
        let mut fields = Self::default();
        let mut zip64 = Zip64Values::default();
        let mut zip64_seen = false;
        let mut r = FieldReader::new(data, base);

        while r.remaining() >= 4 {
            let field_offset = r.offset();
            let id = r.u16()?;
            let len = r.u16()? as usize;
            if len > r.remaining() {
                log::warn!(
                    "extra field {:#06x} at {:#x} overruns its block ({} > {}), ignoring the rest",
                    id,
                    field_offset,
                    len,
                    r.remaining()
                );
                break;
            }
            let body = r.bytes(len)?;
            match id {
                ZIP64_EXTRA_ID => {
                    zip64 = parse_zip64(body, field_offset + 4, needs)?;
                    zip64_seen = true;
                }
                AES_EXTRA_FIELD_ID => fields.aes = Some(AesExtraField::parse(body)?),
                EXTENDED_TIMESTAMP_ID => {
                    if let [flags, a, b, c, d, ..] = *body {
                        if flags & 1 != 0 {
                            fields.modified_unix = Some(i32::from_le_bytes([a, b, c, d]) as i64);
                        }
                    }
                }
                _ => fields.other.push(RawExtraField {
                    id,
                    data: body.to_vec(),
                }),
            }
        }

        if needs.any() && !zip64_seen {
            return Err(Error::corrupt(base, "header requires a Zip64 extra field but none is present"));
        }
        Ok((fields, zip64))
    }

    /// Encodes the block, Zip64 first.
    pub fn encode(&self, zip64: &Zip64Values) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len(zip64));
        if !zip64.is_empty() {
            push_header(&mut out, ZIP64_EXTRA_ID, zip64.encoded_len());
            for v in [zip64.uncompressed, zip64.compressed, zip64.offset].into_iter().flatten() {
                out.extend_from_slice(&v.to_le_bytes());
            }
            if let Some(disk) = zip64.disk {
                out.extend_from_slice(&disk.to_le_bytes());
            }
        }
        if let Some(aes) = &self.aes {
            let body = aes.to_bytes();
            push_header(&mut out, AES_EXTRA_FIELD_ID, body.len());
            out.extend_from_slice(&body);
        }
        if let Some(mtime) = self.modified_unix {
            push_header(&mut out, EXTENDED_TIMESTAMP_ID, 5);
            out.push(1);
            out.extend_from_slice(&clamp_i32(mtime).to_le_bytes());
        }
        for field in &self.other {
            push_header(&mut out, field.id, field.data.len());
            out.extend_from_slice(&field.data);
        }
        out
    }

    /// Length of [`encode`](Self::encode)'s output.
    pub fn encoded_len(&self, zip64: &Zip64Values) -> usize {
        let mut len = 0;
        if !zip64.is_empty() {
            len += 4 + zip64.encoded_len();
        }
        if self.aes.is_some() {
            len += 4 + crate::crypto::AES_EXTRA_FIELD_LEN;
        }
        if self.modified_unix.is_some() {
            len += 4 + 5;
        }
        len + self.other.iter().map(|f| 4 + f.data.len()).sum::<usize>()
    }
}

fn push_header(out: &mut Vec<u8>, id: u16, len: usize) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(len as u16).to_le_bytes());
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn parse_zip64(body: &[u8], base: u64, needs: Zip64Needs) -> Result<Zip64Values> {
    let mut r = FieldReader::new(body, base);
    let mut values = Zip64Values::default();
    if needs.uncompressed {
        values.uncompressed = Some(r.u64()?);
    }
    if needs.compressed {
        values.compressed = Some(r.u64()?);
    }
    if needs.offset {
        values.offset = Some(r.u64()?);
    }
    if needs.disk {
        values.disk = Some(r.u32()?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{AesStrength, AesVersion};

    #[test]
    fn test_roundtrip_all_known_fields() {
        let fields = ExtraFields {
            aes: Some(AesExtraField {
                version: AesVersion::Ae2,
                strength: AesStrength::Aes128,
                compression_method: 0,
            }),
            modified_unix: Some(1_700_000_000),
            other: vec![RawExtraField {
                id: 0xCAFE,
                data: vec![1, 2, 3],
            }],
        };
        let zip64 = Zip64Values {
            uncompressed: Some(5_000_000_000),
            compressed: Some(4_900_000_000),
            offset: None,
            disk: None,
        };
        let encoded = fields.encode(&zip64);
        assert_eq!(encoded.len(), fields.encoded_len(&zip64));

        let needs = Zip64Needs {
            uncompressed: true,
            compressed: true,
            ..Default::default()
        };
        let (parsed, parsed64) = ExtraFields::parse(&encoded, 0, needs).unwrap();
        assert_eq!(parsed, fields);
        assert_eq!(parsed64, zip64);
    }

    #[test]
    fn test_missing_zip64_is_corruption() {
        let needs = Zip64Needs {
            offset: true,
            ..Default::default()
        };
        let err = ExtraFields::parse(&[], 0x10, needs).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_overrunning_field_is_tolerated() {
        // id 0xAAAA claims 50 bytes but only 2 follow
        let data = [0xAA, 0xAA, 50, 0, 1, 2];
        let (parsed, _) = ExtraFields::parse(&data, 0, Zip64Needs::default()).unwrap();
        assert!(parsed.other.is_empty());
    }

    #[test]
    fn test_central_timestamp_only_mtime() {
        let data = [0x55, 0x54, 5, 0, 0x03, 0x10, 0x00, 0x00, 0x00];
        let (parsed, _) = ExtraFields::parse(&data, 0, Zip64Needs::default()).unwrap();
        assert_eq!(parsed.modified_unix, Some(16));
    }
}

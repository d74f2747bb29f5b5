//! Central directory parsing.
//!
//! Opening an archive reads the end records, then the whole central
//! directory in one piece, then decodes its records. Local headers are only
//! touched when an entry's data is read.

use std::io::{Read, Seek, SeekFrom};

use super::DiskLayout;
use super::eocd::EndRecords;
use super::header::{CENTRAL_HEADER_FIXED_LEN, CentralDirectoryHeader};
use super::reader::FieldReader;
use crate::{Error, Result};

/// Everything read from an archive's trailer.
#[derive(Debug, Clone)]
pub struct ParsedArchive {
    /// End records.
    pub end: EndRecords,
    /// Central directory records in directory order.
    pub records: Vec<CentralDirectoryHeader>,
    /// Raw archive comment.
    pub comment: Vec<u8>,
}

/// Reads the end records and central directory of an archive.
///
/// `layout` describes the volumes concatenated behind `reader`; a plain
/// archive uses [`DiskLayout::single`].
pub fn parse_archive<R: Read + Seek>(reader: &mut R, layout: &DiskLayout) -> Result<ParsedArchive> {
    let end = EndRecords::locate(reader, layout)?;
    let total_entries = end.total_entries();
    let cd_size = end.cd_size();
    log::debug!(
        "end of central directory at {:#x}: {} entries, central directory {} bytes on disk {}",
        end.eocd_offset,
        total_entries,
        cd_size,
        end.cd_disk()
    );

    if end.volume_count() > layout.disk_count() {
        return Err(Error::IncompleteArchive {
            expected: end.volume_count(),
            found: layout.disk_count(),
        });
    }

    let cd_start = layout.global(end.cd_disk(), end.cd_offset())?;
    let cd_end = cd_start
        .checked_add(cd_size)
        .filter(|&e| e <= end.start_offset())
        .ok_or_else(|| {
            Error::InvalidFormat(format!(
                "central directory ({} bytes at {:#x}) runs past the end records at {:#x}",
                cd_size,
                cd_start,
                end.start_offset()
            ))
        })?;
    let min_size = total_entries.checked_mul(CENTRAL_HEADER_FIXED_LEN as u64);
    if min_size.is_none_or(|min| min > cd_size) {
        return Err(Error::InvalidFormat(format!(
            "central directory of {} bytes cannot hold {} entries",
            cd_size, total_entries
        )));
    }

    let mut cd = vec![0u8; (cd_end - cd_start) as usize];
    reader.seek(SeekFrom::Start(cd_start))?;
    reader
        .read_exact(&mut cd)
        .map_err(|_| Error::corrupt(cd_start, "central directory is truncated"))?;

    let mut records = Vec::with_capacity(total_entries as usize);
    let mut r = FieldReader::new(&cd, cd_start);
    for index in 0..total_entries {
        let record = CentralDirectoryHeader::parse(&mut r)?;
        log::trace!(
            "entry {}: {:?} method {} at disk {} offset {:#x}",
            index,
            record.name_str(),
            record.method,
            record.disk_number_start,
            record.local_header_offset
        );
        records.push(record);
    }
    if r.remaining() > 0 {
        log::warn!(
            "{} unused bytes at the end of the central directory",
            r.remaining()
        );
    }

    let comment = end.eocd.comment.clone();
    Ok(ParsedArchive {
        end,
        records,
        comment,
    })
}

//! Archive writing.
//!
//! [`ZipWriter`] emits an archive front to back into a [`VolumeSink`]:
//! entries one after another, then the central directory, then the end
//! records. New entries go through the compression and encryption pipeline
//! in [`entry`]; entries carried over from an existing archive are copied
//! raw, without decompressing them.
//!
//! Entries are added through [`ZipFile`](crate::ZipFile), which configures
//! them with [`ZipParameters`]:
//!
//! ```rust,no_run
//! use zipkit::{CompressionMethod, ZipFile, ZipParameters};
//!
//! let mut zip = ZipFile::create("out.zip")?;
//! let params = ZipParameters::new().compression(CompressionMethod::Store);
//! zip.add_data("notes.txt", b"hello", &params)?;
//! # Ok::<(), zipkit::Error>(())
//! ```

mod entry;
mod options;
mod sink;

pub use entry::EntryMeta;
pub use options::ZipParameters;
pub use sink::{FileSink, VolumeSink};

use std::io::{Read, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::Password;
use crate::format::eocd::{CentralDirectorySummary, write_end_records};
use crate::format::{CentralDirectoryHeader, DataDescriptor, ExtraFields, LocalFileHeader, flags, version};
use crate::progress::{CHUNK_SIZE, WorkTracker, copy_tracked};
use crate::timestamp::DosDateTime;
use crate::{ArchivePath, Error, Result};

pub(crate) use entry::{PreparedEntry, prepare_entry};

/// Writes the records of an archive into a sink.
pub(crate) struct ZipWriter<S: VolumeSink> {
    sink: S,
    records: Vec<CentralDirectoryHeader>,
}

fn unix_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

impl<S: VolumeSink> ZipWriter<S> {
    pub(crate) fn new(sink: S) -> Self {
        Self {
            sink,
            records: Vec::new(),
        }
    }

    /// Entries written so far.
    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> usize {
        self.records.len()
    }

    fn modified(meta: &EntryMeta, params: Option<&ZipParameters>) -> SystemTime {
        params
            .and_then(ZipParameters::modified_override)
            .or(meta.modified)
            .unwrap_or_else(SystemTime::now)
    }

    /// Writes a directory entry. `name` gets its trailing slash here.
    pub(crate) fn add_directory(&mut self, name: &ArchivePath, meta: &EntryMeta, params: Option<&ZipParameters>) -> Result<()> {
        let modified = Self::modified(meta, params);
        let header = LocalFileHeader {
            version_needed: version::DEFLATE,
            flags: flags::UTF8,
            method: 0,
            modified: DosDateTime::from_system_time(modified),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            name: name.to_zip_name(true).into_bytes(),
            extra: ExtraFields {
                modified_unix: Some(unix_secs(modified)),
                ..Default::default()
            },
        };
        let meta = EntryMeta {
            is_directory: true,
            ..meta.clone()
        };
        self.write_local(header, meta.external_attributes(), None)
    }

    /// Compresses, encrypts and writes one file entry.
    pub(crate) fn add_entry(
        &mut self,
        name: &ArchivePath,
        source: &mut dyn Read,
        meta: &EntryMeta,
        params: &ZipParameters,
        password: Option<&Password>,
        tracker: &mut WorkTracker<'_>,
    ) -> Result<()> {
        let prepared = prepare_entry(source, params, password, tracker)?;
        let modified = Self::modified(meta, Some(params));
        log::trace!(
            "adding {}: {} -> {} bytes",
            name,
            prepared.uncompressed_size,
            prepared.compressed_size
        );
        let PreparedEntry {
            mut payload,
            crc32,
            uncompressed_size,
            compressed_size,
            header_method,
            flags,
            version_needed,
            aes,
        } = prepared;
        let header = LocalFileHeader {
            version_needed,
            flags,
            method: header_method,
            modified: DosDateTime::from_system_time(modified),
            crc32,
            compressed_size,
            uncompressed_size,
            name: name.to_zip_name(false).into_bytes(),
            extra: ExtraFields {
                aes,
                modified_unix: Some(unix_secs(modified)),
                other: Vec::new(),
            },
        };
        let payload: &mut dyn Read = &mut payload;
        self.write_local(header, meta.external_attributes(), Some((payload, tracker)))
    }

    fn write_local(
        &mut self,
        header: LocalFileHeader,
        external_attributes: u32,
        payload: Option<(&mut dyn Read, &mut WorkTracker<'_>)>,
    ) -> Result<()> {
        self.sink.reserve(header.encoded_len())?;
        let (disk, offset) = self.sink.position();
        header.write(&mut self.sink)?;
        if let Some((payload, tracker)) = payload {
            let copied = copy_checked(payload, &mut self.sink, tracker)?;
            if copied != header.compressed_size {
                return Err(Error::InvalidFormat(format!(
                    "payload of {:?} is {} bytes, header says {}",
                    String::from_utf8_lossy(&header.name),
                    copied,
                    header.compressed_size
                )));
            }
        }
        self.records.push(CentralDirectoryHeader {
            version_made_by: version::MADE_BY,
            version_needed: header.version_needed,
            flags: header.flags,
            method: header.method,
            modified: header.modified,
            crc32: header.crc32,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            disk_number_start: disk,
            internal_attributes: 0,
            external_attributes,
            local_header_offset: offset,
            name: header.name,
            extra: header.extra,
            comment: Vec::new(),
        });
        Ok(())
    }

    /// Copies an entry of another archive without recompressing it.
    ///
    /// `header_offset` is the global offset of the entry's local header in
    /// `reader`. A `new_name` renames the entry on the way.
    pub(crate) fn copy_raw_entry<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        record: &CentralDirectoryHeader,
        header_offset: u64,
        new_name: Option<&str>,
        tracker: &mut WorkTracker<'_>,
    ) -> Result<()> {
        reader.seek(SeekFrom::Start(header_offset))?;
        let (_, header_len) = LocalFileHeader::read(reader, header_offset)?;
        reader.seek(SeekFrom::Start(header_offset + header_len))?;

        let mut record = record.clone();
        if let Some(name) = new_name {
            record.name = name.as_bytes().to_vec();
            record.flags |= flags::UTF8;
        }
        let local = record.local_header();
        self.sink.reserve(local.encoded_len())?;
        let (disk, offset) = self.sink.position();
        local.write(&mut self.sink)?;

        let mut payload = reader.take(record.compressed_size);
        let copied = copy_tracked(&mut payload, &mut self.sink, tracker)?;
        if copied != record.compressed_size {
            return Err(Error::corrupt(
                header_offset + header_len + copied,
                format!("payload of '{}' is truncated", record.name_str()),
            ));
        }

        if record.has_data_descriptor() {
            let descriptor = DataDescriptor {
                crc32: record.crc32,
                compressed_size: record.compressed_size,
                uncompressed_size: record.uncompressed_size,
            };
            self.sink.reserve(descriptor.encoded_len())?;
            descriptor.write(&mut self.sink)?;
        }

        record.disk_number_start = disk;
        record.local_header_offset = offset;
        self.records.push(record);
        Ok(())
    }

    /// Writes the central directory and end records and returns the sink.
    pub(crate) fn finish(mut self, comment: &[u8]) -> Result<S> {
        if let Some(first) = self.records.first() {
            self.sink.reserve(first.encoded_len())?;
        }
        let (cd_disk, cd_offset) = self.sink.position();
        let mut cd_size = 0u64;
        let mut record_disks = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let len = record.encoded_len();
            self.sink.reserve(len)?;
            record_disks.push(self.sink.position().0);
            record.write(&mut self.sink)?;
            cd_size += len;
        }

        let mut summary = CentralDirectorySummary {
            total_entries: self.records.len() as u64,
            cd_size,
            cd_disk,
            cd_offset,
            ..Default::default()
        };
        self.sink.reserve(summary.end_records_len(comment.len()))?;
        let (disk, end_offset) = self.sink.position();
        summary.disk_number = disk;
        summary.end_offset = end_offset;
        summary.entries_on_disk = record_disks.iter().filter(|&&d| d == disk).count() as u64;
        write_end_records(&mut self.sink, &summary, comment)?;
        self.sink.flush()?;
        log::debug!(
            "wrote {} entries, central directory {} bytes on disk {}",
            summary.total_entries,
            cd_size,
            cd_disk
        );
        Ok(self.sink)
    }
}

/// Copies all of `reader` in chunks, checking for cancellation.
///
/// The bytes were already accounted for while compressing.
fn copy_checked<W: Write + ?Sized>(reader: &mut dyn Read, writer: &mut W, tracker: &mut WorkTracker<'_>) -> Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut copied = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(copied),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(crate::error::map_io_error(e)),
        };
        writer.write_all(&buf[..n])?;
        copied += n as u64;
        tracker.checkpoint()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressionMethod;
    use crate::format::{DiskLayout, parse_archive};
    use crate::progress::NoProgress;
    use std::io::Cursor;

    fn write_archive(entries: &[(&str, &[u8])], params: &ZipParameters) -> Vec<u8> {
        let mut reporter = NoProgress;
        let mut tracker = WorkTracker::new(&mut reporter, 0);
        let mut writer = ZipWriter::new(FileSink::new(Vec::new()));
        writer
            .add_directory(&ArchivePath::new("dir").unwrap(), &EntryMeta::directory(), None)
            .unwrap();
        for (name, data) in entries {
            let name = ArchivePath::new(name).unwrap();
            writer
                .add_entry(&name, &mut Cursor::new(data.to_vec()), &EntryMeta::file(data.len() as u64), params, None, &mut tracker)
                .unwrap();
        }
        writer.finish(b"comment").unwrap().finish().unwrap()
    }

    #[test]
    fn test_written_archive_parses() {
        let params = ZipParameters::new().compression(CompressionMethod::Store);
        let data = write_archive(&[("dir/a.txt", b"alpha"), ("b.txt", b"beta")], &params);
        let len = data.len() as u64;
        let parsed = parse_archive(&mut Cursor::new(&data), &DiskLayout::single(len)).unwrap();
        let names: Vec<_> = parsed.records.iter().map(|r| r.name_str()).collect();
        assert_eq!(names, ["dir/", "dir/a.txt", "b.txt"]);
        assert_eq!(parsed.comment, b"comment");
        assert!(parsed.records[0].is_directory());
        assert_eq!(parsed.records[1].uncompressed_size, 5);

        let offset = parsed.records[1].local_header_offset as usize;
        let (local, header_len) = LocalFileHeader::read(&mut &data[offset..], offset as u64).unwrap();
        assert_eq!(local.name, b"dir/a.txt");
        let payload = &data[offset + header_len as usize..][..5];
        assert_eq!(payload, b"alpha");
    }

    #[test]
    fn test_raw_copy_with_rename() {
        let params = ZipParameters::new().compression(CompressionMethod::Store);
        let source = write_archive(&[("a.txt", b"alpha")], &params);
        let len = source.len() as u64;
        let mut cursor = Cursor::new(&source);
        let parsed = parse_archive(&mut cursor, &DiskLayout::single(len)).unwrap();

        let mut reporter = NoProgress;
        let mut tracker = WorkTracker::new(&mut reporter, 0);
        let mut writer = ZipWriter::new(FileSink::new(Vec::new()));
        let record = &parsed.records[1];
        writer
            .copy_raw_entry(&mut cursor, record, record.local_header_offset, Some("renamed.txt"), &mut tracker)
            .unwrap();
        assert_eq!(writer.entry_count(), 1);
        let out = writer.finish(b"").unwrap().finish().unwrap();

        let out_len = out.len() as u64;
        let reparsed = parse_archive(&mut Cursor::new(&out), &DiskLayout::single(out_len)).unwrap();
        assert_eq!(reparsed.records[0].name_str(), "renamed.txt");
        assert_eq!(reparsed.records[0].local_header_offset, 0);
        assert_eq!(reparsed.records[0].crc32, record.crc32);
    }
}

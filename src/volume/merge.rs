//! Joining a split archive back into a single file.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::VolumeSet;
use crate::format::eocd::{CentralDirectorySummary, write_end_records};
use crate::format::{parse_archive, signature};
use crate::progress::{ProgressReporter, WorkTracker, copy_tracked};
use crate::write::{FileSink, VolumeSink};
use crate::{Error, Result};

/// Merges the volumes of `set` into the single-file archive `output`.
///
/// Entry payloads are copied in order without decompression. The central
/// directory is rewritten with offsets relative to the merged file and all
/// disk numbers cleared, and the split marker is dropped. `output` is only
/// replaced once the merged archive is complete; on error or cancellation
/// nothing is left behind.
pub fn merge_volumes(set: &VolumeSet, output: &Path, reporter: &mut dyn ProgressReporter) -> Result<()> {
    let layout = set.layout();
    let mut reader = set.reader();
    let parsed = parse_archive(&mut reader, layout)?;

    let mut marker = [0u8; 4];
    reader.seek(SeekFrom::Start(0))?;
    let skip = match reader.read_exact(&mut marker) {
        Ok(()) => {
            let sig = u32::from_le_bytes(marker);
            if sig == signature::SPLIT_ARCHIVE || sig == signature::SINGLE_SEGMENT_SPLIT {
                4
            } else {
                0
            }
        }
        Err(_) => 0,
    };

    let cd_start = layout.global(parsed.end.cd_disk(), parsed.end.cd_offset())?;
    let payload_len = cd_start.saturating_sub(skip);
    log::debug!(
        "merging {} volume(s): {} bytes of entries, {} records",
        set.volume_count(),
        payload_len,
        parsed.records.len()
    );

    let dir = output.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let temp = tempfile::NamedTempFile::new_in(dir)?;
    let mut sink = FileSink::new(temp.as_file());
    let mut tracker = WorkTracker::new(reporter, payload_len);

    reader.seek(SeekFrom::Start(skip))?;
    let copied = copy_tracked(&mut (&mut reader).take(payload_len), &mut sink, &mut tracker)?;
    if copied != payload_len {
        return Err(Error::corrupt(skip + copied, "volume set ends before the central directory"));
    }

    let cd_offset = sink.position().1;
    for record in &parsed.records {
        tracker.checkpoint()?;
        let global = layout.global(record.disk_number_start, record.local_header_offset)?;
        let mut record = record.clone();
        record.local_header_offset = global.checked_sub(skip).ok_or_else(|| {
            Error::corrupt(global, "local header offset points into the split marker")
        })?;
        record.disk_number_start = 0;
        record.write(&mut sink)?;
    }
    let end_offset = sink.position().1;
    let count = parsed.records.len() as u64;
    let summary = CentralDirectorySummary {
        total_entries: count,
        entries_on_disk: count,
        cd_size: end_offset - cd_offset,
        cd_offset,
        end_offset,
        ..Default::default()
    };
    write_end_records(&mut sink, &summary, &parsed.comment)?;
    sink.finish()?;
    tracker.checkpoint()?;

    temp.as_file().sync_all()?;
    temp.persist(output).map_err(|e| Error::Io(e.error))?;
    log::debug!("merged archive written to {}", output.display());
    Ok(())
}

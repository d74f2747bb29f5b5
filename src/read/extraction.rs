//! Extraction of entries to disk and memory, and archive testing.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::options::{ExtractOptions, OverwritePolicy};
use super::stream::open_entry;
use crate::crypto::Password;
use crate::progress::{WorkTracker, copy_tracked};
use crate::safety::resolve_extract_path;
use crate::volume::VolumeSet;
use crate::{Entry, Error, Result, WRITE_BUFFER_SIZE};

/// In-memory extraction never preallocates more than this.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Extracts one entry below `dest`, optionally under another name.
///
/// Returns the written path, or `None` when an existing file was skipped.
pub(crate) fn extract_entry_to(
    volumes: &VolumeSet,
    entry: &Entry,
    password: Option<&Password>,
    dest: &Path,
    file_name: Option<&str>,
    options: &ExtractOptions,
    tracker: &mut WorkTracker<'_>,
) -> Result<Option<PathBuf>> {
    let target = resolve_extract_path(file_name.unwrap_or(&entry.name), dest, options.path_safety)?;
    tracker.entry_start(&entry.name, entry.size)?;
    let result = write_entry(volumes, entry, password, &target, options, tracker);
    tracker.entry_done(&entry.name, result.is_ok());
    result
}

fn write_entry(
    volumes: &VolumeSet,
    entry: &Entry,
    password: Option<&Password>,
    target: &Path,
    options: &ExtractOptions,
    tracker: &mut WorkTracker<'_>,
) -> Result<Option<PathBuf>> {
    if entry.is_directory {
        fs::create_dir_all(target)?;
        return Ok(Some(target.to_path_buf()));
    }
    if target.symlink_metadata().is_ok() {
        match options.overwrite {
            OverwritePolicy::Error => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists", target.display()),
                )));
            }
            OverwritePolicy::Skip => {
                tracker.warn(&format!("skipping existing {}", target.display()));
                tracker.advance(entry.size)?;
                return Ok(None);
            }
            OverwritePolicy::Overwrite => {}
        }
    }

    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut reader = open_entry(volumes, entry, password, &mut |_| tracker.checkpoint())?;

    // Nothing appears at the target until the data has been verified.
    let mut temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, temp.as_file_mut());
        copy_tracked(&mut reader, &mut writer, tracker)?;
        writer.flush()?;
    }
    temp.persist(target).map_err(|e| Error::Io(e.error))?;
    restore_metadata(target, entry, options)?;
    Ok(Some(target.to_path_buf()))
}

/// Applies modification time and permissions recorded in the archive.
fn restore_metadata(path: &Path, entry: &Entry, options: &ExtractOptions) -> Result<()> {
    if options.preserve_mtime {
        if let Some(modified) = entry.modified() {
            filetime::set_file_mtime(path, filetime::FileTime::from_system_time(modified))?;
        }
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if options.preserve_permissions && !entry.is_directory {
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
    }
    Ok(())
}

/// Extracts `entries` below `dest`. Returns how many were written.
pub(crate) fn extract_entries(
    volumes: &VolumeSet,
    entries: &[&Entry],
    password: Option<&Password>,
    dest: &Path,
    options: &ExtractOptions,
    tracker: &mut WorkTracker<'_>,
) -> Result<usize> {
    fs::create_dir_all(dest)?;
    let mut written = 0;
    let mut directories = Vec::new();
    for entry in entries {
        tracker.checkpoint()?;
        if let Some(path) = extract_entry_to(volumes, entry, password, dest, None, options, tracker)? {
            written += 1;
            if entry.is_directory {
                directories.push((path, *entry));
            }
        }
    }
    // Directory times last, files written into them would bump them.
    for (path, entry) in directories.iter().rev() {
        restore_metadata(path, entry, options)?;
    }
    Ok(written)
}

/// Decompresses an entry into memory.
pub(crate) fn extract_data(
    volumes: &VolumeSet,
    entry: &Entry,
    password: Option<&Password>,
    tracker: &mut WorkTracker<'_>,
) -> Result<Vec<u8>> {
    tracker.entry_start(&entry.name, entry.size)?;
    let mut reader = open_entry(volumes, entry, password, &mut |_| tracker.checkpoint())?;
    let mut data = Vec::with_capacity(entry.size.min(MAX_PREALLOC) as usize);
    let result = copy_tracked(&mut reader, &mut data, tracker);
    tracker.entry_done(&entry.name, result.is_ok());
    result.map(|_| data)
}

/// Decompresses every entry and checks CRCs and authentication codes.
pub(crate) fn test_entries(
    volumes: &VolumeSet,
    entries: &[Entry],
    password: Option<&Password>,
    tracker: &mut WorkTracker<'_>,
) -> Result<()> {
    for entry in entries.iter().filter(|e| e.is_file()) {
        tracker.entry_start(&entry.name, entry.size)?;
        let opened = open_entry(volumes, entry, password, &mut |_| tracker.checkpoint());
        let result = opened.and_then(|mut reader| copy_tracked(&mut reader, &mut io::sink(), tracker));
        tracker.entry_done(&entry.name, result.is_ok());
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressionMethod;
    use crate::format::parse_archive;
    use crate::progress::NoProgress;
    use crate::write::{EntryMeta, FileSink, ZipParameters, ZipWriter};
    use crate::{ArchivePath, EncryptionMethod};
    use std::fs::File;
    use std::io::Cursor;

    fn write_archive(path: &Path, entries: &[(&str, &[u8])], params: &ZipParameters, password: Option<&Password>) {
        let mut reporter = NoProgress;
        let mut tracker = WorkTracker::new(&mut reporter, 0);
        let mut writer = ZipWriter::new(FileSink::new(File::create(path).unwrap()));
        for (name, data) in entries {
            writer
                .add_entry(
                    &ArchivePath::new(name).unwrap(),
                    &mut Cursor::new(data.to_vec()),
                    &EntryMeta::file(data.len() as u64),
                    params,
                    password,
                    &mut tracker,
                )
                .unwrap();
        }
        writer.finish(b"").unwrap().finish().unwrap();
    }

    #[derive(Default)]
    struct Warnings(Vec<String>);

    impl crate::progress::ProgressReporter for Warnings {
        fn on_warning(&mut self, message: &str) {
            self.0.push(message.to_string());
        }
    }

    fn entries_of(set: &VolumeSet) -> Vec<Entry> {
        let parsed = parse_archive(&mut set.reader(), set.layout()).unwrap();
        parsed
            .records
            .into_iter()
            .enumerate()
            .map(|(i, r)| Entry::from_record(i, r, set.layout()).unwrap())
            .collect()
    }

    #[test]
    fn test_extract_to_disk_and_memory() {
        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("a.zip");
        let params = ZipParameters::new().compression(CompressionMethod::Store);
        write_archive(&zip, &[("sub/x.txt", b"hello")], &params, None);

        let set = VolumeSet::open(&zip).unwrap();
        let entries = entries_of(&set);
        let mut reporter = NoProgress;
        let mut tracker = WorkTracker::new(&mut reporter, 5);

        assert_eq!(extract_data(&set, &entries[0], None, &mut tracker).unwrap(), b"hello");

        let out = dir.path().join("out");
        let refs: Vec<&Entry> = entries.iter().collect();
        let written = extract_entries(&set, &refs, None, &out, &ExtractOptions::default(), &mut tracker).unwrap();
        assert_eq!(written, 1);
        assert_eq!(fs::read(out.join("sub").join("x.txt")).unwrap(), b"hello");
    }

    #[test]
    fn test_overwrite_policies() {
        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("a.zip");
        write_archive(&zip, &[("x.txt", b"new")], &ZipParameters::default(), None);
        let set = VolumeSet::open(&zip).unwrap();
        let entries = entries_of(&set);
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("x.txt"), b"old").unwrap();

        let mut warnings = Warnings::default();
        let mut tracker = WorkTracker::new(&mut warnings, 0);
        let skip = ExtractOptions::new().overwrite(OverwritePolicy::Skip);
        let result = extract_entry_to(&set, &entries[0], None, &out, None, &skip, &mut tracker).unwrap();
        assert!(result.is_none());
        assert_eq!(fs::read(out.join("x.txt")).unwrap(), b"old");
        drop(tracker);
        assert_eq!(warnings.0.len(), 1);
        assert!(warnings.0[0].contains("x.txt"));

        let mut reporter = NoProgress;
        let mut tracker = WorkTracker::new(&mut reporter, 0);

        let error = ExtractOptions::new().overwrite(OverwritePolicy::Error);
        let err = extract_entry_to(&set, &entries[0], None, &out, None, &error, &mut tracker).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::AlreadyExists));

        let renamed =
            extract_entry_to(&set, &entries[0], None, &out, Some("y.txt"), &ExtractOptions::default(), &mut tracker)
                .unwrap();
        assert_eq!(renamed.unwrap(), out.join("y.txt"));
        assert_eq!(fs::read(out.join("y.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_zipcrypto_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("zc.zip");
        let params = ZipParameters::new().encryption(EncryptionMethod::ZipCrypto);
        let password = Password::new("pw");
        let data = b"zipcrypto payload ".repeat(100);
        write_archive(&zip, &[("z.txt", &data)], &params, Some(&password));

        let set = VolumeSet::open(&zip).unwrap();
        let entries = entries_of(&set);
        let mut reporter = NoProgress;
        let mut tracker = WorkTracker::new(&mut reporter, 0);

        assert_eq!(extract_data(&set, &entries[0], Some(&password), &mut tracker).unwrap(), data);
        assert!(matches!(
            extract_data(&set, &entries[0], None, &mut tracker),
            Err(Error::PasswordRequired { .. })
        ));
        let err = extract_data(&set, &entries[0], Some(&Password::new("wrong")), &mut tracker).unwrap_err();
        assert!(matches!(err, Error::WrongPassword { .. }), "{err:?}");
    }

    #[test]
    fn test_traversal_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("a.zip");
        write_archive(&zip, &[("x.txt", b"data")], &ZipParameters::default(), None);
        let set = VolumeSet::open(&zip).unwrap();
        let entries = entries_of(&set);
        let mut reporter = NoProgress;
        let mut tracker = WorkTracker::new(&mut reporter, 0);
        let err = extract_entry_to(
            &set,
            &entries[0],
            None,
            dir.path(),
            Some("../escape.txt"),
            &ExtractOptions::default(),
            &mut tracker,
        )
        .unwrap_err();
        assert!(matches!(err, Error::PathTraversal { .. }));
    }
}

//! Rebuilding an archive with a batch of operations applied.

use std::fs;
use std::path::Path;

use tempfile::NamedTempFile;

use super::operation::{EntrySource, Operation};
use crate::crypto::Password;
use crate::index::ArchiveIndex;
use crate::progress::{ProgressReporter, WorkTracker};
use crate::volume::{MAX_VOLUMES, SplitConfig, SplitWriter, VolumeSet, split_volume_path};
use crate::write::{EntryMeta, FileSink, VolumeSink, ZipParameters, ZipWriter};
use crate::{ArchivePath, Entry, Error, Result};

/// Counts of what an edit did.
#[must_use = "edit result should be checked to verify operation completed as expected"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditResult {
    /// Entries copied over unchanged (raw, without recompression).
    pub entries_kept: usize,
    /// Entries that got a new name.
    pub entries_renamed: usize,
    /// Entries removed.
    pub entries_removed: usize,
    /// Entries that replaced one of the same name.
    pub entries_replaced: usize,
    /// New entries written.
    pub entries_added: usize,
}

impl EditResult {
    /// Returns the number of entries in the resulting archive.
    pub fn total_entries(&self) -> usize {
        self.entries_kept + self.entries_added
    }
}

/// One entry of the archive being built.
enum Planned<'a> {
    Keep {
        entry: &'a Entry,
        name: String,
    },
    New {
        name: String,
        path: ArchivePath,
        source: EntrySource,
        meta: EntryMeta,
        params: ZipParameters,
    },
}

impl Planned<'_> {
    fn name(&self) -> &str {
        match self {
            Planned::Keep { name, .. } | Planned::New { name, .. } => name,
        }
    }

    fn rename(&mut self, new_name: String) -> Result<()> {
        match self {
            Planned::Keep { name, .. } => *name = new_name,
            Planned::New { name, path, .. } => {
                *path = ArchivePath::new(new_name.trim_end_matches('/'))?;
                *name = new_name;
            }
        }
        Ok(())
    }

    fn work(&self) -> u64 {
        match self {
            Planned::Keep { entry, .. } => entry.compressed_size,
            Planned::New { meta, .. } => meta.size,
        }
    }
}

fn position(plan: &[Planned<'_>], name: &str) -> Option<usize> {
    plan.iter().position(|p| p.name() == name)
}

fn directory_prefix(name: &str) -> String {
    format!("{}/", name.trim_end_matches('/'))
}

/// Applies queued operations by writing a new archive and swapping it in.
///
/// Entries that survive are copied raw from the current archive. The new
/// archive is written next to the target and only renamed over it once it
/// is complete, so an error or cancellation leaves the target untouched.
pub(crate) struct ArchiveEditor<'a> {
    source: Option<&'a VolumeSet>,
    index: &'a ArchiveIndex,
    comment: Vec<u8>,
    password: Option<&'a Password>,
    operations: Vec<Operation>,
}

impl<'a> ArchiveEditor<'a> {
    /// Creates an editor over the current state of an archive.
    pub(crate) fn new(
        source: Option<&'a VolumeSet>,
        index: &'a ArchiveIndex,
        comment: &[u8],
        password: Option<&'a Password>,
    ) -> Self {
        Self {
            source,
            index,
            comment: comment.to_vec(),
            password,
            operations: Vec::new(),
        }
    }

    /// Queues an operation.
    #[cfg(test)]
    pub(crate) fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Queues several operations.
    pub(crate) fn extend(&mut self, operations: impl IntoIterator<Item = Operation>) {
        self.operations.extend(operations);
    }

    /// Returns the number of pending operations.
    #[cfg(test)]
    pub(crate) fn pending_operations(&self) -> usize {
        self.operations.len()
    }

    /// The comment the rebuilt archive will carry.
    #[cfg(test)]
    pub(crate) fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// Resolves the operations against the current entries.
    ///
    /// Everything that can be checked without touching data is checked
    /// here, before any output is created.
    fn plan(&mut self) -> Result<(Vec<Planned<'a>>, EditResult)> {
        let index: &'a ArchiveIndex = self.index;
        let mut plan: Vec<Planned<'a>> = index
            .entries()
            .iter()
            .map(|entry| Planned::Keep {
                entry,
                name: entry.name.clone(),
            })
            .collect();
        let mut result = EditResult::default();

        for operation in std::mem::take(&mut self.operations) {
            match operation {
                Operation::Add {
                    path,
                    source,
                    meta,
                    params,
                } => {
                    if !meta.is_directory {
                        params.resolve_password(self.password)?;
                    }
                    let name = path.to_zip_name(meta.is_directory);
                    if let Some(existing) = position(&plan, &name) {
                        if !params.overwrites_existing() {
                            return Err(Error::EntryExists { name });
                        }
                        plan.remove(existing);
                        result.entries_replaced += 1;
                    }
                    plan.push(Planned::New {
                        name,
                        path,
                        source,
                        meta,
                        params,
                    });
                }
                Operation::Remove { name } => {
                    let removed = remove(&mut plan, &name)?;
                    result.entries_removed += removed;
                }
                Operation::Rename { from, to } => {
                    result.entries_renamed += rename(&mut plan, &from, &to)?;
                }
                Operation::SetComment { comment } => {
                    if comment.len() > u16::MAX as usize {
                        return Err(Error::InvalidParameter(format!(
                            "archive comment is {} bytes, at most {} are allowed",
                            comment.len(),
                            u16::MAX
                        )));
                    }
                    self.comment = comment;
                }
            }
        }

        for item in &plan {
            match item {
                Planned::Keep { .. } => result.entries_kept += 1,
                Planned::New { .. } => result.entries_added += 1,
            }
        }
        Ok((plan, result))
    }

    /// Writes the new archive to `target`, split into volumes when `split`
    /// is given.
    pub(crate) fn apply(
        mut self,
        target: &Path,
        split: Option<&SplitConfig>,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<EditResult> {
        let (plan, result) = self.plan()?;
        let total = plan.iter().map(Planned::work).sum();
        let mut tracker = WorkTracker::new(reporter, total);
        log::debug!(
            "rebuilding {}: {} kept, {} added, {} removed, {} renamed",
            target.display(),
            result.entries_kept,
            result.entries_added,
            result.entries_removed,
            result.entries_renamed
        );

        let dir = parent_dir(target);
        match split {
            None => {
                let temp = NamedTempFile::new_in(dir)?;
                let mut writer = ZipWriter::new(FileSink::new(temp.as_file()));
                self.write_plan(&mut writer, plan, &mut tracker)?;
                writer.finish(&self.comment)?.finish()?;
                temp.as_file().sync_all()?;
                temp.persist(target).map_err(|e| Error::Io(e.error))?;
            }
            Some(config) => {
                let file_name = target.file_name().ok_or_else(|| {
                    Error::InvalidParameter(format!("{} has no file name", target.display()))
                })?;
                let staging = tempfile::Builder::new().prefix(".zipkit-split-").tempdir_in(dir)?;
                let mut writer = ZipWriter::new(SplitWriter::create(config.with_path(staging.path().join(file_name)))?);
                self.write_plan(&mut writer, plan, &mut tracker)?;
                let staged = writer.finish(&self.comment)?.finish()?;
                commit_volumes(&staged, target, dir)?;
            }
        }
        log::debug!("committed {}", target.display());
        Ok(result)
    }

    fn write_plan<S: VolumeSink>(
        &self,
        writer: &mut ZipWriter<S>,
        plan: Vec<Planned<'a>>,
        tracker: &mut WorkTracker<'_>,
    ) -> Result<()> {
        let mut reader = self.source.map(VolumeSet::reader);
        for item in plan {
            tracker.checkpoint()?;
            match item {
                Planned::Keep { entry, name } => {
                    let reader = reader
                        .as_mut()
                        .ok_or_else(|| Error::InvalidParameter("no archive to copy entries from".into()))?;
                    tracker.entry_start(&name, entry.compressed_size)?;
                    let new_name = (name != entry.name).then_some(name.as_str());
                    let written = writer.copy_raw_entry(reader, &entry.record, entry.header_offset, new_name, tracker);
                    tracker.entry_done(&name, written.is_ok());
                    written?;
                }
                Planned::New {
                    name,
                    path,
                    source,
                    meta,
                    params,
                } => {
                    tracker.entry_start(&name, meta.size)?;
                    let written = if meta.is_directory {
                        writer.add_directory(&path, &meta, Some(&params))
                    } else {
                        params.resolve_password(self.password).and_then(|password| {
                            let mut reader = source.open()?;
                            writer.add_entry(&path, &mut *reader, &meta, &params, password, tracker)
                        })
                    };
                    tracker.entry_done(&name, written.is_ok());
                    written?;
                }
            }
        }
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Removes `name`, or everything under it if it names a directory.
fn remove(plan: &mut Vec<Planned<'_>>, name: &str) -> Result<usize> {
    if !name.ends_with('/') {
        if let Some(index) = position(plan, name) {
            plan.remove(index);
            return Ok(1);
        }
    }
    let prefix = directory_prefix(name);
    let before = plan.len();
    plan.retain(|p| !p.name().starts_with(&prefix));
    match before - plan.len() {
        0 => Err(Error::entry_not_found(name)),
        removed => Ok(removed),
    }
}

/// Renames `from` to `to`; a directory takes its children along.
fn rename(plan: &mut [Planned<'_>], from: &str, to: &str) -> Result<usize> {
    let target = ArchivePath::normalize(to)?;

    if !from.ends_with('/') {
        if let Some(index) = position(plan, from) {
            let new_name = target.as_str().to_string();
            if new_name == from {
                return Ok(0);
            }
            if position(plan, &new_name).is_some() {
                return Err(Error::EntryExists { name: new_name });
            }
            plan[index].rename(new_name)?;
            return Ok(1);
        }
    }

    let from_prefix = directory_prefix(from);
    let to_prefix = directory_prefix(target.as_str());
    let moved: Vec<(usize, String)> = plan
        .iter()
        .enumerate()
        .filter_map(|(i, p)| {
            p.name()
                .strip_prefix(&from_prefix)
                .map(|rest| (i, format!("{}{}", to_prefix, rest)))
        })
        .collect();
    if moved.is_empty() {
        return Err(Error::entry_not_found(from));
    }
    if from_prefix == to_prefix {
        return Ok(0);
    }
    for (_, new_name) in &moved {
        let clash = plan
            .iter()
            .enumerate()
            .any(|(i, p)| p.name() == new_name && !moved.iter().any(|(m, _)| *m == i));
        if clash {
            return Err(Error::EntryExists { name: new_name.clone() });
        }
    }
    let count = moved.len();
    for (index, new_name) in moved {
        plan[index].rename(new_name)?;
    }
    Ok(count)
}

/// Moves staged volumes next to the target and drops leftovers of a
/// previous, longer volume set.
fn commit_volumes(staged: &[std::path::PathBuf], target: &Path, dir: &Path) -> Result<()> {
    for volume in staged {
        let name = volume.file_name().ok_or_else(|| {
            Error::InvalidParameter(format!("{} has no file name", volume.display()))
        })?;
        fs::rename(volume, dir.join(name))?;
    }
    let mut number = staged.len() as u32;
    while number < MAX_VOLUMES {
        let stale = split_volume_path(target, number);
        if !stale.exists() {
            break;
        }
        if let Err(e) = fs::remove_file(&stale) {
            log::warn!("could not remove stale volume {}: {}", stale.display(), e);
        }
        number += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{CentralDirectoryHeader, DiskLayout, ExtraFields, flags, version};
    use crate::timestamp::DosDateTime;

    fn index(names: &[&str]) -> ArchiveIndex {
        let records = names
            .iter()
            .map(|name| CentralDirectoryHeader {
                version_made_by: version::MADE_BY,
                version_needed: version::DEFAULT,
                flags: flags::UTF8,
                method: 0,
                modified: DosDateTime::MIN,
                crc32: 0,
                compressed_size: 0,
                uncompressed_size: 0,
                disk_number_start: 0,
                internal_attributes: 0,
                external_attributes: 0,
                local_header_offset: 0,
                name: name.as_bytes().to_vec(),
                extra: ExtraFields::default(),
                comment: Vec::new(),
            })
            .collect();
        ArchiveIndex::from_records(records, &DiskLayout::single(100)).unwrap()
    }

    fn planned_names(editor: &mut ArchiveEditor<'_>) -> Result<(Vec<String>, EditResult)> {
        let (plan, result) = editor.plan()?;
        Ok((plan.iter().map(|p| p.name().to_string()).collect(), result))
    }

    #[test]
    fn test_plan_remove_directory() {
        let index = index(&["dir/", "dir/a.txt", "dir/sub/b", "dirt.txt"]);
        let mut editor = ArchiveEditor::new(None, &index, b"", None);
        editor.push(Operation::Remove { name: "dir".into() });
        let (names, result) = planned_names(&mut editor).unwrap();
        assert_eq!(names, ["dirt.txt"]);
        assert_eq!(result.entries_removed, 3);
        assert_eq!(result.entries_kept, 1);
    }

    #[test]
    fn test_plan_remove_missing() {
        let index = index(&["a.txt"]);
        let mut editor = ArchiveEditor::new(None, &index, b"", None);
        editor.push(Operation::Remove { name: "b.txt".into() });
        assert!(matches!(planned_names(&mut editor), Err(Error::EntryNotFound { .. })));
    }

    #[test]
    fn test_plan_rename_directory_with_children() {
        let index = index(&["old/", "old/a.txt", "other.txt"]);
        let mut editor = ArchiveEditor::new(None, &index, b"", None);
        editor.push(Operation::Rename {
            from: "old".into(),
            to: "new".into(),
        });
        let (names, result) = planned_names(&mut editor).unwrap();
        assert_eq!(names, ["new/", "new/a.txt", "other.txt"]);
        assert_eq!(result.entries_renamed, 2);
    }

    #[test]
    fn test_plan_rename_conflict() {
        let index = index(&["a.txt", "b.txt"]);
        let mut editor = ArchiveEditor::new(None, &index, b"", None);
        editor.push(Operation::Rename {
            from: "a.txt".into(),
            to: "b.txt".into(),
        });
        assert!(matches!(planned_names(&mut editor), Err(Error::EntryExists { .. })));

        let mut editor = ArchiveEditor::new(None, &index, b"", None);
        editor.push(Operation::Rename {
            from: "a.txt".into(),
            to: "../evil".into(),
        });
        assert!(matches!(planned_names(&mut editor), Err(Error::InvalidArchivePath(_))));
    }

    #[test]
    fn test_plan_add_replaces_or_fails() {
        let index = index(&["a.txt"]);
        let mut editor = ArchiveEditor::new(None, &index, b"", None);
        editor.push(Operation::add_data("a.txt", b"new".to_vec(), &ZipParameters::default()).unwrap());
        let (names, result) = planned_names(&mut editor).unwrap();
        assert_eq!(names, ["a.txt"]);
        assert_eq!(result.entries_replaced, 1);
        assert_eq!(result.entries_added, 1);
        assert_eq!(result.entries_kept, 0);

        let keep = ZipParameters::new().overwrite_existing(false);
        let mut editor = ArchiveEditor::new(None, &index, b"", None);
        editor.push(Operation::add_data("a.txt", b"new".to_vec(), &keep).unwrap());
        assert!(matches!(planned_names(&mut editor), Err(Error::EntryExists { .. })));
    }

    #[test]
    fn test_plan_rejects_encryption_without_password() {
        let index = index(&[]);
        let params = ZipParameters::new().encryption(crate::EncryptionMethod::ZipCrypto);
        let mut editor = ArchiveEditor::new(None, &index, b"", None);
        editor.push(Operation::add_data("a.txt", b"x".to_vec(), &params).unwrap());
        assert!(matches!(planned_names(&mut editor), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_plan_comment() {
        let index = index(&["a"]);
        let mut editor = ArchiveEditor::new(None, &index, b"old", None);
        editor.push(Operation::SetComment {
            comment: b"new".to_vec(),
        });
        assert_eq!(editor.pending_operations(), 1);
        let _ = planned_names(&mut editor).unwrap();
        assert_eq!(editor.comment(), b"new");
    }
}

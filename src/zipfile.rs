//! The archive facade.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::crypto::Password;
use crate::edit::{ArchiveEditor, EditResult, Operation};
use crate::format::{decode_text, parse_archive};
use crate::index::ArchiveIndex;
use crate::progress::{MonitorState, OperationKind, ProgressMonitor, ProgressReporter, WorkTracker};
use crate::read::{self, EntryReader, ExtractOptions};
use crate::volume::{MIN_VOLUME_SIZE, SplitConfig, VolumeSet, merge_volumes};
use crate::write::ZipParameters;
use crate::{Entry, Error, Result};

/// A zip archive on disk, possibly split into volumes.
///
/// `ZipFile` keeps the archive's entry index in memory and rewrites the file
/// for every mutation. Mutations need `&mut self`; reading, extracting and
/// streaming work through `&self`, each with its own file handle.
///
/// # Examples
///
/// ```rust,no_run
/// use zipkit::{ZipFile, ZipParameters};
///
/// let mut zip = ZipFile::create("a.zip")?;
/// zip.add_data("x.txt", b"hello", &ZipParameters::default())?;
/// drop(zip);
///
/// let zip = ZipFile::open("a.zip")?;
/// assert_eq!(zip.entry_count(), 1);
/// assert_eq!(zip.extract_data("x.txt")?, b"hello");
/// # Ok::<(), zipkit::Error>(())
/// ```
pub struct ZipFile {
    path: PathBuf,
    /// `None` until the archive exists on disk.
    volumes: Option<VolumeSet>,
    index: ArchiveIndex,
    comment: Vec<u8>,
    password: Option<Password>,
    /// Set when rewrites must produce a split archive.
    split: Option<SplitConfig>,
    valid: bool,
    monitor: Mutex<ProgressMonitor>,
}

struct Loaded {
    volumes: VolumeSet,
    index: ArchiveIndex,
    comment: Vec<u8>,
}

fn load(path: &Path) -> Result<Loaded> {
    let volumes = VolumeSet::open(path)?;
    let parsed = parse_archive(&mut volumes.reader(), volumes.layout())?;
    let index = ArchiveIndex::from_records(parsed.records, volumes.layout())?;
    log::debug!(
        "opened {}: {} entries in {} volume(s)",
        path.display(),
        index.len(),
        volumes.volume_count()
    );
    Ok(Loaded {
        volumes,
        index,
        comment: parsed.comment,
    })
}

/// Failures after which the archive on disk can no longer be trusted.
fn is_fatal(error: &Error) -> bool {
    matches!(error, Error::CorruptHeader { .. } | Error::InvalidFormat(_))
}

impl ZipFile {
    fn from_loaded(path: PathBuf, loaded: Loaded) -> Result<Self> {
        let split = if loaded.volumes.is_split() {
            Some(SplitConfig::new(
                &path,
                loaded.volumes.first_volume_size().max(MIN_VOLUME_SIZE),
            )?)
        } else {
            None
        };
        Ok(Self {
            path,
            volumes: Some(loaded.volumes),
            index: loaded.index,
            comment: loaded.comment,
            password: None,
            split,
            valid: true,
            monitor: Mutex::new(ProgressMonitor::new()),
        })
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            volumes: None,
            index: ArchiveIndex::default(),
            comment: Vec::new(),
            password: None,
            split: None,
            valid: true,
            monitor: Mutex::new(ProgressMonitor::new()),
        }
    }

    /// Opens an existing archive.
    ///
    /// For a split archive pass the final `.zip` volume.
    ///
    /// # Errors
    ///
    /// [`Error::FileNotFound`] if the file is missing, a format error if it
    /// is not a readable zip archive, [`Error::VolumeMissing`] if a volume
    /// of a split archive is absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let loaded = load(&path)?;
        Self::from_loaded(path, loaded)
    }

    /// Opens an existing archive and sets the password for its entries.
    pub fn open_with_password(path: impl AsRef<Path>, password: impl Into<Password>) -> Result<Self> {
        let mut zip = Self::open(path)?;
        zip.set_password(password);
        Ok(zip)
    }

    /// Opens the archive at `path`, or starts a new one if it does not exist.
    ///
    /// A new archive is written on its first mutation.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            Self::open(path)
        } else {
            Ok(Self::empty(path))
        }
    }

    /// Like [`create`](Self::create), but every write produces a split
    /// archive with volumes of at most `volume_size` bytes.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `volume_size` is below
    /// [`MIN_VOLUME_SIZE`].
    pub fn create_split(path: impl AsRef<Path>, volume_size: u64) -> Result<Self> {
        let config = SplitConfig::new(path.as_ref(), volume_size)?;
        let mut zip = Self::create(path)?;
        zip.split = Some(config);
        Ok(zip)
    }

    /// Path of the archive (the `.zip` volume for split archives).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the archive exists on disk and has not been
    /// invalidated by a fatal error.
    pub fn is_valid(&self) -> bool {
        self.valid && self.volumes.is_some()
    }

    /// Returns true if any entry is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.index.has_encrypted_entries()
    }

    /// Returns true if the archive spans several volumes.
    pub fn is_split(&self) -> bool {
        self.volumes.as_ref().is_some_and(VolumeSet::is_split)
    }

    /// Volume paths in disk order; just the archive itself when not split.
    pub fn split_files(&self) -> Vec<PathBuf> {
        self.volumes.as_ref().map(|v| v.paths().to_vec()).unwrap_or_default()
    }

    /// The archive comment.
    pub fn comment(&self) -> String {
        decode_text(&self.comment, true)
    }

    /// Sets the archive password used to read and write encrypted entries.
    pub fn set_password(&mut self, password: impl Into<Password>) {
        self.password = Some(password.into());
    }

    /// Returns true if a password is set.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Number of entries.
    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    /// All entries in central directory order.
    pub fn entries(&self) -> &[Entry] {
        self.index.entries()
    }

    /// The entry index.
    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    /// Entry named `name`.
    ///
    /// # Errors
    ///
    /// [`Error::EntryNotFound`] if there is none.
    pub fn entry(&self, name: &str) -> Result<&Entry> {
        self.index.require(name)
    }

    /// Entry at position `index`.
    ///
    /// # Errors
    ///
    /// [`Error::EntryIndexOutOfRange`] past the end.
    pub fn entry_at(&self, index: usize) -> Result<&Entry> {
        self.index.get(index)
    }

    /// Monitor of the current or next operation.
    ///
    /// A monitor whose operation has finished stays finished; in that case
    /// a fresh one is installed and returned.
    pub fn monitor(&self) -> ProgressMonitor {
        let mut slot = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_finished() {
            *slot = ProgressMonitor::new();
        }
        slot.clone()
    }

    fn begin(&self, kind: OperationKind) -> ProgressMonitor {
        let mut slot = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_finished() || slot.state() == MonitorState::Busy {
            *slot = ProgressMonitor::new();
        }
        slot.begin(kind);
        slot.clone()
    }

    /// Runs `f` under a monitor of kind `kind`.
    fn tracked<T>(&self, kind: OperationKind, f: impl FnOnce(&mut dyn ProgressReporter) -> Result<T>) -> Result<T> {
        let monitor = self.begin(kind);
        let mut reporter = monitor.clone();
        let result = f(&mut reporter);
        monitor.finish(&result);
        result
    }

    fn volumes(&self) -> Result<&VolumeSet> {
        self.volumes.as_ref().ok_or_else(|| Error::FileNotFound {
            path: self.path.clone(),
        })
    }

    // ---- mutation ----

    /// Applies a batch of operations in a single rewrite.
    pub fn apply(&mut self, operations: Vec<Operation>) -> Result<EditResult> {
        let kind = match operations.first() {
            Some(Operation::Remove { .. }) => OperationKind::Remove,
            Some(Operation::Rename { .. }) => OperationKind::Rename,
            Some(Operation::SetComment { .. }) => OperationKind::Comment,
            _ => OperationKind::Add,
        };
        self.mutate(kind, operations)
    }

    fn mutate(&mut self, kind: OperationKind, operations: Vec<Operation>) -> Result<EditResult> {
        let monitor = self.begin(kind);
        let mut reporter = monitor.clone();
        let result = self.rewrite(operations, &mut reporter);
        monitor.finish(&result);
        result
    }

    fn rewrite(&mut self, operations: Vec<Operation>, reporter: &mut dyn ProgressReporter) -> Result<EditResult> {
        if !self.valid {
            return Err(Error::ArchiveInvalidated {
                path: self.path.clone(),
            });
        }
        let mut editor = ArchiveEditor::new(self.volumes.as_ref(), &self.index, &self.comment, self.password.as_ref());
        editor.extend(operations);
        let result = match editor.apply(&self.path, self.split.as_ref(), reporter) {
            Ok(result) => result,
            Err(e) => {
                if is_fatal(&e) {
                    log::warn!("{} is unreadable, refusing further changes: {}", self.path.display(), e);
                    self.valid = false;
                }
                return Err(e);
            }
        };
        match load(&self.path) {
            Ok(loaded) => {
                self.volumes = Some(loaded.volumes);
                self.index = loaded.index;
                self.comment = loaded.comment;
                Ok(result)
            }
            Err(e) => {
                self.valid = false;
                Err(e)
            }
        }
    }

    /// Adds a file, or a directory with everything below it.
    pub fn add_file(&mut self, path: impl AsRef<Path>, params: &ZipParameters) -> Result<()> {
        let operations = Operation::add_path(path, params)?;
        self.mutate(OperationKind::Add, operations).map(|_| ())
    }

    /// Adds several files in one rewrite.
    pub fn add_files<P: AsRef<Path>>(&mut self, paths: &[P], params: &ZipParameters) -> Result<()> {
        let mut operations = Vec::new();
        for path in paths {
            operations.extend(Operation::add_path(path, params)?);
        }
        self.mutate(OperationKind::Add, operations).map(|_| ())
    }

    /// Adds a directory from disk, recursively.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `path` is not a directory.
    pub fn add_directory(&mut self, path: impl AsRef<Path>, params: &ZipParameters) -> Result<()> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::InvalidParameter(format!("{} is not a directory", path.display())));
        }
        self.add_file(path, params)
    }

    /// Adds an empty directory entry.
    pub fn add_directory_entry(&mut self, name: &str, params: &ZipParameters) -> Result<()> {
        let operation = Operation::add_directory_entry(name, params)?;
        self.mutate(OperationKind::Add, vec![operation]).map(|_| ())
    }

    /// Adds `data` as an entry named `name`.
    pub fn add_data(&mut self, name: &str, data: impl AsRef<[u8]>, params: &ZipParameters) -> Result<()> {
        let operation = Operation::add_data(name, data.as_ref().to_vec(), params)?;
        self.mutate(OperationKind::Add, vec![operation]).map(|_| ())
    }

    /// Adds everything `reader` yields as an entry named `name`.
    pub fn add_stream(
        &mut self,
        name: &str,
        reader: impl Read + Send + 'static,
        params: &ZipParameters,
    ) -> Result<()> {
        let operation = Operation::add_stream(name, reader, params)?;
        self.mutate(OperationKind::Add, vec![operation]).map(|_| ())
    }

    /// Removes an entry; a directory is removed with its contents.
    pub fn remove_file(&mut self, name: &str) -> Result<()> {
        self.remove_files(&[name])
    }

    /// Removes several entries in one rewrite.
    pub fn remove_files(&mut self, names: &[&str]) -> Result<()> {
        let operations = names
            .iter()
            .map(|name| Operation::Remove { name: name.to_string() })
            .collect();
        self.mutate(OperationKind::Remove, operations).map(|_| ())
    }

    /// Removes the entry at position `index`.
    pub fn remove_entry_at(&mut self, index: usize) -> Result<()> {
        let name = self.index.get(index)?.name.clone();
        self.remove_file(&name)
    }

    /// Renames an entry; a directory is renamed with its contents.
    ///
    /// # Errors
    ///
    /// [`Error::EntryNotFound`] if `from` does not exist,
    /// [`Error::EntryExists`] if `to` is taken, [`Error::InvalidArchivePath`]
    /// if `to` is not a valid name.
    pub fn rename_entry(&mut self, from: &str, to: &str) -> Result<()> {
        let operation = Operation::Rename {
            from: from.to_string(),
            to: to.to_string(),
        };
        self.mutate(OperationKind::Rename, vec![operation]).map(|_| ())
    }

    /// Replaces the archive comment.
    pub fn set_comment(&mut self, comment: &str) -> Result<()> {
        let operation = Operation::SetComment {
            comment: comment.as_bytes().to_vec(),
        };
        self.mutate(OperationKind::Comment, vec![operation]).map(|_| ())
    }

    // ---- reading ----

    /// Opens a stream over the decompressed data of `name`.
    pub fn input_stream(&self, name: &str) -> Result<EntryReader> {
        let entry = self.index.require(name)?;
        self.open_stream(entry)
    }

    /// Opens a stream over the decompressed data of the entry at `index`.
    pub fn input_stream_at(&self, index: usize) -> Result<EntryReader> {
        let entry = self.index.get(index)?;
        self.open_stream(entry)
    }

    fn open_stream(&self, entry: &Entry) -> Result<EntryReader> {
        read::open_entry(self.volumes()?, entry, self.password.as_ref(), &mut |_| Ok(()))
    }

    /// Decompresses the entry `name` into memory.
    pub fn extract_data(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.index.require(name)?;
        self.tracked(OperationKind::Extract, |reporter| {
            let mut tracker = WorkTracker::new(reporter, entry.size);
            read::extract_data(self.volumes()?, entry, self.password.as_ref(), &mut tracker)
        })
    }

    /// Extracts every entry below `dest` with default options.
    pub fn extract_all(&self, dest: impl AsRef<Path>) -> Result<()> {
        self.extract_all_with(dest, &ExtractOptions::default())
    }

    /// Extracts every entry below `dest`.
    pub fn extract_all_with(&self, dest: impl AsRef<Path>, options: &ExtractOptions) -> Result<()> {
        let entries: Vec<&Entry> = self.index.entries().iter().collect();
        self.extract_selected(&entries, dest.as_ref(), options)
    }

    fn extract_selected(&self, entries: &[&Entry], dest: &Path, options: &ExtractOptions) -> Result<()> {
        let total = entries.iter().map(|e| e.size).sum();
        self.tracked(OperationKind::Extract, |reporter| {
            let mut tracker = WorkTracker::new(reporter, total);
            if entries.is_empty() {
                std::fs::create_dir_all(dest)?;
                return Ok(());
            }
            read::extract_entries(self.volumes()?, entries, self.password.as_ref(), dest, options, &mut tracker)
                .map(|_| ())
        })
    }

    /// Extracts the entry `name` below `dest`. A directory is extracted with
    /// its contents.
    pub fn extract_file(&self, name: &str, dest: impl AsRef<Path>) -> Result<()> {
        self.extract_file_with(name, dest, None, &ExtractOptions::default())
    }

    /// Extracts the entry `name` below `dest`, optionally under `new_name`.
    pub fn extract_file_with(
        &self,
        name: &str,
        dest: impl AsRef<Path>,
        new_name: Option<&str>,
        options: &ExtractOptions,
    ) -> Result<()> {
        let dest = dest.as_ref();
        let entry = self.index.require(name)?;
        if !entry.is_directory {
            return self.extract_one(entry, dest, new_name, options);
        }
        let children: Vec<&Entry> = self.index.under(&entry.name).collect();
        match new_name {
            None => self.extract_selected(&children, dest, options),
            Some(new_name) => {
                let total = children.iter().map(|e| e.size).sum();
                let base = new_name.trim_end_matches('/');
                self.tracked(OperationKind::Extract, |reporter| {
                    let mut tracker = WorkTracker::new(reporter, total);
                    let volumes = self.volumes()?;
                    for child in &children {
                        let renamed = format!("{}/{}", base, &child.name[entry.name.len()..]);
                        read::extract_entry_to(
                            volumes,
                            child,
                            self.password.as_ref(),
                            dest,
                            Some(&renamed),
                            options,
                            &mut tracker,
                        )?;
                    }
                    Ok(())
                })
            }
        }
    }

    /// Extracts the entry at position `index` below `dest`.
    pub fn extract_entry(&self, index: usize, dest: impl AsRef<Path>) -> Result<()> {
        let entry = self.index.get(index)?;
        self.extract_one(entry, dest.as_ref(), None, &ExtractOptions::default())
    }

    fn extract_one(&self, entry: &Entry, dest: &Path, new_name: Option<&str>, options: &ExtractOptions) -> Result<()> {
        self.tracked(OperationKind::Extract, |reporter| {
            let mut tracker = WorkTracker::new(reporter, entry.size);
            read::extract_entry_to(
                self.volumes()?,
                entry,
                self.password.as_ref(),
                dest,
                new_name,
                options,
                &mut tracker,
            )
            .map(|_| ())
        })
    }

    /// Decompresses every entry, checking CRCs and authentication codes.
    pub fn test_archive(&self) -> Result<()> {
        self.tracked(OperationKind::Test, |reporter| {
            let mut tracker = WorkTracker::new(reporter, self.index.total_size());
            if self.index.is_empty() {
                return Ok(());
            }
            read::test_entries(self.volumes()?, self.index.entries(), self.password.as_ref(), &mut tracker)
        })
    }

    // ---- split archives ----

    /// Joins a split archive into the single file `output`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the archive is not split.
    pub fn merge_split_files(&self, output: impl AsRef<Path>) -> Result<()> {
        let output = output.as_ref();
        self.tracked(OperationKind::Merge, |reporter| {
            let volumes = self.volumes()?;
            if !volumes.is_split() {
                return Err(Error::InvalidParameter(format!(
                    "{} is not a split archive",
                    self.path.display()
                )));
            }
            merge_volumes(volumes, output, reporter)
        })
    }

    /// Writes this archive as a new split archive at `output` and returns
    /// its volume paths.
    pub fn split_to(&self, output: impl AsRef<Path>, volume_size: u64) -> Result<Vec<PathBuf>> {
        let output = output.as_ref();
        let config = SplitConfig::new(output, volume_size)?;
        self.tracked(OperationKind::Split, |reporter| {
            let editor =
                ArchiveEditor::new(self.volumes.as_ref(), &self.index, &self.comment, self.password.as_ref());
            let result = editor.apply(output, Some(&config), reporter)?;
            log::debug!("split copy kept {} entries", result.entries_kept);
            Ok(VolumeSet::open(output)?.paths().to_vec())
        })
    }
}

impl std::fmt::Debug for ZipFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipFile")
            .field("path", &self.path)
            .field("entries", &self.index.len())
            .field("split", &self.is_split())
            .field("valid", &self.valid)
            .field("has_password", &self.password.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompressionMethod, EncryptionMethod};

    #[test]
    fn test_create_add_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.zip");
        let mut zip = ZipFile::create(&path).unwrap();
        assert!(!zip.is_valid());
        zip.add_data("x.txt", b"hello", &ZipParameters::default()).unwrap();
        assert!(zip.is_valid());
        drop(zip);

        let zip = ZipFile::open(&path).unwrap();
        assert_eq!(zip.entry_count(), 1);
        assert_eq!(zip.extract_data("x.txt").unwrap(), b"hello");
        assert!(!zip.is_split());
        assert_eq!(zip.split_files(), vec![path]);
    }

    #[test]
    fn test_open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = ZipFile::open(dir.path().join("nope.zip")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_rename_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut zip = ZipFile::create(dir.path().join("a.zip")).unwrap();
        let params = ZipParameters::new().compression(CompressionMethod::Store);
        zip.add_data("a.txt", b"alpha", &params).unwrap();
        zip.add_data("b.txt", b"beta", &params).unwrap();
        zip.rename_entry("a.txt", "c.txt").unwrap();
        assert!(matches!(zip.entry("a.txt"), Err(Error::EntryNotFound { .. })));
        assert_eq!(zip.extract_data("c.txt").unwrap(), b"alpha");
        zip.remove_file("b.txt").unwrap();
        assert_eq!(zip.entry_count(), 1);
    }

    #[test]
    fn test_comment_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.zip");
        let mut zip = ZipFile::create(&path).unwrap();
        zip.set_comment("release build").unwrap();
        assert_eq!(ZipFile::open(&path).unwrap().comment(), "release build");
    }

    #[test]
    fn test_monitor_after_operation() {
        let dir = tempfile::tempdir().unwrap();
        let mut zip = ZipFile::create(dir.path().join("m.zip")).unwrap();
        let monitor = zip.monitor();
        zip.add_data("x", b"data", &ZipParameters::default()).unwrap();
        assert!(monitor.is_finished());
        assert_eq!(monitor.percent_complete(), 100);
        assert_eq!(monitor.current_operation(), OperationKind::Add);

        let next = zip.monitor();
        assert!(!next.is_finished());
    }

    #[test]
    fn test_encrypted_entry_needs_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("e.zip");
        let mut zip = ZipFile::create(&path).unwrap();
        zip.set_password("pw");
        let params = ZipParameters::new().encryption(EncryptionMethod::ZipCrypto);
        zip.add_data("s.txt", b"secret", &params).unwrap();
        assert!(zip.is_encrypted());

        let reopened = ZipFile::open(&path).unwrap();
        assert!(matches!(
            reopened.extract_data("s.txt"),
            Err(Error::PasswordRequired { .. })
        ));
        let with_pw = ZipFile::open_with_password(&path, "pw").unwrap();
        assert_eq!(with_pw.extract_data("s.txt").unwrap(), b"secret");
    }
}

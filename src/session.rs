//! Handle-based access to archives.
//!
//! A [`Session`] owns every archive, entry snapshot, stream and progress
//! monitor it hands out and refers to them through typed [`Handle`]s. A
//! handle carries a generation, so using one after its object was closed
//! fails with [`Error::InvalidHandle`] instead of reaching a different
//! object that reused the slot.
//!
//! Every failing call stores its message as the last error of the handle
//! involved; [`Session::last_error`] returns it. [`status_of`] turns any
//! result into the integer code used at this boundary.
//!
//! ```rust,no_run
//! use zipkit::session::{Session, status_of};
//! use zipkit::ZipParameters;
//!
//! let mut session = Session::new();
//! let zip = session.create_archive("a.zip")?;
//! session.add_data(zip, "x.txt", b"hello", &ZipParameters::default())?;
//! let entry = session.entry_by_name(zip, "x.txt")?;
//! assert_eq!(session.entry(entry)?.size, 5);
//!
//! session.close_archive(zip)?;
//! assert_eq!(status_of(&session.entry_count(zip)), -1);
//! assert!(session.last_error(zip).is_some());
//! # Ok::<(), zipkit::Error>(())
//! ```

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::error::map_io_error;
use crate::progress::ProgressMonitor;
use crate::write::ZipParameters;
use crate::{Entry, EntryReader, Error, Result, StatusCode, ZipFile};

/// Objects a [`Session`] hands out handles for.
pub trait Resource {
    /// Name used in error messages.
    const KIND: &'static str;
}

impl Resource for ZipFile {
    const KIND: &'static str = "archive";
}

impl Resource for Entry {
    const KIND: &'static str = "entry";
}

impl Resource for EntryReader {
    const KIND: &'static str = "stream";
}

impl Resource for ProgressMonitor {
    const KIND: &'static str = "progress";
}

/// A generation-checked reference to an object owned by a [`Session`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

/// Handle to an open archive.
pub type ArchiveHandle = Handle<ZipFile>;
/// Handle to an entry snapshot.
pub type EntryHandle = Handle<Entry>;
/// Handle to an open entry stream.
pub type StreamHandle = Handle<EntryReader>;
/// Handle to an operation monitor.
pub type MonitorHandle = Handle<ProgressMonitor>;

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Packs the handle into one integer, generation in the high half.
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Inverse of [`to_raw`](Self::to_raw). Any value is accepted; unknown
    /// ones fail when used.
    pub fn from_raw(raw: u64) -> Self {
        Self::new(raw as u32, (raw >> 32) as u32)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_raw().hash(state);
    }
}

impl<T: Resource> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}v{}", T::KIND, self.index, self.generation)
    }
}

struct Slot<V> {
    generation: u32,
    value: Option<V>,
}

/// Slot storage addressed by `Handle<T>`, holding values of type `V`.
struct Arena<T, V = T> {
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Resource, V> Arena<T, V> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn insert(&mut self, value: V) -> Handle<T> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle::new(index, 0)
    }

    fn invalid() -> Error {
        Error::InvalidHandle { kind: T::KIND }
    }

    fn get(&self, handle: Handle<T>) -> Result<&V> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or_else(Self::invalid)
    }

    fn get_mut(&mut self, handle: Handle<T>) -> Result<&mut V> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
            .ok_or_else(Self::invalid)
    }

    fn remove(&mut self, handle: Handle<T>) -> Result<V> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or_else(Self::invalid)?;
        let value = slot.value.take().ok_or_else(Self::invalid)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Ok(value)
    }

    /// Removes every value for which `drop_it` returns true.
    fn remove_where(&mut self, mut drop_it: impl FnMut(&V) -> bool) -> usize {
        let mut removed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.as_ref().is_some_and(&mut drop_it) {
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                removed += 1;
            }
        }
        removed
    }

    fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value.is_some()).count()
    }
}

/// An object that belongs to one archive and dies with it.
struct Owned<V> {
    archive: ArchiveHandle,
    value: V,
}

type ErrorKey = (&'static str, u64);

fn key_of<T: Resource>(handle: Handle<T>) -> ErrorKey {
    (T::KIND, handle.to_raw())
}

/// Integer status code of `result`: `0` on success, negative otherwise.
pub fn status_of<T>(result: &Result<T>) -> i32 {
    StatusCode::of(result).code()
}

/// Owner of archives and everything opened from them.
pub struct Session {
    archives: Arena<ZipFile>,
    entries: Arena<Entry, Owned<Entry>>,
    streams: Arena<EntryReader, Owned<EntryReader>>,
    monitors: Arena<ProgressMonitor, Owned<ProgressMonitor>>,
    errors: HashMap<ErrorKey, String>,
    last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self {
            archives: Arena::new(),
            entries: Arena::new(),
            streams: Arena::new(),
            monitors: Arena::new(),
            errors: HashMap::new(),
            last_error: None,
        }
    }

    fn record<T>(&mut self, key: Option<ErrorKey>, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            let message = e.to_string();
            log::debug!("session call failed: {}", message);
            if let Some(key) = key {
                self.errors.insert(key, message.clone());
            }
            self.last_error = Some(message);
        }
        result
    }

    fn on_archive<R>(&mut self, zip: ArchiveHandle, f: impl FnOnce(&mut ZipFile) -> Result<R>) -> Result<R> {
        let result = self.archives.get_mut(zip).and_then(f);
        self.record(Some(key_of(zip)), result)
    }

    fn register_archive(&mut self, result: Result<ZipFile>) -> Result<ArchiveHandle> {
        let result = result.map(|zip| self.archives.insert(zip));
        self.record(None, result)
    }

    // ---- lifecycle ----

    /// Opens an existing archive.
    pub fn open_archive(&mut self, path: impl AsRef<Path>) -> Result<ArchiveHandle> {
        self.register_archive(ZipFile::open(path))
    }

    /// Opens an existing archive with a password.
    pub fn open_archive_with_password(&mut self, path: impl AsRef<Path>, password: &str) -> Result<ArchiveHandle> {
        self.register_archive(ZipFile::open_with_password(path, password))
    }

    /// Opens the archive at `path` or starts a new one.
    pub fn create_archive(&mut self, path: impl AsRef<Path>) -> Result<ArchiveHandle> {
        self.register_archive(ZipFile::create(path))
    }

    /// Starts a split archive with volumes of at most `volume_size` bytes.
    pub fn create_split_archive(&mut self, path: impl AsRef<Path>, volume_size: u64) -> Result<ArchiveHandle> {
        self.register_archive(ZipFile::create_split(path, volume_size))
    }

    /// Closes an archive together with its entries, streams and monitors.
    pub fn close_archive(&mut self, zip: ArchiveHandle) -> Result<()> {
        let result = self.archives.remove(zip).map(|closed| {
            let entries = self.entries.remove_where(|e| e.archive == zip);
            let streams = self.streams.remove_where(|s| s.archive == zip);
            let monitors = self.monitors.remove_where(|m| m.archive == zip);
            log::debug!(
                "closed {}: released {} entries, {} streams, {} monitors",
                closed.path().display(),
                entries,
                streams,
                monitors
            );
        });
        self.record(Some(key_of(zip)), result)
    }

    /// Number of archives open in this session.
    pub fn open_archives(&self) -> usize {
        self.archives.len()
    }

    // ---- introspection ----

    /// Returns true if the archive exists on disk and is usable.
    pub fn is_valid(&mut self, zip: ArchiveHandle) -> Result<bool> {
        self.on_archive(zip, |z| Ok(z.is_valid()))
    }

    /// Returns true if any entry is encrypted.
    pub fn is_encrypted(&mut self, zip: ArchiveHandle) -> Result<bool> {
        self.on_archive(zip, |z| Ok(z.is_encrypted()))
    }

    /// Returns true if the archive spans several volumes.
    pub fn is_split(&mut self, zip: ArchiveHandle) -> Result<bool> {
        self.on_archive(zip, |z| Ok(z.is_split()))
    }

    /// Path of the archive.
    pub fn archive_path(&mut self, zip: ArchiveHandle) -> Result<PathBuf> {
        self.on_archive(zip, |z| Ok(z.path().to_path_buf()))
    }

    /// The archive comment.
    pub fn comment(&mut self, zip: ArchiveHandle) -> Result<String> {
        self.on_archive(zip, |z| Ok(z.comment()))
    }

    /// Replaces the archive comment.
    pub fn set_comment(&mut self, zip: ArchiveHandle, comment: &str) -> Result<()> {
        self.on_archive(zip, |z| z.set_comment(comment))
    }

    /// Sets the archive password.
    pub fn set_password(&mut self, zip: ArchiveHandle, password: &str) -> Result<()> {
        self.on_archive(zip, |z| {
            z.set_password(password);
            Ok(())
        })
    }

    /// Number of entries.
    pub fn entry_count(&mut self, zip: ArchiveHandle) -> Result<usize> {
        self.on_archive(zip, |z| Ok(z.entry_count()))
    }

    fn register_entry(&mut self, zip: ArchiveHandle, lookup: impl FnOnce(&ZipFile) -> Result<&Entry>) -> Result<EntryHandle> {
        let result = self.archives.get(zip).and_then(|z| lookup(z).cloned());
        let result = result.map(|entry| self.entries.insert(Owned { archive: zip, value: entry }));
        self.record(Some(key_of(zip)), result)
    }

    /// Snapshot of the entry at `index`.
    pub fn entry_by_index(&mut self, zip: ArchiveHandle, index: usize) -> Result<EntryHandle> {
        self.register_entry(zip, |z| z.entry_at(index))
    }

    /// Snapshot of the entry named `name`.
    pub fn entry_by_name(&mut self, zip: ArchiveHandle, name: &str) -> Result<EntryHandle> {
        self.register_entry(zip, |z| z.entry(name))
    }

    /// Releases an entry snapshot.
    pub fn release_entry(&mut self, entry: EntryHandle) -> Result<()> {
        let result = self.entries.remove(entry).map(|_| ());
        self.record(Some(key_of(entry)), result)
    }

    /// Metadata of an entry snapshot, as it was when the handle was issued.
    pub fn entry(&mut self, entry: EntryHandle) -> Result<&Entry> {
        if let Err(e) = self.entries.get(entry).map(|_| ()) {
            self.record(Some(key_of(entry)), Err(e))?;
        }
        self.entries.get(entry).map(|owned| &owned.value)
    }

    fn entry_owner(&mut self, entry: EntryHandle) -> Result<(ArchiveHandle, String)> {
        let result = self.entries.get(entry).map(|owned| (owned.archive, owned.value.name.clone()));
        self.record(Some(key_of(entry)), result)
    }

    // ---- mutation ----

    /// Adds a file or a directory tree from disk.
    pub fn add_file(&mut self, zip: ArchiveHandle, path: impl AsRef<Path>, params: &ZipParameters) -> Result<()> {
        self.on_archive(zip, |z| z.add_file(path, params))
    }

    /// Adds a directory tree from disk.
    pub fn add_directory(&mut self, zip: ArchiveHandle, path: impl AsRef<Path>, params: &ZipParameters) -> Result<()> {
        self.on_archive(zip, |z| z.add_directory(path, params))
    }

    /// Adds in-memory data as an entry.
    pub fn add_data(&mut self, zip: ArchiveHandle, name: &str, data: &[u8], params: &ZipParameters) -> Result<()> {
        self.on_archive(zip, |z| z.add_data(name, data, params))
    }

    /// Removes an entry by name.
    pub fn remove_file(&mut self, zip: ArchiveHandle, name: &str) -> Result<()> {
        self.on_archive(zip, |z| z.remove_file(name))
    }

    /// Removes the entry a snapshot refers to and releases the snapshot.
    pub fn remove_entry(&mut self, entry: EntryHandle) -> Result<()> {
        let (zip, name) = self.entry_owner(entry)?;
        self.on_archive(zip, |z| z.remove_file(&name))?;
        self.release_entry(entry)
    }

    /// Renames an entry.
    pub fn rename_entry(&mut self, zip: ArchiveHandle, from: &str, to: &str) -> Result<()> {
        self.on_archive(zip, |z| z.rename_entry(from, to))
    }

    // ---- extraction ----

    /// Extracts every entry below `dest`.
    pub fn extract_all(&mut self, zip: ArchiveHandle, dest: impl AsRef<Path>) -> Result<()> {
        self.on_archive(zip, |z| z.extract_all(dest))
    }

    /// Extracts one entry by name below `dest`.
    pub fn extract_file(&mut self, zip: ArchiveHandle, name: &str, dest: impl AsRef<Path>) -> Result<()> {
        self.on_archive(zip, |z| z.extract_file(name, dest))
    }

    /// Extracts the entry a snapshot refers to below `dest`.
    pub fn extract_entry(&mut self, entry: EntryHandle, dest: impl AsRef<Path>) -> Result<()> {
        let (zip, name) = self.entry_owner(entry)?;
        self.on_archive(zip, |z| z.extract_file(&name, dest))
    }

    /// Decompresses one entry into memory.
    pub fn extract_to_buffer(&mut self, zip: ArchiveHandle, name: &str) -> Result<Vec<u8>> {
        self.on_archive(zip, |z| z.extract_data(name))
    }

    // ---- streaming ----

    /// Opens a stream over an entry's decompressed data.
    pub fn open_stream(&mut self, zip: ArchiveHandle, name: &str) -> Result<StreamHandle> {
        let result = self.archives.get(zip).and_then(|z| z.input_stream(name));
        let result = result.map(|reader| self.streams.insert(Owned { archive: zip, value: reader }));
        self.record(Some(key_of(zip)), result)
    }

    /// Opens a stream over the entry a snapshot refers to.
    pub fn open_entry_stream(&mut self, entry: EntryHandle) -> Result<StreamHandle> {
        let (zip, name) = self.entry_owner(entry)?;
        self.open_stream(zip, &name)
    }

    /// Reads the next chunk into `buf`; `0` means end of entry.
    pub fn read_stream(&mut self, stream: StreamHandle, buf: &mut [u8]) -> Result<usize> {
        let result = self
            .streams
            .get_mut(stream)
            .and_then(|owned| owned.value.read(buf).map_err(map_io_error));
        self.record(Some(key_of(stream)), result)
    }

    /// Closes a stream.
    pub fn close_stream(&mut self, stream: StreamHandle) -> Result<()> {
        let result = self.streams.remove(stream).map(|_| ());
        self.record(Some(key_of(stream)), result)
    }

    // ---- progress ----

    /// Monitor for the archive's current or next operation.
    pub fn monitor(&mut self, zip: ArchiveHandle) -> Result<MonitorHandle> {
        let result = self.archives.get(zip).map(ZipFile::monitor);
        let result = result.map(|monitor| self.monitors.insert(Owned { archive: zip, value: monitor }));
        self.record(Some(key_of(zip)), result)
    }

    fn on_monitor<R>(&mut self, monitor: MonitorHandle, f: impl FnOnce(&ProgressMonitor) -> R) -> Result<R> {
        let result = self.monitors.get(monitor).map(|owned| f(&owned.value));
        self.record(Some(key_of(monitor)), result)
    }

    /// Completion of the monitored operation in percent.
    pub fn progress_percent(&mut self, monitor: MonitorHandle) -> Result<u8> {
        self.on_monitor(monitor, ProgressMonitor::percent_complete)
    }

    /// Returns true once the monitored operation has ended.
    pub fn progress_finished(&mut self, monitor: MonitorHandle) -> Result<bool> {
        self.on_monitor(monitor, ProgressMonitor::is_finished)
    }

    /// Requests cancellation of the monitored operation.
    pub fn cancel(&mut self, monitor: MonitorHandle) -> Result<()> {
        self.on_monitor(monitor, ProgressMonitor::cancel)
    }

    /// A clone of the monitor, for watching from another thread.
    pub fn progress_monitor(&mut self, monitor: MonitorHandle) -> Result<ProgressMonitor> {
        self.on_monitor(monitor, ProgressMonitor::clone)
    }

    /// Releases a monitor handle.
    pub fn release_monitor(&mut self, monitor: MonitorHandle) -> Result<()> {
        let result = self.monitors.remove(monitor).map(|_| ());
        self.record(Some(key_of(monitor)), result)
    }

    // ---- split archives ----

    /// Joins a split archive into the single file `output`.
    pub fn merge_split_files(&mut self, zip: ArchiveHandle, output: impl AsRef<Path>) -> Result<()> {
        self.on_archive(zip, |z| z.merge_split_files(output))
    }

    /// Volume paths of the archive in disk order.
    pub fn split_files(&mut self, zip: ArchiveHandle) -> Result<Vec<PathBuf>> {
        self.on_archive(zip, |z| Ok(z.split_files()))
    }

    // ---- diagnostics ----

    /// Message of the last failed call that involved `handle`.
    pub fn last_error<T: Resource>(&self, handle: Handle<T>) -> Option<&str> {
        self.errors.get(&key_of(handle)).map(String::as_str)
    }

    /// Message of the last failed call in this session.
    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Forgets all recorded errors.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
        self.last_error = None;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("archives", &self.archives.len())
            .field("entries", &self.entries.len())
            .field("streams", &self.streams.len())
            .field("monitors", &self.monitors.len())
            .finish()
    }
}

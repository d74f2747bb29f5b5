//! Progress reporting and cooperative cancellation.
//!
//! Long-running operations (adding, extracting, rewriting, splitting,
//! merging) report through the [`ProgressReporter`] trait and poll it for
//! cancellation after every entry and every 64 KiB chunk. Callers usually
//! pass a [`ProgressMonitor`], which can be cloned into another thread to
//! watch or cancel the operation:
//!
//! ```rust,no_run
//! use zipkit::ZipFile;
//!
//! let mut zip = ZipFile::open("big.zip")?;
//! let monitor = zip.monitor();
//! let watcher = std::thread::spawn(move || {
//!     while !monitor.is_finished() {
//!         println!("{}%", monitor.percent_complete());
//!         std::thread::sleep(std::time::Duration::from_millis(100));
//!     }
//! });
//! zip.extract_all("out")?;
//! watcher.join().unwrap();
//! # Ok::<(), zipkit::Error>(())
//! ```

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::map_io_error;
use crate::{Error, Result};

/// Size of the chunks between two cancellation checks.
pub const CHUNK_SIZE: usize = 64 * 1024;

const BYTES_KB: f64 = 1024.0;
const BYTES_MB: f64 = BYTES_KB * 1024.0;
const BYTES_GB: f64 = BYTES_MB * 1024.0;

/// Progress reporting trait for archive operations.
///
/// Every method has a no-op default, so implementors only override what
/// they care about.
pub trait ProgressReporter: Send {
    /// Called once with the total amount of work, in bytes.
    fn on_total(&mut self, total_bytes: u64) {
        let _ = total_bytes;
    }

    /// Called after each chunk.
    ///
    /// Returns `true` to continue or `false` to request cancellation.
    fn on_progress(&mut self, bytes_processed: u64, total_bytes: u64) -> bool {
        let _ = (bytes_processed, total_bytes);
        true
    }

    /// Called when starting to process a new entry.
    fn on_entry_start(&mut self, entry_name: &str, size: u64) {
        let _ = (entry_name, size);
    }

    /// Called when entry processing completes.
    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        let _ = (entry_name, success);
    }

    /// Called on any tolerated anomaly.
    fn on_warning(&mut self, message: &str) {
        let _ = message;
    }

    /// Checks if cancellation has been requested.
    ///
    /// Polled before each entry, independently of `on_progress`.
    fn should_cancel(&self) -> bool {
        false
    }
}

/// A progress reporter that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// A progress reporter that calls a closure.
pub struct ClosureProgress<F> {
    callback: F,
}

impl<F> ClosureProgress<F>
where
    F: FnMut(u64, u64) -> bool + Send,
{
    /// Creates a progress reporter from a closure.
    ///
    /// The closure receives (bytes_processed, total_bytes) and returns
    /// `true` to continue or `false` to cancel.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgress<F>
where
    F: FnMut(u64, u64) -> bool + Send,
{
    fn on_progress(&mut self, bytes_processed: u64, total_bytes: u64) -> bool {
        (self.callback)(bytes_processed, total_bytes)
    }
}

/// Creates a closure-based progress reporter.
pub fn progress_fn<F>(f: F) -> ClosureProgress<F>
where
    F: FnMut(u64, u64) -> bool + Send,
{
    ClosureProgress::new(f)
}

/// Whether a monitor is attached to a running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No operation has started on this monitor yet.
    Ready,
    /// An operation is running.
    Busy,
}

/// The kind of operation a monitor tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperationKind {
    /// Nothing yet.
    None = 0,
    /// Adding entries.
    Add = 1,
    /// Removing entries.
    Remove = 2,
    /// Renaming entries.
    Rename = 3,
    /// Extracting entries.
    Extract = 4,
    /// Merging a split archive.
    Merge = 5,
    /// Changing the archive comment.
    Comment = 6,
    /// Writing a split archive.
    Split = 7,
    /// Verifying entries.
    Test = 8,
}

impl OperationKind {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Add,
            2 => Self::Remove,
            3 => Self::Rename,
            4 => Self::Extract,
            5 => Self::Merge,
            6 => Self::Comment,
            7 => Self::Split,
            8 => Self::Test,
            _ => Self::None,
        }
    }
}

/// How a finished operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Outcome {
    /// Completed normally.
    Success = 1,
    /// Failed with an error.
    Error = 2,
    /// Stopped by a cancellation request.
    Cancelled = 3,
}

#[derive(Debug, Default)]
struct MonitorInner {
    total: AtomicU64,
    done: AtomicU64,
    busy: AtomicBool,
    finished: AtomicBool,
    cancel: AtomicBool,
    operation: AtomicU8,
    outcome: AtomicU8,
    current_entry: Mutex<Option<String>>,
    error: Mutex<Option<String>>,
}

/// Shared view of one long-running operation.
///
/// Cloning is cheap and every clone observes the same operation. Once
/// [`is_finished`](Self::is_finished) turns true it stays true; the next
/// operation gets a fresh monitor.
#[derive(Debug, Clone, Default)]
pub struct ProgressMonitor {
    inner: Arc<MonitorInner>,
}

impl ProgressMonitor {
    /// Creates an idle monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion in percent, `0..=100`.
    pub fn percent_complete(&self) -> u8 {
        if self.outcome() == Some(Outcome::Success) {
            return 100;
        }
        let total = self.total_work();
        if total == 0 {
            return 0;
        }
        (self.work_completed().min(total) as u128 * 100 / total as u128) as u8
    }

    /// Returns true once the operation has ended, whatever the outcome.
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }

    /// Requests cancellation. The operation stops at its next check.
    pub fn cancel(&self) {
        self.inner.cancel.store(true, Ordering::Release);
    }

    /// Returns true if [`cancel`](Self::cancel) was called.
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel.load(Ordering::Acquire)
    }

    /// Current state.
    pub fn state(&self) -> MonitorState {
        if self.inner.busy.load(Ordering::Acquire) {
            MonitorState::Busy
        } else {
            MonitorState::Ready
        }
    }

    /// The operation being tracked.
    pub fn current_operation(&self) -> OperationKind {
        OperationKind::from_u8(self.inner.operation.load(Ordering::Acquire))
    }

    /// Name of the entry being processed.
    pub fn current_entry(&self) -> Option<String> {
        self.inner.current_entry.lock().ok().and_then(|g| g.clone())
    }

    /// Total work in bytes.
    pub fn total_work(&self) -> u64 {
        self.inner.total.load(Ordering::Acquire)
    }

    /// Work done so far in bytes.
    pub fn work_completed(&self) -> u64 {
        self.inner.done.load(Ordering::Acquire)
    }

    /// How the operation ended, once finished.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.inner.outcome.load(Ordering::Acquire) {
            1 => Some(Outcome::Success),
            2 => Some(Outcome::Error),
            3 => Some(Outcome::Cancelled),
            _ => None,
        }
    }

    /// Error message of a failed operation.
    pub fn error_message(&self) -> Option<String> {
        self.inner.error.lock().ok().and_then(|g| g.clone())
    }

    pub(crate) fn begin(&self, operation: OperationKind) {
        self.inner.operation.store(operation as u8, Ordering::Release);
        self.inner.busy.store(true, Ordering::Release);
    }

    pub(crate) fn finish<T>(&self, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => Outcome::Success,
            Err(Error::Cancelled) => Outcome::Cancelled,
            Err(e) => {
                if let Ok(mut slot) = self.inner.error.lock() {
                    *slot = Some(e.to_string());
                }
                Outcome::Error
            }
        };
        if let Ok(mut slot) = self.inner.current_entry.lock() {
            *slot = None;
        }
        self.inner.outcome.store(outcome as u8, Ordering::Release);
        self.inner.busy.store(false, Ordering::Release);
        self.inner.finished.store(true, Ordering::Release);
    }
}

impl ProgressReporter for ProgressMonitor {
    fn on_total(&mut self, total_bytes: u64) {
        self.inner.total.store(total_bytes, Ordering::Release);
    }

    fn on_progress(&mut self, bytes_processed: u64, _total_bytes: u64) -> bool {
        self.inner.done.store(bytes_processed, Ordering::Release);
        !self.is_cancel_requested()
    }

    fn on_entry_start(&mut self, entry_name: &str, _size: u64) {
        if let Ok(mut slot) = self.inner.current_entry.lock() {
            *slot = Some(entry_name.to_string());
        }
    }

    fn should_cancel(&self) -> bool {
        self.is_cancel_requested()
    }
}

/// Byte accounting on top of a reporter, turning cancellation into errors.
pub(crate) struct WorkTracker<'a> {
    reporter: &'a mut dyn ProgressReporter,
    total: u64,
    done: u64,
}

impl<'a> WorkTracker<'a> {
    pub(crate) fn new(reporter: &'a mut dyn ProgressReporter, total: u64) -> Self {
        reporter.on_total(total);
        Self {
            reporter,
            total,
            done: 0,
        }
    }

    pub(crate) fn checkpoint(&self) -> Result<()> {
        if self.reporter.should_cancel() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn advance(&mut self, bytes: u64) -> Result<()> {
        self.done = self.done.saturating_add(bytes);
        if !self.reporter.on_progress(self.done.min(self.total), self.total) {
            return Err(Error::Cancelled);
        }
        self.checkpoint()
    }

    pub(crate) fn entry_start(&mut self, name: &str, size: u64) -> Result<()> {
        self.checkpoint()?;
        self.reporter.on_entry_start(name, size);
        Ok(())
    }

    pub(crate) fn entry_done(&mut self, name: &str, success: bool) {
        self.reporter.on_entry_complete(name, success);
    }

    pub(crate) fn warn(&mut self, message: &str) {
        log::warn!("{}", message);
        self.reporter.on_warning(message);
    }
}

/// Copies `reader` into `writer` in [`CHUNK_SIZE`] pieces, reporting each.
///
/// Errors tunnelled through the reader keep their original kind.
pub(crate) fn copy_tracked<R, W>(reader: &mut R, writer: &mut W, tracker: &mut WorkTracker<'_>) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut copied = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(map_io_error(e)),
        };
        writer.write_all(&buf[..n])?;
        copied += n as u64;
        tracker.advance(n as u64)?;
    }
    Ok(copied)
}

/// Formats bytes as a human-readable string using IEC units (KiB, MiB, GiB).
///
/// # Examples
///
/// ```rust
/// use zipkit::progress::format_bytes_iec;
///
/// assert_eq!(format_bytes_iec(0), "0 B");
/// assert_eq!(format_bytes_iec(1536), "1.5 KiB");
/// assert_eq!(format_bytes_iec(1048576), "1.0 MiB");
/// ```
pub fn format_bytes_iec(bytes: u64) -> String {
    let bytes_f64 = bytes as f64;
    if bytes_f64 < BYTES_KB {
        format!("{} B", bytes)
    } else if bytes_f64 < BYTES_MB {
        format!("{:.1} KiB", bytes_f64 / BYTES_KB)
    } else if bytes_f64 < BYTES_GB {
        format!("{:.1} MiB", bytes_f64 / BYTES_MB)
    } else {
        format!("{:.1} GiB", bytes_f64 / BYTES_GB)
    }
}

//! Running archive operations on a worker thread.
//!
//! ```rust,no_run
//! use zipkit::{BackgroundTask, ZipFile};
//!
//! let zip = ZipFile::open("big.zip")?;
//! let task = BackgroundTask::spawn(zip, |zip| zip.extract_all("out"));
//! while !task.is_finished() {
//!     println!("{}%", task.monitor().percent_complete());
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! let (_zip, result) = task.join();
//! result?;
//! # Ok::<(), zipkit::Error>(())
//! ```

use std::thread::JoinHandle;

use crate::progress::ProgressMonitor;
use crate::{Result, ZipFile};

/// An operation running on its own thread, owning the archive until joined.
pub struct BackgroundTask<T> {
    monitor: ProgressMonitor,
    handle: JoinHandle<(ZipFile, Result<T>)>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Moves `zip` to a new thread and runs `f` on it.
    ///
    /// The returned task's monitor is attached to the first tracked
    /// operation `f` starts.
    pub fn spawn<F>(mut zip: ZipFile, f: F) -> Self
    where
        F: FnOnce(&mut ZipFile) -> Result<T> + Send + 'static,
    {
        let monitor = zip.monitor();
        let handle = std::thread::spawn(move || {
            let result = f(&mut zip);
            (zip, result)
        });
        Self { monitor, handle }
    }

    /// The operation's progress monitor.
    pub fn monitor(&self) -> &ProgressMonitor {
        &self.monitor
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.monitor.cancel();
    }

    /// Returns true once the worker thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the operation and hands the archive back.
    ///
    /// A panic on the worker thread is resumed on the caller.
    pub fn join(self) -> (ZipFile, Result<T>) {
        match self.handle.join() {
            Ok(done) => done,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl<T> std::fmt::Debug for BackgroundTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTask")
            .field("monitor", &self.monitor)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

//! Progress bars driven by a background task's monitor.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use zipkit::progress::format_bytes_iec;
use zipkit::{BackgroundTask, Result, ZipFile};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Ctrl+C handler: the next poll cancels the running operation.
pub fn request_interrupt() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        // Second Ctrl+C: give up waiting
        std::process::exit(crate::exit_codes::USER_INTERRUPT);
    }
    eprintln!("\nInterrupted, cancelling...");
}

fn bar(label: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_prefix(label.to_string());
    pb
}

/// Runs `f` on a worker thread, drawing its progress until it finishes.
///
/// Ctrl+C turns into a cancellation request.
pub fn run<T, F>(zip: ZipFile, label: &str, quiet: bool, f: F) -> (ZipFile, Result<T>)
where
    T: Send + 'static,
    F: FnOnce(&mut ZipFile) -> Result<T> + Send + 'static,
{
    let pb = bar(label, quiet);
    let task = BackgroundTask::spawn(zip, f);
    let monitor = task.monitor().clone();

    while !task.is_finished() {
        if INTERRUPTED.load(Ordering::SeqCst) && !monitor.is_cancel_requested() {
            task.cancel();
        }
        pb.set_length(monitor.total_work());
        pb.set_position(monitor.work_completed());
        if let Some(entry) = monitor.current_entry() {
            pb.set_message(shorten(&entry));
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    let (zip, result) = task.join();
    match &result {
        Ok(_) => pb.finish_with_message(format!("done ({})", format_bytes_iec(monitor.total_work()))),
        Err(_) => pb.abandon_with_message("failed"),
    }
    (zip, result)
}

/// Truncates long names from the left
fn shorten(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() > 40 {
        let tail: String = chars[chars.len() - 37..].iter().collect();
        format!("...{}", tail)
    } else {
        name.to_string()
    }
}

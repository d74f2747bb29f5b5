//! Archive modification.
//!
//! Zip archives are edited by rewriting them: every mutation builds a new
//! archive next to the old one, copying surviving entries raw (no
//! decompression), writing new ones through the compression pipeline, and
//! then renaming the result over the original. A failed or cancelled
//! mutation leaves the original file byte-for-byte unchanged.
//!
//! Several changes can be batched into one rewrite:
//!
//! ```rust,no_run
//! use zipkit::{ZipFile, ZipParameters};
//! use zipkit::edit::Operation;
//!
//! let mut zip = ZipFile::open("archive.zip")?;
//! let params = ZipParameters::default();
//! let result = zip.apply(vec![
//!     Operation::Rename { from: "old_name.txt".into(), to: "new_name.txt".into() },
//!     Operation::Remove { name: "unwanted.txt".into() },
//!     Operation::add_data("new_file.txt", b"Hello, World!".to_vec(), &params)?,
//! ])?;
//! println!("kept {}, added {}", result.entries_kept, result.entries_added);
//! # Ok::<(), zipkit::Error>(())
//! ```

mod editor;
mod operation;

pub use editor::EditResult;
pub use operation::{EntrySource, Operation};

pub(crate) use editor::ArchiveEditor;

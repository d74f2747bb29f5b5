//! Reading entries: metadata, streaming decompression and extraction.
//!
//! Most callers go through [`ZipFile`](crate::ZipFile); this module holds
//! the types it hands out.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io::Read;
//! use zipkit::ZipFile;
//! use zipkit::read::{ExtractOptions, OverwritePolicy};
//!
//! let mut zip = ZipFile::open("archive.zip")?;
//!
//! for entry in zip.entries() {
//!     println!("{}: {} bytes", entry.name, entry.size);
//! }
//!
//! let mut text = String::new();
//! zip.input_stream("notes.txt")?.read_to_string(&mut text)?;
//!
//! let options = ExtractOptions::new().overwrite(OverwritePolicy::Skip);
//! zip.extract_all_with("out", &options)?;
//! # Ok::<(), zipkit::Error>(())
//! ```

mod entry;
mod extraction;
mod options;
mod stream;

pub use entry::Entry;
pub use options::{ExtractOptions, OverwritePolicy, PathSafety};
pub use stream::EntryReader;

pub(crate) use extraction::{extract_data, extract_entries, extract_entry_to, test_entries};
pub(crate) use stream::open_entry;
